//! # secpump-wasm
//!
//! wasm-bindgen エクスポート：JS のイベントループがソケットを持ち、
//! sans-I/O のセッションポンプを駆動するための公開 API。
//!
//! ## 使用方法（TypeScript）
//!
//! ```typescript
//! import { SecureChannel, init_panic_hook } from '../secpump-wasm-pkg/secpump_wasm';
//!
//! // パニック時のスタックトレースを有効化（開発時）
//! init_panic_hook();
//!
//! const channel = new SecureChannel("4NeCCgvZFe2RnPgrcU1PQw", "db.internal");
//! channel.submitPlaintext(request);
//!
//! const pump = () => {
//!     channel.process();
//!     const out = channel.drainCiphertext();
//!     if (out.length > 0) socket.write(out);
//!     const data = channel.drainPlaintext();
//!     if (data.length > 0) onData(data);
//! };
//!
//! socket.on('data', (buf) => { channel.submitReceivedCiphertext(buf); pump(); });
//! pump();
//! ```

use wasm_bindgen::prelude::*;

pub mod channel;

pub use channel::SecureChannel;

/// パニック時にブラウザコンソールにスタックトレースを出力する
///
/// 開発時に必ず呼び出すこと。本番ビルドでは feature flag で無効化可能。
#[wasm_bindgen]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Base64 鍵（22文字）を 16 バイトの Uint8Array に変換するユーティリティ
///
/// テスト・デバッグ用。実際の使用では `SecureChannel` のコンストラクタに渡す。
///
/// # エラー
/// - Base64 デコード失敗
/// - 鍵長が 16 バイト以外
#[wasm_bindgen(js_name = "decodeBase64Key")]
pub fn decode_base64_key(key_b64: &str) -> Result<js_sys::Uint8Array, JsError> {
    let key = secpump_crypto::decode_psk(key_b64)
        .map_err(|e| JsError::new(&alloc::format!("{}", e)))?;
    let arr = js_sys::Uint8Array::new_with_length(key.len() as u32);
    arr.copy_from(&key);
    Ok(arr)
}

extern crate alloc;
