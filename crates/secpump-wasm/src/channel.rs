//! SecureChannel wasm-bindgen エクスポート
//!
//! PSK リファレンスエンジンのクライアント役でセッションポンプを包む。

extern crate alloc;

use alloc::format;
use alloc::string::String;

use js_sys::Uint8Array;
use wasm_bindgen::prelude::*;

use secpump_core::{PumpConfig, SecureChannelPump};
use secpump_crypto::PskEngine;

/// クライアント側セキュアチャンネル
///
/// ## 内部アーキテクチャ
///
/// ```text
/// SecureChannel
///   └── SecureChannelPump (secpump-core) - ハンドシェイク・レコードの状態機械
///         ├── ByteRingQueue × 4 (secpump-queue)
///         └── PskEngine (secpump-crypto) - AES-128-OCB3 レコード保護
/// ```
///
/// ## スレッド安全性
///
/// WASM は シングルスレッドのため、`!Send + !Sync` を満たす。
/// JS からは単一スレッドで呼び出される前提。
#[wasm_bindgen]
pub struct SecureChannel {
    pump: SecureChannelPump<PskEngine>,
}

#[wasm_bindgen]
impl SecureChannel {
    /// チャンネルを生成する（ハンドシェイクは最初の `process()` で始まる）
    ///
    /// # 引数
    /// - `psk_base64`: Base64 の事前共有鍵（22文字）
    /// - `peer_identity`: 接続先の識別子
    /// - `config_json`: ポンプ設定の JSON（省略可）
    ///   例: `{"initial_queue_capacity": 4096, "max_plaintext_record": 1200}`
    ///
    /// # エラー
    /// - 鍵のデコード失敗・鍵長不正
    /// - 設定 JSON の解析失敗
    #[wasm_bindgen(constructor)]
    pub fn new(
        psk_base64: &str,
        peer_identity: &str,
        config_json: Option<String>,
    ) -> Result<SecureChannel, JsError> {
        let psk = secpump_crypto::decode_psk(psk_base64)
            .map_err(|e| JsError::new(&format!("Invalid pre-shared key: {}", e)))?;

        let config = match config_json.as_deref() {
            Some(json) => serde_json::from_str::<PumpConfig>(json)
                .map_err(|e| JsError::new(&format!("Invalid config: {}", e)))?,
            None => PumpConfig::default(),
        };

        Ok(SecureChannel {
            pump: SecureChannelPump::with_config(PskEngine::client(psk), peer_identity, config),
        })
    }

    /// 送信する平文を積む
    ///
    /// # エラー
    /// チャンネルが `Failed` / `Closed`
    #[wasm_bindgen(js_name = "submitPlaintext")]
    pub fn submit_plaintext(&mut self, data: &[u8]) -> Result<(), JsError> {
        self.pump
            .submit_plaintext(data)
            .map_err(|e| JsError::new(&format!("{}", e)))
    }

    /// ソケットから受信したバイト列を積む
    ///
    /// # エラー
    /// チャンネルが `Failed` / `Closed`
    #[wasm_bindgen(js_name = "submitReceivedCiphertext")]
    pub fn submit_received_ciphertext(&mut self, data: &[u8]) -> Result<(), JsError> {
        self.pump
            .submit_received_ciphertext(data)
            .map_err(|e| JsError::new(&format!("{}", e)))
    }

    /// 1 パス分の処理を行う
    ///
    /// # エラー
    /// このパスでチャンネルが `Failed` になった（以降の呼び出しは何もしない）
    #[wasm_bindgen]
    pub fn process(&mut self) -> Result<(), JsError> {
        self.pump
            .process()
            .map_err(|e| JsError::new(&format!("{}", e)))
    }

    /// ソケットに書き出す暗号文を取り出す
    ///
    /// # 引数
    /// - `max_bytes`: 最大バイト数（省略時はすべて）
    #[wasm_bindgen(js_name = "drainCiphertext")]
    pub fn drain_ciphertext(&mut self, max_bytes: Option<u32>) -> Uint8Array {
        let data = self.pump.drain_ciphertext_to_send(limit(max_bytes));
        to_uint8_array(&data)
    }

    /// 復号済みの平文を取り出す
    ///
    /// # 引数
    /// - `max_bytes`: 最大バイト数（省略時はすべて）
    #[wasm_bindgen(js_name = "drainPlaintext")]
    pub fn drain_plaintext(&mut self, max_bytes: Option<u32>) -> Uint8Array {
        let data = self.pump.drain_decoded_plaintext(limit(max_bytes));
        to_uint8_array(&data)
    }

    /// 次の `process()` で終了通知を送る
    #[wasm_bindgen(js_name = "requestClose")]
    pub fn request_close(&mut self) {
        self.pump.request_close();
    }

    /// 状態名（"NotStarted" / "InProgress" / "Established" / "Renegotiating" / "Failed" / "Closed"）
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        format!("{:?}", self.pump.state())
    }

    #[wasm_bindgen(js_name = "isEstablished")]
    pub fn is_established(&self) -> bool {
        self.pump.is_established()
    }

    #[wasm_bindgen(js_name = "isClosed")]
    pub fn is_closed(&self) -> bool {
        self.pump.is_closed()
    }

    /// ピアが終了通知を送ったか
    #[wasm_bindgen(js_name = "peerClosed")]
    pub fn peer_closed(&self) -> bool {
        self.pump.peer_closed()
    }

    /// チャンネルを `Failed` にしたエラーのメッセージ
    #[wasm_bindgen(js_name = "lastError")]
    pub fn last_error(&self) -> Option<String> {
        self.pump.last_error().map(|e| format!("{}", e))
    }

    /// 統計情報を JSON 文字列で返す
    ///
    /// # 戻り値
    /// JSON 文字列:
    /// ```json
    /// {
    ///   "state": "Established",
    ///   "process_calls": 12,
    ///   "handshake_rounds": 3,
    ///   "records_encrypted": 4,
    ///   "records_decrypted": 5,
    ///   "pending_ciphertext_to_send": 0,
    ///   ...
    /// }
    /// ```
    #[wasm_bindgen(js_name = "getStats")]
    pub fn get_stats(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.pump.stats())
            .map_err(|e| JsError::new(&format!("Stats serialization failed: {}", e)))
    }
}

fn limit(max_bytes: Option<u32>) -> usize {
    max_bytes.map_or(usize::MAX, |n| n as usize)
}

fn to_uint8_array(data: &[u8]) -> Uint8Array {
    let arr = Uint8Array::new_with_length(data.len() as u32);
    arr.copy_from(data);
    arr
}
