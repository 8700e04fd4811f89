//! # secpump-crypto
//!
//! 事前共有鍵（PSK）によるリファレンス暗号エンジン。
//!
//! `secpump-core` の [`SecurityContextProvider`](secpump_core::SecurityContextProvider)
//! 契約を満たす自前実装で、プラットフォームのネイティブ実装の代わりに差し込める。
//! `no_std` + `alloc` 環境（WASM を含む）で動作する。
//!
//! ## レコード保護
//!
//! ```text
//! 保護されたレコード:
//!   [header: 5bytes][nonce_tail: 8bytes][ciphertext + auth_tag(16): variable]
//!
//! header はそのまま AEAD の associated data になる。
//!
//! Nonce（12バイト）:
//!   bytes[0..4]  = 0x00000000 (ゼロパディング、送信時省略)
//!   bytes[4..12] = direction_seq as u64, big-endian
//!
//! direction_seq:
//!   seq の MSB (bit 63) = direction (CLIENT_TO_SERVER=0, SERVER_TO_CLIENT=1)
//! ```
//!
//! ## ハンドシェイク（1 往復）
//!
//! ```text
//! client                                   server
//!   ClientHello { random_c, identity } -->
//!                                      <-- ServerHello { random_s, verify }
//!
//! session_key = HKDF-SHA256(salt = random_c || random_s, ikm = psk)[..16]
//! verify      = HMAC-SHA256(session_key, label || random_c)[..16]
//! ```

#![no_std]
extern crate alloc;

mod cipher;
mod engine;
mod error;
mod kdf;
mod nonce;

pub use cipher::RecordCipher;
pub use engine::{hello_request_record, EngineConfig, Phase, PskContext, PskEngine, Role};
pub use error::CryptoError;
pub use kdf::{derive_session_key, key_confirmation, verify_key_confirmation, VERIFY_LEN};
pub use nonce::RecordNonce;

/// 鍵長（AES-128）
pub const KEY_LEN: usize = 16;

/// レコードに載せる nonce の後半部分の長さ
pub const NONCE_TAIL_LEN: usize = 8;

/// 認証タグ長
pub const TAG_LEN: usize = 16;

/// 1 レコードに載せられる平文の最大長
pub const MAX_PLAINTEXT_RECORD: usize = 16384;

/// レコードの方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// クライアント → サーバー (bit 63 = 0)
    ClientToServer = 0,
    /// サーバー → クライアント (bit 63 = 1)
    ServerToClient = 1,
}

impl Direction {
    /// seq の MSB から方向を判定する
    pub fn from_seq(direction_seq: u64) -> Self {
        if direction_seq >> 63 == 0 {
            Direction::ClientToServer
        } else {
            Direction::ServerToClient
        }
    }

    /// direction を seq の MSB に適用する
    pub fn apply_to_seq(&self, seq: u64) -> u64 {
        match self {
            Direction::ClientToServer => seq & !(1u64 << 63),
            Direction::ServerToClient => seq | (1u64 << 63),
        }
    }

    /// 逆方向
    pub fn reverse(&self) -> Self {
        match self {
            Direction::ClientToServer => Direction::ServerToClient,
            Direction::ServerToClient => Direction::ClientToServer,
        }
    }
}

/// Base64 文字列（22文字）を 16 バイトの事前共有鍵にデコードする
///
/// 形式は URL-safe、パディングなし（例: `4NeCCgvZFe2RnPgrcU1PQw`）。
///
/// # エラー
/// - `CryptoError::InvalidBase64`: Base64 デコード失敗
/// - `CryptoError::InvalidKeyLength`: デコード結果が 16 バイトでない
pub fn decode_psk(key_b64: &str) -> Result<[u8; KEY_LEN], CryptoError> {
    use base64::Engine as _;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(key_b64)
        .map_err(|_| CryptoError::InvalidBase64)?;

    if bytes.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyLength(bytes.len()));
    }

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_seq() {
        assert_eq!(Direction::from_seq(1), Direction::ClientToServer);
        assert_eq!(Direction::from_seq(0x8000000000000001), Direction::ServerToClient);
    }

    #[test]
    fn test_direction_apply_to_seq() {
        let seq: u64 = 42;
        assert_eq!(Direction::ClientToServer.apply_to_seq(seq) >> 63, 0);
        assert_eq!(Direction::ServerToClient.apply_to_seq(seq) >> 63, 1);
        assert_eq!(Direction::ServerToClient.reverse(), Direction::ClientToServer);
    }

    #[test]
    fn test_decode_psk_valid() {
        // 16 zero bytes → base64url = "AAAAAAAAAAAAAAAAAAAAAA"
        assert_eq!(decode_psk("AAAAAAAAAAAAAAAAAAAAAA").unwrap(), [0u8; KEY_LEN]);
    }

    #[test]
    fn test_decode_psk_invalid() {
        assert_eq!(decode_psk("AAAAAAAAAAAAAA"), Err(CryptoError::InvalidKeyLength(10)));
        assert_eq!(decode_psk("not base64 !!"), Err(CryptoError::InvalidBase64));
    }
}
