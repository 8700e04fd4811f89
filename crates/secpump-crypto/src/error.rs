//! 暗号エラー型

use thiserror::Error;

/// 暗号操作のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 鍵の長さが不正（16バイト以外）
    #[error("invalid key length: {0} bytes (expected 16)")]
    InvalidKeyLength(usize),

    /// Base64 デコードに失敗
    #[error("invalid base64 encoding")]
    InvalidBase64,

    /// 暗号化に失敗
    #[error("encryption failed")]
    EncryptionFailed,

    /// 復号に失敗（認証タグ検証失敗を含む）
    #[error("decryption failed (authentication tag mismatch)")]
    DecryptionFailed,

    /// レコードの body が短すぎる
    #[error("protected record body too short: {0} bytes")]
    RecordTooShort(usize),

    /// 自分が送った方向のレコードを受信した（反射）
    #[error("record carries the local direction bit")]
    WrongDirection,

    /// シーケンス番号が期待値と一致しない（欠落・重複・並べ替え）
    #[error("unexpected sequence number: expected {expected}, received {received}")]
    UnexpectedSequence {
        /// 期待していた番号
        expected: u64,
        /// 受信した番号
        received: u64,
    },
}
