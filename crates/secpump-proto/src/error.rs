//! secpump-proto エラー型

use thiserror::Error;

/// レコード / ハンドシェイクメッセージの解析エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// 未知の content_type
    #[error("unknown record content type: {0}")]
    UnknownContentType(u8),

    /// ヘッダーのバージョンが一致しない
    #[error("unsupported record version: {0:#06x}")]
    UnsupportedRecordVersion(u16),

    /// body 長が上限を超えている
    #[error("record body too large: {size} bytes exceeds maximum {max}")]
    RecordTooLarge {
        /// ヘッダーが示す body 長
        size: usize,
        /// 上限
        max: usize,
    },

    /// Protobuf デコード失敗
    #[error("handshake message decode failed: {0}")]
    DecodeFailed(prost::DecodeError),

    /// ハンドシェイクのプロトコルバージョン不一致
    #[error("invalid handshake protocol version: {0} (expected {expected})", expected = crate::HANDSHAKE_VERSION)]
    InvalidProtocolVersion(u32),

    /// 未知の kind
    #[error("unknown handshake message kind: {0}")]
    UnknownHandshakeKind(u32),

    /// ハンドシェイク乱数の長さが不正
    #[error("handshake random must be {expected} bytes, got {0}", expected = crate::RANDOM_LEN)]
    InvalidRandomLength(usize),

    /// Alert の body が 2 バイトでない
    #[error("malformed alert body ({0} bytes)")]
    MalformedAlert(usize),
}
