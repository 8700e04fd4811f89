//! エラー型
//!
//! - [`ProviderError`]: 暗号エンジンが報告する失敗
//! - [`PumpError`]: ポンプの呼び出し側に見える失敗
//!
//! 「入力不足」（IncompleteInput）はエラーではなく通常の制御シグナルなので、
//! ここには含めない（[`crate::HandshakeStatus`] / [`crate::DecryptStatus`] を参照）。

use alloc::string::String;

use thiserror::Error;

use crate::pump::HandshakeState;

/// 暗号エンジン（プロバイダ）が報告する失敗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// 接続先の識別子が一致しない
    #[error("peer identity mismatch: requested {requested:?}, local {local:?}")]
    IdentityMismatch {
        /// クライアントが要求した識別子
        requested: String,
        /// こちら側の識別子
        local: String,
    },

    /// 現在のフェーズで想定していないメッセージ
    #[error("unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    /// 形式が不正
    #[error("malformed input: {0}")]
    Malformed(String),

    /// レコードまたは鍵確認値の認証に失敗
    #[error("authentication failed")]
    AuthenticationFailed,

    /// 平文がレコード上限を超えている
    #[error("record too large: {size} bytes exceeds maximum {max}")]
    RecordTooLarge {
        /// 渡されたサイズ
        size: usize,
        /// 上限
        max: usize,
    },

    /// ピアから Alert を受信した
    #[error("peer sent alert {0}")]
    PeerAlert(u8),

    /// サポートしないプロトコルバージョン
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u32),

    /// バックエンド固有の失敗
    #[error("backend failure: {0}")]
    Backend(String),
}

/// ポンプの失敗
///
/// `Handshake` / `Decode` / `Encode` はチャンネルを `Failed` に落とす終端エラー。
/// 一度 `Failed` になったチャンネルは破棄して作り直すこと（再接続はポンプの責務外）。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PumpError {
    /// ハンドシェイク中にプロバイダが失敗を報告した
    #[error("handshake failed: {0}")]
    Handshake(ProviderError),

    /// 受信レコードの復号に失敗した
    #[error("record decode failed: {0}")]
    Decode(ProviderError),

    /// 送信レコードの暗号化に失敗した
    #[error("record encode failed: {0}")]
    Encode(ProviderError),

    /// `Failed` / `Closed` のチャンネルにデータを積もうとした
    #[error("channel closed (state {state:?})")]
    ChannelClosed {
        /// 呼び出し時の状態
        state: HandshakeState,
    },
}

impl PumpError {
    /// チャンネルを `Failed` にする種類のエラーか
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PumpError::ChannelClosed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(PumpError::Handshake(ProviderError::AuthenticationFailed).is_fatal());
        assert!(PumpError::Decode(ProviderError::PeerAlert(40)).is_fatal());
        assert!(PumpError::Encode(ProviderError::RecordTooLarge { size: 2, max: 1 }).is_fatal());
        assert!(!PumpError::ChannelClosed { state: HandshakeState::Closed }.is_fatal());
    }

    #[test]
    fn test_display() {
        let err = PumpError::Handshake(ProviderError::UnexpectedMessage("ServerHello"));
        assert_eq!(
            alloc::format!("{}", err),
            "handshake failed: unexpected message: ServerHello"
        );
    }
}
