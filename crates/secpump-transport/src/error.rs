//! secpump-transport エラー型

use secpump_core::PumpError;
use thiserror::Error;

/// [`crate::BlockingChannel`] の失敗
#[derive(Error, Debug)]
pub enum ChannelError<E> {
    /// ポンプの失敗（ハンドシェイク・復号・暗号化、または閉じたチャンネルへの書き込み）
    #[error(transparent)]
    Pump(#[from] PumpError),

    /// トランスポートの失敗
    #[error("transport error: {0}")]
    Transport(E),

    /// トランスポートが閉じた（`recv` / `send` が 0 を返した）
    #[error("transport closed")]
    TransportClosed,
}

impl<E> ChannelError<E> {
    /// ポンプのエラーなら取り出す
    pub fn as_pump_error(&self) -> Option<&PumpError> {
        match self {
            ChannelError::Pump(err) => Some(err),
            _ => None,
        }
    }
}
