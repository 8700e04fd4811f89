//! Alert（警告・終了通知）
//!
//! ```text
//! [level: u8][description: u8]
//! ```

use crate::error::ProtoError;

/// Alert の level: warning
pub const LEVEL_WARNING: u8 = 1;
/// Alert の level: fatal
pub const LEVEL_FATAL: u8 = 2;

/// description: 正常終了の通知
pub const CLOSE_NOTIFY: u8 = 0;
/// description: ハンドシェイク失敗
pub const HANDSHAKE_FAILURE: u8 = 40;

/// Alert メッセージ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    /// 重大度
    pub level: u8,
    /// 内容
    pub description: u8,
}

impl Alert {
    /// 正常終了の通知
    pub fn close_notify() -> Self {
        Alert {
            level: LEVEL_WARNING,
            description: CLOSE_NOTIFY,
        }
    }

    /// close_notify か
    pub fn is_close_notify(&self) -> bool {
        self.description == CLOSE_NOTIFY
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        [self.level, self.description]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        match bytes {
            [level, description] => Ok(Alert {
                level: *level,
                description: *description,
            }),
            _ => Err(ProtoError::MalformedAlert(bytes.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_notify_bytes() {
        let alert = Alert::close_notify();
        assert_eq!(alert.to_bytes(), [LEVEL_WARNING, CLOSE_NOTIFY]);
        assert!(Alert::from_bytes(&alert.to_bytes()).unwrap().is_close_notify());
    }

    #[test]
    fn test_malformed_alert() {
        assert_eq!(Alert::from_bytes(&[1]), Err(ProtoError::MalformedAlert(1)));
        assert_eq!(Alert::from_bytes(&[1, 2, 3]), Err(ProtoError::MalformedAlert(3)));
    }
}
