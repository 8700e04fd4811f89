//! ポンプの設定

use serde::{Deserialize, Serialize};

use crate::provider::RecordLimits;

/// キューの既定の初期容量（バイト）
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// [`crate::SecureChannelPump`] の設定
///
/// JSON から読み込む場合、省略したフィールドは既定値になる。
///
/// ```text
/// { "initial_queue_capacity": 4096, "max_plaintext_record": 1200 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// 4 本のキューそれぞれの初期容量（バイト）
    pub initial_queue_capacity: usize,
    /// 1 レコードに載せる平文の上限（プロバイダの上限より大きい値は切り詰める）
    pub max_plaintext_record: Option<usize>,
}

impl Default for PumpConfig {
    fn default() -> Self {
        PumpConfig {
            initial_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_plaintext_record: None,
        }
    }
}

impl PumpConfig {
    /// 暗号化 1 回あたりに切り出す平文のバイト数
    ///
    /// プロバイダの上限と設定値の小さい方。0 にはならない。
    pub fn plaintext_chunk(&self, limits: &RecordLimits) -> usize {
        let provider_max = limits.max_plaintext_record;
        self.max_plaintext_record
            .map_or(provider_max, |cap| cap.min(provider_max))
            .max(1)
    }
}
