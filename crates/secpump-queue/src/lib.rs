//! # secpump-queue
//!
//! セキュアチャンネルのポンプが使うバイトキュー。
//!
//! プロトコル処理とソケットの読み書きを切り離すためのバッファで、
//! ポンプ 1 つにつき 4 本（送信平文・送信暗号文・受信暗号文・受信平文）を所有する。
//!
//! ## キューの操作
//!
//! ```text
//! append(bytes)        末尾に追加（容量が足りなければ拡張）
//! read(max)            先頭から破壊的に読み出す（不足時は短く返す）
//! peek(offset, count)  非破壊で覗く
//! prepend(bytes)       未読データの「前」に書き戻す（extra bytes の復元用）
//! ```
//!
//! 操作はどれも失敗しない。要求より少ないバイトしかなければ、あるだけを返す。

#![no_std]
extern crate alloc;

pub mod queue;

pub use queue::ByteRingQueue;

/// 既定の初期容量（バイト）
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// 拡張時の倍率
///
/// 新しい容量 = max(容量 + 必要量, 容量 × GROWTH_FACTOR)
pub const GROWTH_FACTOR: usize = 3;
