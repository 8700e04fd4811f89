//! # secpump-proto
//!
//! リファレンスエンジン（`secpump-crypto`）のワイヤ形式。
//!
//! ## レコード
//!
//! ```text
//! [content_type: u8][version: u16 BE][length: u16 BE][body: length bytes]
//!
//! content_type:
//!   21 = Alert
//!   22 = Handshake
//!   23 = ApplicationData
//! ```
//!
//! ApplicationData と確立後の Alert の body は AEAD で保護される
//! （保護の形式は `secpump-crypto` を参照）。
//!
//! ## ハンドシェイクメッセージ
//!
//! Handshake レコードの body は Protocol Buffers で符号化した [`HandshakeMessage`]。
//! `kind` フィールドで ClientHello / ServerHello / HelloRequest を区別する。

#![no_std]
extern crate alloc;

pub mod alert;
pub mod error;
pub mod handshake;
pub mod record;

pub use alert::Alert;
pub use error::ProtoError;
pub use handshake::{HandshakeKind, HandshakeMessage};
pub use record::{encode_record, split_record, ContentType, Record, RecordHeader};

/// レコードヘッダーのバージョンフィールド
pub const WIRE_VERSION: u16 = 0x0002;

/// ハンドシェイクメッセージのプロトコルバージョン
pub const HANDSHAKE_VERSION: u32 = 1;

/// レコードヘッダー長（content_type: 1 + version: 2 + length: 2）
pub const HEADER_LEN: usize = 5;

/// レコード body の最大長（平文最大 16384 + 保護オーバーヘッドの余裕）
pub const MAX_RECORD_BODY: usize = 16384 + 256;

/// ハンドシェイク乱数の長さ（バイト）
pub const RANDOM_LEN: usize = 16;
