//! # secpump-core
//!
//! クライアント側セキュアチャンネルのセッションポンプ（sans-I/O）。
//!
//! レコード指向のトランスポートセキュリティプロトコル（ハンドシェイク、
//! レコードの暗号化/復号、終了処理）を任意のバイトトランスポート上で駆動する。
//! ネットワーク I/O は一切行わない。
//!
//! ## データの流れ
//!
//! ```text
//! 送信:
//!   アプリ → submit_plaintext → [process: 暗号化] → drain_ciphertext_to_send → transport.send
//!
//! 受信:
//!   transport.recv → submit_received_ciphertext → [process: ハンドシェイク/復号]
//!                  → drain_decoded_plaintext → アプリ
//! ```
//!
//! ## 状態遷移
//!
//! ```text
//! NotStarted --begin_handshake--> InProgress --Complete--> Established
//! InProgress --Error--> Failed
//! Established --Renegotiate(復号中)--> Renegotiating --(ハンドシェイク)--> Established | Failed
//! Established | Renegotiating --request_close--> Closed（終了トークンをキューに積んだ時点）
//! 任意の状態 --Error--> Failed（終端）
//! ```
//!
//! 暗号エンジン自体は [`SecurityContextProvider`] として外から注入する。

#![no_std]
extern crate alloc;

pub mod config;
pub mod error;
pub mod provider;
pub mod pump;

pub use config::PumpConfig;
pub use error::{ProviderError, PumpError};
pub use provider::{
    DecryptStatus, DecryptStep, HandshakeStart, HandshakeStatus, HandshakeStep, RecordLimits,
    SecurityContextProvider,
};
pub use pump::{HandshakeState, PumpStats, SecureChannelPump, SecurityContext};
