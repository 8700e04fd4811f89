//! # secpump-transport
//!
//! セッションポンプの外側に置くトランスポート層。
//!
//! - [`Transport`]: 双方向バイトストリームの最小インターフェース
//! - [`BlockingChannel`]: ポンプとトランスポートを束ねた同期 API
//!   （`connect` / `write_all` / `read` / `close`）
//! - `IoTransport`（`std` feature）: `std::io::Read + Write` をそのまま使う
//!
//! ポンプ本体は I/O を持たないので、イベントループに組み込む場合は
//! このクレートを使わずに `SecureChannelPump` を直接駆動すればよい。
//!
//! ## 駆動ループ
//!
//! ```text
//! loop {
//!     pump.process()
//!     transport.send(pump.drain_ciphertext_to_send())   // FIFO 順を守る
//!     n = transport.recv(buf)                           // 0 = 切断
//!     pump.submit_received_ciphertext(buf[..n])
//!     app.consume(pump.drain_decoded_plaintext())
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod blocking;
pub mod error;
#[cfg(feature = "std")]
pub mod io;

pub use blocking::BlockingChannel;
pub use error::ChannelError;
#[cfg(feature = "std")]
pub use io::IoTransport;

/// 1 回の `recv` で読み込むバッファの大きさ（バイト）
pub const RECV_BUFFER_LEN: usize = 8192;

/// 双方向バイトストリーム
///
/// 名前解決や接続の確立は呼び出し側の責務。
pub trait Transport {
    /// トランスポート固有のエラー
    type Error;

    /// バイト列を送る
    ///
    /// # 戻り値
    /// 実際に書き込んだバイト数（`buf.len()` より少ない場合がある）
    fn send(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;

    /// バイト列を受け取る
    ///
    /// # 戻り値
    /// 読み込んだバイト数。0 はトランスポートが閉じたことを表す。
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn send(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        (**self).send(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).recv(buf)
    }
}
