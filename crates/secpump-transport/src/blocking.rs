//! ブロッキングアダプタ
//!
//! [`SecureChannelPump`] を [`Transport`] の上で同期的に駆動する。
//! ポンプの外側に重ねた便宜 API で、ポンプ自体の振る舞いは変えない。

use alloc::vec;
use alloc::vec::Vec;

use secpump_core::{HandshakeState, PumpError, SecureChannelPump, SecurityContextProvider};
use tracing::{debug, trace};

use crate::error::ChannelError;
use crate::{Transport, RECV_BUFFER_LEN};

/// ポンプとトランスポートを束ねたチャンネル
pub struct BlockingChannel<P: SecurityContextProvider, T: Transport> {
    pump: SecureChannelPump<P>,
    transport: T,
    /// `recv` 用の作業バッファ
    recv_buf: Vec<u8>,
    /// ポンプから取り出したがまだ送れていない暗号文（先頭から送る）
    unsent: Vec<u8>,
    /// トランスポートが 0 を返した
    transport_closed: bool,
}

impl<P: SecurityContextProvider, T: Transport> BlockingChannel<P, T> {
    pub fn new(pump: SecureChannelPump<P>, transport: T) -> Self {
        BlockingChannel {
            pump,
            transport,
            recv_buf: vec![0u8; RECV_BUFFER_LEN],
            unsent: Vec::new(),
            transport_closed: false,
        }
    }

    /// ハンドシェイクが完了するまで送受信を繰り返す
    ///
    /// # エラー
    /// - `ChannelError::Pump`: ハンドシェイク失敗、またはハンドシェイク中に閉じられた
    /// - `ChannelError::TransportClosed`: 完了前にトランスポートが閉じた
    pub fn connect(&mut self) -> Result<(), ChannelError<T::Error>> {
        loop {
            self.pump()?;
            match self.pump.state() {
                HandshakeState::Established => {
                    debug!(peer = %self.pump.peer_identity(), "secure channel connected");
                    return Ok(());
                }
                HandshakeState::Failed | HandshakeState::Closed => return Err(self.terminal_error()),
                _ => {}
            }
            if self.transport_closed {
                return Err(ChannelError::TransportClosed);
            }
            self.receive()?;
        }
    }

    /// 平文をすべて暗号化して送る
    pub fn write_all(&mut self, data: &[u8]) -> Result<(), ChannelError<T::Error>> {
        self.pump.submit_plaintext(data)?;
        self.pump()
    }

    /// 復号済みの平文を読む
    ///
    /// 手元に平文がなければトランスポートから受信して復号する。
    ///
    /// # 戻り値
    /// 読み込んだバイト数。ピアが終了通知を送った後、残りの平文を読み切ると 0。
    ///
    /// # エラー
    /// - `ChannelError::TransportClosed`: 終了通知なしにトランスポートが閉じた
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError<T::Error>> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.pump.drain_decoded_plaintext_into(buf);
            if n > 0 {
                return Ok(n);
            }
            match self.pump.state() {
                HandshakeState::Failed => return Err(self.terminal_error()),
                HandshakeState::Closed => return Ok(0),
                _ => {}
            }
            if self.transport_closed {
                return Err(ChannelError::TransportClosed);
            }
            self.receive()?;
            self.pump()?;
        }
    }

    /// 終了トークンを送ってチャンネルを閉じる
    pub fn close(&mut self) -> Result<(), ChannelError<T::Error>> {
        self.pump.request_close();
        self.pump()
    }

    /// `process()` を 1 回呼び、出力された暗号文をすべて送る
    ///
    /// # エラー
    /// パスが失敗した場合はポンプのエラーを返す（送信の失敗より優先する）。
    pub fn pump(&mut self) -> Result<(), ChannelError<T::Error>> {
        let result = self.pump.process();
        // 失敗したパスで積まれた分も送る
        let flushed = self.flush();
        if let Err(err) = result {
            if flushed.is_err() {
                debug!(unsent = self.unsent.len(), "flush after failed pass did not complete");
            }
            return Err(ChannelError::Pump(err));
        }
        flushed
    }

    /// 送信キューの暗号文をすべてトランスポートに書き出す
    ///
    /// 前回送りきれなかった分を先に送り、そのあとにポンプの送信キューを続ける。
    /// 送信に失敗しても未送信分はチャンネルに残るので、次の `flush` で
    /// 同じ順序のまま再開できる。
    pub fn flush(&mut self) -> Result<(), ChannelError<T::Error>> {
        let drained = self.pump.drain_ciphertext_to_send(usize::MAX);
        self.unsent.extend_from_slice(&drained);

        let mut written = 0;
        let result = loop {
            if written >= self.unsent.len() {
                break Ok(());
            }
            match self.transport.send(&self.unsent[written..]) {
                Ok(0) => {
                    self.transport_closed = true;
                    break Err(ChannelError::TransportClosed);
                }
                Ok(n) => written += n.min(self.unsent.len() - written),
                Err(err) => break Err(ChannelError::Transport(err)),
            }
        };

        self.unsent.drain(..written);
        if written > 0 {
            trace!(bytes = written, unsent = self.unsent.len(), "ciphertext sent");
        }
        result
    }

    /// 送信待ちの暗号文のバイト数（ポンプの送信キューと未送信分の合計）
    pub fn pending_send(&self) -> usize {
        self.unsent.len() + self.pump.pending_ciphertext_to_send()
    }

    pub fn get_ref(&self) -> &SecureChannelPump<P> {
        &self.pump
    }

    pub fn get_mut(&mut self) -> &mut SecureChannelPump<P> {
        &mut self.pump
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// トランスポートが閉じたか
    pub fn is_transport_closed(&self) -> bool {
        self.transport_closed
    }

    /// ポンプとトランスポートに分解する
    ///
    /// 送りきれていない暗号文（[`Self::pending_send`] のうちチャンネル側の分）は捨てられる。
    pub fn into_parts(self) -> (SecureChannelPump<P>, T) {
        (self.pump, self.transport)
    }

    // ===== Private メソッド =====

    /// 1 回だけ受信してポンプに積む
    fn receive(&mut self) -> Result<(), ChannelError<T::Error>> {
        let n = self
            .transport
            .recv(&mut self.recv_buf)
            .map_err(ChannelError::Transport)?;
        if n == 0 {
            debug!("transport closed by peer");
            self.transport_closed = true;
            return Ok(());
        }
        trace!(bytes = n, "ciphertext received");
        self.pump.submit_received_ciphertext(&self.recv_buf[..n])?;
        Ok(())
    }

    fn terminal_error(&self) -> ChannelError<T::Error> {
        match self.pump.last_error() {
            Some(err) => ChannelError::Pump(err.clone()),
            None => ChannelError::Pump(PumpError::ChannelClosed {
                state: self.pump.state(),
            }),
        }
    }
}

impl<P: SecurityContextProvider, T: Transport> core::fmt::Debug for BlockingChannel<P, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockingChannel")
            .field("pump", &self.pump)
            .field("unsent", &self.unsent.len())
            .field("transport_closed", &self.transport_closed)
            .finish_non_exhaustive()
    }
}
