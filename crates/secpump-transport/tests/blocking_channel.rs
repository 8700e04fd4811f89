//! BlockingChannel の結合テスト
//!
//! クライアントの BlockingChannel と、同じプロセス内のサーバーポンプを
//! メモリ上のトランスポートでつなぐ。サーバーは受け取った平文を大文字にして返し、
//! "bye" を受け取ったら返信のあとに自分から閉じる。
//! 送信側は一時的な失敗と短い書き込みを再現できる。

use std::collections::VecDeque;

use secpump_core::{HandshakeState, ProviderError, PumpError, SecureChannelPump};
use secpump_crypto::PskEngine;
use secpump_proto::ContentType;
use secpump_transport::{BlockingChannel, ChannelError, Transport};

const PSK: [u8; 16] = [0x3C; 16];
const PEER: &str = "echo.internal";

/// サーバーポンプを内蔵したトランスポート
struct EchoServer {
    pump: SecureChannelPump<PskEngine>,
    outbox: VecDeque<u8>,
    /// 1 回の recv で返す最大バイト数（分割受信の再現用）
    max_recv: usize,
    /// 1 回の send で受け取る最大バイト数（短い書き込みの再現用）
    max_send: usize,
    /// この回数だけ send を失敗させる
    fail_sends: usize,
    /// サーバーが受け取った平文
    received: Vec<u8>,
}

/// 一時的な送信失敗
#[derive(Debug, PartialEq, Eq)]
struct WouldBlock;

impl EchoServer {
    fn new(psk: [u8; 16], max_recv: usize) -> Self {
        EchoServer {
            pump: SecureChannelPump::new(PskEngine::server(psk), PEER),
            outbox: VecDeque::new(),
            max_recv,
            max_send: usize::MAX,
            fail_sends: 0,
            received: Vec::new(),
        }
    }

    fn run(&mut self) {
        if self.pump.process().is_err() {
            self.flush();
            return;
        }
        let data = self.pump.drain_decoded_plaintext(usize::MAX);
        if !data.is_empty() {
            self.received.extend_from_slice(&data);
            let _ = self.pump.submit_plaintext(&data.to_ascii_uppercase());
            if data == b"bye" {
                self.pump.request_close();
            }
            let _ = self.pump.process();
        }
        self.flush();
    }

    fn flush(&mut self) {
        let out = self.pump.drain_ciphertext_to_send(usize::MAX);
        self.outbox.extend(out);
    }
}

impl Transport for EchoServer {
    type Error = WouldBlock;

    fn send(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_sends > 0 {
            self.fail_sends -= 1;
            return Err(WouldBlock);
        }
        let n = buf.len().min(self.max_send);
        let _ = self.pump.submit_received_ciphertext(&buf[..n]);
        self.run();
        Ok(n)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.max_recv).min(self.outbox.len());
        for (dst, src) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

fn client(server: EchoServer) -> BlockingChannel<PskEngine, EchoServer> {
    let pump = SecureChannelPump::new(PskEngine::client(PSK), PEER);
    BlockingChannel::new(pump, server)
}

fn read_exact(channel: &mut BlockingChannel<PskEngine, EchoServer>, len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 64];
    while out.len() < len {
        let n = channel.read(&mut buf).unwrap();
        assert!(n > 0, "unexpected end of stream");
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[test]
fn test_connect_and_echo() {
    let mut channel = client(EchoServer::new(PSK, usize::MAX));
    channel.connect().unwrap();
    assert!(channel.get_ref().is_established());

    channel.write_all(b"ping").unwrap();
    assert_eq!(read_exact(&mut channel, 4), b"PING");
}

#[test]
fn test_echo_with_tiny_transport_reads() {
    // 3 バイトずつしか受信できないトランスポートでも結果は同じ
    let mut channel = client(EchoServer::new(PSK, 3));
    channel.connect().unwrap();

    channel.write_all(b"fragmented transport").unwrap();
    assert_eq!(read_exact(&mut channel, 20), b"FRAGMENTED TRANSPORT");
}

#[test]
fn test_client_close_reaches_server() {
    let mut channel = client(EchoServer::new(PSK, usize::MAX));
    channel.connect().unwrap();
    channel.close().unwrap();
    assert!(channel.get_ref().is_closed());

    let (_, server) = channel.into_parts();
    assert!(server.pump.peer_closed());
    assert!(server.pump.is_closed());
}

#[test]
fn test_server_close_ends_stream() {
    let mut channel = client(EchoServer::new(PSK, usize::MAX));
    channel.connect().unwrap();
    channel.write_all(b"bye").unwrap();

    assert_eq!(read_exact(&mut channel, 3), b"BYE");
    let mut buf = [0u8; 8];
    assert_eq!(channel.read(&mut buf).unwrap(), 0);
    assert!(channel.get_ref().peer_closed());

    // 閉じたチャンネルには書き込めない
    assert!(matches!(
        channel.write_all(b"late"),
        Err(ChannelError::Pump(PumpError::ChannelClosed { .. }))
    ));
}

#[test]
fn test_wrong_psk_fails_connect() {
    let mut channel = client(EchoServer::new([0x01; 16], usize::MAX));
    let err = channel.connect().unwrap_err();
    assert!(matches!(
        err,
        ChannelError::Pump(PumpError::Handshake(ProviderError::AuthenticationFailed))
    ));
    assert_eq!(channel.get_ref().state(), HandshakeState::Failed);
}

/// 何も返さずに切断するトランスポート
struct Silent;

impl Transport for Silent {
    type Error = std::convert::Infallible;

    fn send(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn recv(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

#[test]
fn test_transport_closed_during_handshake() {
    let pump = SecureChannelPump::new(PskEngine::client(PSK), PEER);
    let mut channel = BlockingChannel::new(pump, Silent);

    assert!(matches!(channel.connect(), Err(ChannelError::TransportClosed)));
    assert!(channel.is_transport_closed());
    assert_eq!(channel.get_ref().state(), HandshakeState::InProgress);
}

#[test]
fn test_failed_send_keeps_ciphertext_in_order() {
    let mut channel = client(EchoServer::new(PSK, usize::MAX));
    channel.connect().unwrap();

    channel.transport_mut().fail_sends = 1;
    let err = channel.write_all(b"first").unwrap_err();
    assert!(matches!(err, ChannelError::Transport(WouldBlock)));
    assert!(channel.pending_send() > 0);
    assert!(channel.transport_mut().received.is_empty());

    // 残っていた暗号文が先に送られ、レコードの順序は保たれる
    channel.write_all(b"second").unwrap();
    assert_eq!(channel.pending_send(), 0);
    assert_eq!(read_exact(&mut channel, 11), b"FIRSTSECOND");

    let (_, server) = channel.into_parts();
    assert_eq!(server.received, b"firstsecond");
    assert_eq!(server.pump.state(), HandshakeState::Established);
}

#[test]
fn test_short_writes() {
    let mut server = EchoServer::new(PSK, usize::MAX);
    server.max_send = 3;
    let mut channel = client(server);
    channel.connect().unwrap();

    channel.write_all(b"short writes").unwrap();
    assert_eq!(channel.pending_send(), 0);
    assert_eq!(read_exact(&mut channel, 12), b"SHORT WRITES");
}

#[test]
fn test_pump_error_reported_before_send_failure() {
    let mut channel = client(EchoServer::new(PSK, usize::MAX));
    channel.connect().unwrap();

    channel.transport_mut().fail_sends = usize::MAX;
    assert!(matches!(
        channel.write_all(b"stuck"),
        Err(ChannelError::Transport(WouldBlock))
    ));

    // 復号できないレコードでパスを失敗させる。送信も失敗し続けている
    let garbage = secpump_proto::encode_record(ContentType::ApplicationData, &[0u8; 24]).unwrap();
    channel.get_mut().submit_received_ciphertext(&garbage).unwrap();

    let err = channel.pump().unwrap_err();
    assert!(matches!(err, ChannelError::Pump(PumpError::Decode(_))));
    assert_eq!(channel.get_ref().state(), HandshakeState::Failed);
    assert!(channel.pending_send() > 0);
}
