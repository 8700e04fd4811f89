//! セキュアチャンネルのセッションポンプ
//!
//! 4 本のバイトキューとセキュリティコンテキストを所有し、`process()` 1 回ごとに
//! ハンドシェイク駆動 → 復号 → 暗号化 → 終了処理 の順で進められるだけ進める。
//!
//! ```text
//! send_plaintext  --encrypt_record-->  send_ciphertext  --drain--> トランスポート
//! recv_plaintext  <--decrypt_record--  recv_ciphertext  <--submit-- トランスポート
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use secpump_queue::ByteRingQueue;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::PumpConfig;
use crate::error::PumpError;
use crate::provider::{DecryptStatus, HandshakeStatus, RecordLimits, SecurityContextProvider};

/// チャンネルの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandshakeState {
    /// まだ `process()` が呼ばれていない
    NotStarted,
    /// ハンドシェイク中
    InProgress,
    /// アプリケーションデータを送受信できる
    Established,
    /// ピアの要求で再ハンドシェイク中（暗号化・復号は一時停止）
    Renegotiating,
    /// 失敗（終端）
    Failed,
    /// 終了トークンを積んだ（終端）
    Closed,
}

impl HandshakeState {
    /// これ以上処理が進まない状態か
    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeState::Failed | HandshakeState::Closed)
    }
}

/// プロバイダのコンテキスト
///
/// 最初の `begin_handshake` までは `Uninitialized`。
#[derive(Debug)]
pub enum SecurityContext<C> {
    /// まだハンドシェイクを開始していない
    Uninitialized,
    /// ハンドシェイク開始済み
    Active(C),
}

impl<C> SecurityContext<C> {
    /// ハンドシェイク開始済みか
    pub fn is_active(&self) -> bool {
        matches!(self, SecurityContext::Active(_))
    }

    /// 開始済みならコンテキストへの参照
    pub fn active(&self) -> Option<&C> {
        match self {
            SecurityContext::Active(ctx) => Some(ctx),
            SecurityContext::Uninitialized => None,
        }
    }

    /// 開始済みならコンテキストへの可変参照
    pub fn active_mut(&mut self) -> Option<&mut C> {
        match self {
            SecurityContext::Active(ctx) => Some(ctx),
            SecurityContext::Uninitialized => None,
        }
    }
}

/// 統計情報のスナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PumpStats {
    pub state: HandshakeState,
    /// `process()` の呼び出し回数
    pub process_calls: u64,
    /// `continue_handshake` の呼び出し回数
    pub handshake_rounds: u64,
    /// 完了したハンドシェイク数（再ネゴシエーションを含む）
    pub handshakes_completed: u64,
    /// ピアから受けた再ネゴシエーション要求の数
    pub renegotiations: u64,
    pub records_encrypted: u64,
    pub records_decrypted: u64,
    /// `submit_plaintext` で受け取った総バイト数
    pub plaintext_submitted: u64,
    /// `submit_received_ciphertext` で受け取った総バイト数
    pub ciphertext_received: u64,
    /// 送信キューに積まれた暗号文の総バイト数（トークン・レコード）
    pub ciphertext_produced: u64,
    /// 復号された平文の総バイト数
    pub plaintext_decoded: u64,
    pub pending_plaintext_to_send: usize,
    pub pending_ciphertext_to_send: usize,
    pub pending_received_ciphertext: usize,
    pub pending_decoded_plaintext: usize,
}

#[derive(Debug, Default)]
struct Counters {
    process_calls: u64,
    handshake_rounds: u64,
    handshakes_completed: u64,
    renegotiations: u64,
    records_encrypted: u64,
    records_decrypted: u64,
    plaintext_submitted: u64,
    ciphertext_received: u64,
}

/// クライアント側セキュアチャンネルのセッションポンプ
///
/// I/O は行わない。呼び出し側は新しい入力が届いたとき・送信データを積んだとき・
/// 定期的に [`process`](Self::process) を呼び、`drain_ciphertext_to_send` の出力を
/// 順序を変えずにトランスポートへ書き出す。
///
/// # 使用例
///
/// ```ignore
/// let mut pump = SecureChannelPump::new(provider, "db.internal");
/// pump.submit_plaintext(b"GET / HTTP/1.1\r\n\r\n")?;
/// loop {
///     pump.process()?;
///     transport.send(&pump.drain_ciphertext_to_send(usize::MAX))?;
///     let n = transport.recv(&mut buf)?;
///     if n == 0 { break; }
///     pump.submit_received_ciphertext(&buf[..n])?;
///     app.consume(&pump.drain_decoded_plaintext(usize::MAX));
/// }
/// ```
pub struct SecureChannelPump<P: SecurityContextProvider> {
    provider: P,
    context: SecurityContext<P::Context>,
    /// 接続先の識別子（`begin_handshake` に渡す）
    peer_identity: String,
    state: HandshakeState,
    config: PumpConfig,

    /// アプリが積んだ未暗号化データ
    send_plaintext: ByteRingQueue,
    /// トランスポートに書き出す暗号文（トークン・レコード）
    send_ciphertext: ByteRingQueue,
    /// トランスポートから届いた未処理の暗号文
    recv_ciphertext: ByteRingQueue,
    /// アプリに渡す復号済みデータ
    recv_plaintext: ByteRingQueue,

    /// 次の `process()` で終了トークンを積む
    want_close: bool,
    /// 次の `process()` でハンドシェイクをやり直す
    must_renegotiate: bool,
    /// ピアの終了通知を受信した
    peer_closed: bool,
    /// ハンドシェイク完了時に取得したレコード上限
    limits: Option<RecordLimits>,
    last_error: Option<PumpError>,
    counters: Counters,
}

impl<P: SecurityContextProvider> SecureChannelPump<P> {
    /// 既定の設定でポンプを生成する
    ///
    /// # 引数
    /// - `provider`: 暗号エンジン
    /// - `peer_identity`: 接続先の識別子
    pub fn new(provider: P, peer_identity: &str) -> Self {
        Self::with_config(provider, peer_identity, PumpConfig::default())
    }

    /// 設定を指定してポンプを生成する
    pub fn with_config(provider: P, peer_identity: &str, config: PumpConfig) -> Self {
        let capacity = config.initial_queue_capacity;
        SecureChannelPump {
            provider,
            context: SecurityContext::Uninitialized,
            peer_identity: String::from(peer_identity),
            state: HandshakeState::NotStarted,
            config,
            send_plaintext: ByteRingQueue::with_capacity(capacity),
            send_ciphertext: ByteRingQueue::with_capacity(capacity),
            recv_ciphertext: ByteRingQueue::with_capacity(capacity),
            recv_plaintext: ByteRingQueue::with_capacity(capacity),
            want_close: false,
            must_renegotiate: false,
            peer_closed: false,
            limits: None,
            last_error: None,
            counters: Counters::default(),
        }
    }

    // ===== 入出力キュー =====

    /// 送信する平文を積む
    ///
    /// # エラー
    /// - `PumpError::ChannelClosed`: `Failed` / `Closed` の状態
    pub fn submit_plaintext(&mut self, bytes: &[u8]) -> Result<(), PumpError> {
        self.ensure_open()?;
        self.send_plaintext.append(bytes);
        self.counters.plaintext_submitted += bytes.len() as u64;
        Ok(())
    }

    /// トランスポートから受信した暗号文を積む
    ///
    /// # エラー
    /// - `PumpError::ChannelClosed`: `Failed` / `Closed` の状態
    pub fn submit_received_ciphertext(&mut self, bytes: &[u8]) -> Result<(), PumpError> {
        self.ensure_open()?;
        self.recv_ciphertext.append(bytes);
        self.counters.ciphertext_received += bytes.len() as u64;
        Ok(())
    }

    /// トランスポートに書き出す暗号文を最大 `max_bytes` バイト取り出す
    ///
    /// どの状態でも取り出せる（`Closed` 後の終了トークンを含む）。
    pub fn drain_ciphertext_to_send(&mut self, max_bytes: usize) -> Vec<u8> {
        self.send_ciphertext.read(max_bytes)
    }

    /// 復号済みの平文を最大 `max_bytes` バイト取り出す
    pub fn drain_decoded_plaintext(&mut self, max_bytes: usize) -> Vec<u8> {
        self.recv_plaintext.read(max_bytes)
    }

    /// 復号済みの平文を `dst` を埋められるだけ取り出す
    ///
    /// # 戻り値
    /// 書き込んだバイト数
    pub fn drain_decoded_plaintext_into(&mut self, dst: &mut [u8]) -> usize {
        self.recv_plaintext.read_into(dst)
    }

    /// 復号済みの平文を取り出さずに覗く
    pub fn peek_decoded_plaintext(&self, offset: usize, count: usize) -> Vec<u8> {
        self.recv_plaintext.peek(offset, count)
    }

    /// 次の `process()` で終了トークンを積むよう要求する
    pub fn request_close(&mut self) {
        if !self.state.is_terminal() {
            debug!(state = ?self.state, "close requested");
            self.want_close = true;
        }
    }

    // ===== メイン処理 =====

    /// 1 パス分の処理を行う（ノンブロッキング）
    ///
    /// 1. ハンドシェイク駆動（未確立、または再ネゴシエーション要求あり）
    /// 2. 復号（`Established` のときのみ）
    /// 3. 暗号化（`Established` のときのみ）
    /// 4. 終了要求があれば終了トークンを積んで `Closed` にする
    ///
    /// 処理時間はキューに溜まっているバイト数に比例する。
    ///
    /// # エラー
    /// このパスでチャンネルが `Failed` になった場合、その原因を返す。
    /// 同じエラーは [`last_error`](Self::last_error) にも残る。
    /// `Failed` / `Closed` の後の呼び出しは何もせず `Ok(())` を返す。
    pub fn process(&mut self) -> Result<(), PumpError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.counters.process_calls += 1;

        match self.run_pass() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.fail(err.clone());
                Err(err)
            }
        }
    }

    // ===== 状態 =====

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// アプリケーションデータを送受信できる状態か
    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Established
    }

    /// `Closed` か
    pub fn is_closed(&self) -> bool {
        self.state == HandshakeState::Closed
    }

    /// ピアの終了通知を受信したか
    pub fn peer_closed(&self) -> bool {
        self.peer_closed
    }

    /// ハンドシェイク完了後のレコード上限
    pub fn record_limits(&self) -> Option<RecordLimits> {
        self.limits
    }

    /// チャンネルを `Failed` にしたエラー
    pub fn last_error(&self) -> Option<&PumpError> {
        self.last_error.as_ref()
    }

    /// 接続先の識別子
    pub fn peer_identity(&self) -> &str {
        &self.peer_identity
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// プロバイダのコンテキスト（ハンドシェイク開始前は `Uninitialized`）
    pub fn context(&self) -> &SecurityContext<P::Context> {
        &self.context
    }

    pub fn pending_plaintext_to_send(&self) -> usize {
        self.send_plaintext.pending_count()
    }

    pub fn pending_ciphertext_to_send(&self) -> usize {
        self.send_ciphertext.pending_count()
    }

    pub fn pending_received_ciphertext(&self) -> usize {
        self.recv_ciphertext.pending_count()
    }

    pub fn pending_decoded_plaintext(&self) -> usize {
        self.recv_plaintext.pending_count()
    }

    /// 統計情報
    pub fn stats(&self) -> PumpStats {
        PumpStats {
            state: self.state,
            process_calls: self.counters.process_calls,
            handshake_rounds: self.counters.handshake_rounds,
            handshakes_completed: self.counters.handshakes_completed,
            renegotiations: self.counters.renegotiations,
            records_encrypted: self.counters.records_encrypted,
            records_decrypted: self.counters.records_decrypted,
            plaintext_submitted: self.counters.plaintext_submitted,
            ciphertext_received: self.counters.ciphertext_received,
            ciphertext_produced: self.send_ciphertext.total_appended(),
            plaintext_decoded: self.recv_plaintext.total_appended(),
            pending_plaintext_to_send: self.send_plaintext.pending_count(),
            pending_ciphertext_to_send: self.send_ciphertext.pending_count(),
            pending_received_ciphertext: self.recv_ciphertext.pending_count(),
            pending_decoded_plaintext: self.recv_plaintext.pending_count(),
        }
    }

    // ===== Private メソッド =====

    fn run_pass(&mut self) -> Result<(), PumpError> {
        // 一度もハンドシェイクしていない接続の終了は、トークンなしで閉じる
        if self.state == HandshakeState::NotStarted && self.want_close {
            self.want_close = false;
            self.transition(HandshakeState::Closed);
            return Ok(());
        }

        self.drive_handshake()?;

        if self.state == HandshakeState::Established {
            self.pump_decode()?;
        }
        if self.state == HandshakeState::Established {
            self.pump_encode()?;
        }

        self.close_if_requested();
        Ok(())
    }

    fn needs_handshake(&self) -> bool {
        self.must_renegotiate
            || matches!(
                self.state,
                HandshakeState::NotStarted
                    | HandshakeState::InProgress
                    | HandshakeState::Renegotiating
            )
    }

    /// ハンドシェイクを進められるだけ進める
    fn drive_handshake(&mut self) -> Result<(), PumpError> {
        while self.needs_handshake() {
            let Some(ctx) = self.context.active_mut() else {
                self.begin_handshake()?;
                continue;
            };

            let input = self.recv_ciphertext.read(self.recv_ciphertext.pending_count());
            let step = self.provider.continue_handshake(ctx, &input);
            self.counters.handshake_rounds += 1;

            let extra = step.extra_bytes(&input);
            if !extra.is_empty() {
                self.recv_ciphertext.prepend(extra);
            }
            if !step.token.is_empty() {
                self.send_ciphertext.append(&step.token);
            }
            trace!(
                consumed = step.consumed,
                token = step.token.len(),
                extra = extra.len(),
                "handshake round"
            );

            match step.status {
                HandshakeStatus::ContinueNeeded => {
                    if step.consumed == 0 && step.token.is_empty() {
                        // 何も進まなかったので入力を待つ
                        break;
                    }
                }
                HandshakeStatus::Complete => {
                    let limits = self.provider.query_record_limits(ctx);
                    self.complete_handshake(limits);
                }
                HandshakeStatus::IncompleteInput => break,
                HandshakeStatus::Error(err) => return Err(PumpError::Handshake(err)),
            }
        }
        Ok(())
    }

    fn begin_handshake(&mut self) -> Result<(), PumpError> {
        let start = self
            .provider
            .begin_handshake(&self.peer_identity)
            .map_err(PumpError::Handshake)?;

        self.context = SecurityContext::Active(start.context);
        self.send_ciphertext.append(&start.token);
        debug!(
            peer = %self.peer_identity,
            token = start.token.len(),
            "handshake started"
        );
        self.transition(HandshakeState::InProgress);
        Ok(())
    }

    fn complete_handshake(&mut self, limits: RecordLimits) {
        self.limits = Some(limits);
        self.must_renegotiate = false;
        self.counters.handshakes_completed += 1;
        debug!(
            max_plaintext_record = limits.max_plaintext_record,
            header_size = limits.header_size,
            trailer_size = limits.trailer_size,
            "handshake complete"
        );
        self.transition(HandshakeState::Established);
    }

    /// 受信キューのレコードを復号できるだけ復号する
    ///
    /// 受信キューを一度だけ読み出し、ローカルバッファ上でレコード境界を進める。
    /// 消費されなかった残りは最後にまとめて受信キューの先頭へ書き戻す。
    fn pump_decode(&mut self) -> Result<(), PumpError> {
        if self.recv_ciphertext.is_empty() {
            return Ok(());
        }
        let input = self.recv_ciphertext.read(self.recv_ciphertext.pending_count());
        let mut offset = 0;

        let result = loop {
            if offset >= input.len() {
                break Ok(());
            }
            let Some(ctx) = self.context.active_mut() else {
                break Ok(());
            };

            let step = self.provider.decrypt_record(ctx, &input[offset..]);
            let consumed = step.consumed.min(input.len() - offset);
            offset += consumed;
            if !step.plaintext.is_empty() {
                self.recv_plaintext.append(&step.plaintext);
            }

            match step.status {
                DecryptStatus::Ok => {
                    if consumed == 0 && step.plaintext.is_empty() {
                        break Ok(());
                    }
                    self.counters.records_decrypted += 1;
                    trace!(consumed, plaintext = step.plaintext.len(), "record decrypted");
                }
                DecryptStatus::IncompleteInput => break Ok(()),
                DecryptStatus::Renegotiate => {
                    self.must_renegotiate = true;
                    self.counters.renegotiations += 1;
                    debug!(consumed, "peer requested renegotiation");
                    self.transition(HandshakeState::Renegotiating);
                    break Ok(());
                }
                DecryptStatus::PeerClosed => {
                    self.peer_closed = true;
                    self.want_close = true;
                    debug!("peer closed the channel");
                    break Ok(());
                }
                DecryptStatus::Error(err) => break Err(PumpError::Decode(err)),
            }
        };

        if offset < input.len() {
            self.recv_ciphertext.prepend(&input[offset..]);
        }
        result
    }

    /// 送信待ちの平文をレコード上限ごとに暗号化する
    fn pump_encode(&mut self) -> Result<(), PumpError> {
        let Some(limits) = self.limits else {
            return Ok(());
        };
        let chunk_size = self.config.plaintext_chunk(&limits);

        while !self.send_plaintext.is_empty() {
            let Some(ctx) = self.context.active_mut() else {
                break;
            };
            let chunk = self.send_plaintext.read(chunk_size);
            let record = self
                .provider
                .encrypt_record(ctx, &chunk)
                .map_err(PumpError::Encode)?;
            self.send_ciphertext.append(&record);
            self.counters.records_encrypted += 1;
            trace!(plaintext = chunk.len(), record = record.len(), "record encrypted");
        }
        Ok(())
    }

    /// 終了要求があれば終了トークンを積んで `Closed` にする
    fn close_if_requested(&mut self) {
        if !self.want_close {
            return;
        }
        self.want_close = false;

        if let Some(ctx) = self.context.active_mut() {
            let token = self.provider.request_shutdown(ctx);
            self.send_ciphertext.append(&token);
            debug!(token = token.len(), peer_closed = self.peer_closed, "shutdown token queued");
        }
        self.transition(HandshakeState::Closed);
    }

    fn ensure_open(&self) -> Result<(), PumpError> {
        if self.state.is_terminal() {
            return Err(PumpError::ChannelClosed { state: self.state });
        }
        Ok(())
    }

    fn fail(&mut self, err: PumpError) {
        warn!(state = ?self.state, error = %err, "secure channel failed");
        self.transition(HandshakeState::Failed);
        self.want_close = false;
        self.must_renegotiate = false;
        self.last_error = Some(err);
    }

    fn transition(&mut self, next: HandshakeState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "state transition");
            self.state = next;
        }
    }
}

impl<P: SecurityContextProvider> core::fmt::Debug for SecureChannelPump<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecureChannelPump")
            .field("peer_identity", &self.peer_identity)
            .field("state", &self.state)
            .field("want_close", &self.want_close)
            .field("must_renegotiate", &self.must_renegotiate)
            .field("peer_closed", &self.peer_closed)
            .finish_non_exhaustive()
    }
}
