//! 拡張可能なリング型バイトキュー

use alloc::vec;
use alloc::vec::Vec;

use crate::{DEFAULT_INITIAL_CAPACITY, GROWTH_FACTOR};

/// FIFO バイトキュー
///
/// `read` / `written` の 2 つのカーソル（単調増加）と、固定長のストレージで構成される。
/// ストレージ上の位置は `カーソル % 容量` で決まる。
///
/// ## 不変条件
/// - `read <= written`
/// - 未読バイト数 = `written - read` <= 容量
/// - 容量は増えるだけで減らない
///
/// ## 拡張
/// 未読バイトが容量を超えそうになったら、容量を
/// `max(容量 + 必要量, 容量 × 3)` に拡張し、未読ウィンドウを論理順のまま
/// 新しいストレージの先頭にコピーしてカーソルを振り直す。
pub struct ByteRingQueue {
    /// リングストレージ（長さ = 容量）
    storage: Vec<u8>,
    /// 読み出しカーソル
    read: usize,
    /// 書き込みカーソル
    written: usize,
    /// これまでに積んだ総バイト数（append + prepend、統計用）
    total_appended: u64,
    /// これまでに取り出した総バイト数（統計用）
    total_read: u64,
}

impl ByteRingQueue {
    /// 既定の初期容量（[`DEFAULT_INITIAL_CAPACITY`]）で空のキューを生成する
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    /// 指定した初期容量で空のキューを生成する
    ///
    /// 容量 0 は 1 に切り上げる。
    pub fn with_capacity(capacity: usize) -> Self {
        ByteRingQueue {
            storage: vec![0u8; capacity.max(1)],
            read: 0,
            written: 0,
            total_appended: 0,
            total_read: 0,
        }
    }

    /// 末尾にバイト列を追加する
    ///
    /// 容量が足りなければ拡張する。1 バイトあたり償却 O(1)。
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.reserve(bytes.len());
        self.copy_in(self.written, bytes);
        self.written += bytes.len();
        self.total_appended += bytes.len() as u64;
    }

    /// 先頭から最大 `max_count` バイトを取り出す
    ///
    /// # 戻り値
    /// 取り出したバイト列。未読が `max_count` より少なければ短く返す。
    pub fn read(&mut self, max_count: usize) -> Vec<u8> {
        let out = self.peek(0, max_count);
        self.consume(out.len());
        out
    }

    /// 先頭から `dst` を埋められるだけ取り出す
    ///
    /// # 戻り値
    /// 実際に書き込んだバイト数
    pub fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let n = self.copy_out(0, dst);
        self.consume(n);
        n
    }

    /// 先頭から `offset` バイト進んだ位置の最大 `count` バイトを非破壊で返す
    pub fn peek(&self, offset: usize, count: usize) -> Vec<u8> {
        let available = self.pending_count().saturating_sub(offset);
        let mut out = vec![0u8; count.min(available)];
        self.copy_out(offset, &mut out);
        out
    }

    /// 未読データすべての前にバイト列を書き戻す
    ///
    /// プロバイダが消費しなかった extra bytes を受信キューに戻すために使う。
    /// 書き戻したバイトは既存の未読データより先に読み出される。
    ///
    /// 読み出しカーソルを巻き戻せないときはカーソルの基準を容量の倍数だけずらす。
    /// 拡張が必要な場合は未読データのコピーが発生する（O(未読バイト数)）。
    pub fn prepend(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let n = bytes.len();
        self.reserve(n);

        if self.read < n {
            // カーソル % 容量 が変わらないよう容量の倍数だけ両カーソルを進める
            let cap = self.capacity();
            let shift = (n - self.read).div_ceil(cap) * cap;
            self.read += shift;
            self.written += shift;
        }

        self.read -= n;
        self.copy_in(self.read, bytes);
        self.total_appended += n as u64;
    }

    /// 未読バイト数
    pub fn pending_count(&self) -> usize {
        self.written - self.read
    }

    /// 未読データがないか
    pub fn is_empty(&self) -> bool {
        self.read == self.written
    }

    /// 未読データをすべて破棄する（容量はそのまま）
    pub fn clear(&mut self) {
        let pending = self.pending_count();
        self.consume(pending);
    }

    /// 現在の容量（バイト）
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// これまでに積んだ総バイト数（prepend による書き戻しを含む）
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    /// これまでに取り出した（または破棄した）総バイト数
    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    // ===== Private メソッド =====

    fn consume(&mut self, n: usize) {
        self.read += n;
        self.total_read += n as u64;
    }

    /// 未読 + `needed` バイトが収まるよう必要なら拡張する
    fn reserve(&mut self, needed: usize) {
        let pending = self.pending_count();
        let cap = self.capacity();
        if pending + needed <= cap {
            return;
        }

        let new_cap = (cap + needed).max(cap * GROWTH_FACTOR);
        let mut storage = vec![0u8; new_cap];
        self.copy_out(0, &mut storage[..pending]);

        self.storage = storage;
        self.read = 0;
        self.written = pending;
    }

    /// カーソル位置 `at` からバイト列を書き込む（折り返しあり）
    ///
    /// 呼び出し側で `bytes.len() <= 容量` を保証すること。
    fn copy_in(&mut self, at: usize, bytes: &[u8]) {
        let cap = self.capacity();
        let start = at % cap;
        let first = bytes.len().min(cap - start);
        self.storage[start..start + first].copy_from_slice(&bytes[..first]);
        let rest = bytes.len() - first;
        self.storage[..rest].copy_from_slice(&bytes[first..]);
    }

    /// 先頭から `offset` バイト先の未読データを `dst` にコピーする
    fn copy_out(&self, offset: usize, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.pending_count().saturating_sub(offset));
        if n == 0 {
            return 0;
        }
        let cap = self.capacity();
        let start = (self.read + offset) % cap;
        let first = n.min(cap - start);
        dst[..first].copy_from_slice(&self.storage[start..start + first]);
        dst[first..n].copy_from_slice(&self.storage[..n - first]);
        n
    }
}

impl Default for ByteRingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ByteRingQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ByteRingQueue")
            .field("capacity", &self.capacity())
            .field("pending", &self.pending_count())
            .finish()
    }
}
