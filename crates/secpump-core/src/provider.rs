//! セキュリティコンテキストプロバイダ（外部から注入する暗号エンジン）の契約
//!
//! ポンプはこの契約を「消費」するだけで、ハンドシェイクのレコード形式・暗号スイート・
//! 証明書検証などは実装しない。プラットフォームのネイティブ実装でも、
//! 自前のエンジン（`secpump-crypto` の `PskEngine` など）でも差し替えられる。
//!
//! ## extra bytes の扱い
//!
//! `continue_handshake` / `decrypt_record` には受信済みの暗号文をまとめて渡す。
//! プロバイダは先頭から 1 単位（1 レコード）だけ処理し、使ったバイト数を
//! `consumed` で返す。残り `input[consumed..]` は次の単位に属する extra bytes で、
//! ポンプが受信キューの先頭に書き戻す。

use alloc::vec::Vec;

use crate::error::ProviderError;

/// レコードサイズの上限（ハンドシェイク完了後のみ有効）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLimits {
    /// 1 レコードに載せられる平文の最大バイト数
    pub max_plaintext_record: usize,
    /// レコードヘッダーのバイト数
    pub header_size: usize,
    /// レコードトレーラー（認証タグなど）のバイト数
    pub trailer_size: usize,
}

impl RecordLimits {
    /// 最大サイズの平文を 1 レコードにしたときの暗号文サイズ
    pub fn max_record_size(&self) -> usize {
        self.header_size + self.max_plaintext_record + self.trailer_size
    }
}

/// `begin_handshake` の結果
#[derive(Debug)]
pub struct HandshakeStart<C> {
    /// 新しく作られたコンテキスト
    pub context: C,
    /// ピアに送るトークン（空の場合もある）
    pub token: Vec<u8>,
}

/// ハンドシェイク 1 ステップの結果区分
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// 続きのメッセージが必要
    ContinueNeeded,
    /// ハンドシェイク完了
    Complete,
    /// 入力が 1 単位に満たない（何も消費していない）
    IncompleteInput,
    /// 失敗（終端）
    Error(ProviderError),
}

/// `continue_handshake` の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeStep {
    /// 入力のうち消費したバイト数
    pub consumed: usize,
    /// ピアに送るトークン（空なら送るものなし）
    pub token: Vec<u8>,
    /// 結果区分
    pub status: HandshakeStatus,
}

impl HandshakeStep {
    /// 入力不足（何も消費しない）
    pub fn incomplete() -> Self {
        HandshakeStep {
            consumed: 0,
            token: Vec::new(),
            status: HandshakeStatus::IncompleteInput,
        }
    }

    /// 続行が必要
    pub fn continue_needed(consumed: usize, token: Vec<u8>) -> Self {
        HandshakeStep {
            consumed,
            token,
            status: HandshakeStatus::ContinueNeeded,
        }
    }

    /// 完了
    pub fn complete(consumed: usize, token: Vec<u8>) -> Self {
        HandshakeStep {
            consumed,
            token,
            status: HandshakeStatus::Complete,
        }
    }

    /// 失敗
    pub fn failed(err: ProviderError) -> Self {
        HandshakeStep {
            consumed: 0,
            token: Vec::new(),
            status: HandshakeStatus::Error(err),
        }
    }

    /// 入力のうち消費されなかった extra bytes
    pub fn extra_bytes<'a>(&self, input: &'a [u8]) -> &'a [u8] {
        &input[self.consumed.min(input.len())..]
    }
}

/// 復号 1 ステップの結果区分
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptStatus {
    /// 1 レコードを復号した
    Ok,
    /// 入力が 1 レコードに満たない（何も消費していない）
    IncompleteInput,
    /// ピアが再ネゴシエーションを要求した
    Renegotiate,
    /// ピアの終了通知を受信した
    PeerClosed,
    /// 失敗（終端）
    Error(ProviderError),
}

/// `decrypt_record` の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptStep {
    /// 入力のうち消費したバイト数
    pub consumed: usize,
    /// 復号された平文
    pub plaintext: Vec<u8>,
    /// 結果区分
    pub status: DecryptStatus,
}

impl DecryptStep {
    /// 1 レコード復号成功
    pub fn ok(consumed: usize, plaintext: Vec<u8>) -> Self {
        DecryptStep {
            consumed,
            plaintext,
            status: DecryptStatus::Ok,
        }
    }

    /// 入力不足
    pub fn incomplete() -> Self {
        Self::signal(0, DecryptStatus::IncompleteInput)
    }

    /// 平文を伴わない結果（Renegotiate / PeerClosed など）
    pub fn signal(consumed: usize, status: DecryptStatus) -> Self {
        DecryptStep {
            consumed,
            plaintext: Vec::new(),
            status,
        }
    }

    /// 失敗
    pub fn failed(err: ProviderError) -> Self {
        Self::signal(0, DecryptStatus::Error(err))
    }

    /// 入力のうち消費されなかった extra bytes
    pub fn extra_bytes<'a>(&self, input: &'a [u8]) -> &'a [u8] {
        &input[self.consumed.min(input.len())..]
    }
}

/// セキュリティコンテキストプロバイダ
///
/// コンテキスト（ハンドシェイク状態と鍵）は `begin_handshake` が生成し、
/// 以降の呼び出しにはポンプが保持しているものを渡す。
pub trait SecurityContextProvider {
    /// 接続ごとのコンテキスト
    type Context;

    /// ハンドシェイクを開始し、コンテキストと最初のトークンを返す
    ///
    /// # 引数
    /// - `peer_identity`: 接続先の識別子（ホスト名など）
    fn begin_handshake(
        &mut self,
        peer_identity: &str,
    ) -> Result<HandshakeStart<Self::Context>, ProviderError>;

    /// 受信済みバイト列でハンドシェイクを 1 ステップ進める
    fn continue_handshake(&mut self, context: &mut Self::Context, input: &[u8]) -> HandshakeStep;

    /// レコードサイズの上限（`Complete` 後のみ有効）
    fn query_record_limits(&self, context: &Self::Context) -> RecordLimits;

    /// 平文 1 チャンク（`max_plaintext_record` 以下）を 1 レコードに暗号化する
    fn encrypt_record(
        &mut self,
        context: &mut Self::Context,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ProviderError>;

    /// 受信済みバイト列の先頭 1 レコードを復号する
    fn decrypt_record(&mut self, context: &mut Self::Context, input: &[u8]) -> DecryptStep;

    /// 終了トークンを生成する
    fn request_shutdown(&mut self, context: &mut Self::Context) -> Vec<u8>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_bytes_window() {
        let input = b"recordNEXT";
        let step = DecryptStep::ok(6, b"plain".to_vec());
        assert_eq!(step.extra_bytes(input), b"NEXT");

        let step = HandshakeStep::complete(input.len(), Vec::new());
        assert!(step.extra_bytes(input).is_empty());

        // 消費量が入力を超えても範囲外にならない
        let step = HandshakeStep::continue_needed(99, Vec::new());
        assert!(step.extra_bytes(input).is_empty());
    }

    #[test]
    fn test_incomplete_consumes_nothing() {
        assert_eq!(HandshakeStep::incomplete().consumed, 0);
        assert_eq!(DecryptStep::incomplete().consumed, 0);
        assert_eq!(DecryptStep::incomplete().status, DecryptStatus::IncompleteInput);
    }

    #[test]
    fn test_max_record_size() {
        let limits = RecordLimits {
            max_plaintext_record: 16384,
            header_size: 13,
            trailer_size: 16,
        };
        assert_eq!(limits.max_record_size(), 16413);
    }
}
