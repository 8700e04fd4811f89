//! AES-128-OCB3 レコード保護
//!
//! ハンドシェイクで導出したセッション鍵で ApplicationData / Alert レコードを
//! 暗号化・復号する。方向ごとに独立したシーケンス番号を持ち、
//! バイトストリーム上のレコードは順番どおりに届く前提で厳密に検査する。

use alloc::vec::Vec;

use aead::{Aead, KeyInit, Payload};
use aes::Aes128;
use ocb3::Ocb3;
use secpump_proto::{ContentType, Record, RecordHeader, HEADER_LEN};

use crate::error::CryptoError;
use crate::nonce::RecordNonce;
use crate::{Direction, KEY_LEN, NONCE_TAIL_LEN, TAG_LEN};

/// AES-128-OCB3 (12バイト nonce, 16バイト tag) の型エイリアス
type Aes128Ocb3 = Ocb3<Aes128>;

/// 1 世代分のレコード暗号
///
/// 再ネゴシエーションのたびに新しい鍵で作り直す（シーケンス番号も 0 から）。
pub struct RecordCipher {
    cipher: Aes128Ocb3,
    /// 送信方向
    local: Direction,
    /// 次の送信シーケンス番号
    send_seq: u64,
    /// 次に受信するはずのシーケンス番号
    recv_seq: u64,
}

impl RecordCipher {
    /// セッション鍵から生成する
    ///
    /// # 引数
    /// - `key`: 16 バイトのセッション鍵
    /// - `local`: このエンドポイントが送るレコードの方向
    pub fn new(key: &[u8; KEY_LEN], local: Direction) -> Self {
        RecordCipher {
            cipher: Aes128Ocb3::new(key.into()),
            local,
            send_seq: 0,
            recv_seq: 0,
        }
    }

    /// 平文を 1 レコードに暗号化する
    ///
    /// ## レコード構造
    /// ```text
    /// [header: 5bytes][nonce_tail: 8bytes][ciphertext_with_tag: variable]
    /// ```
    ///
    /// 呼び出し側で平文長が `MAX_PLAINTEXT_RECORD` 以下であることを保証すること。
    pub fn seal(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let body_len = NONCE_TAIL_LEN + plaintext.len() + TAG_LEN;
        let header = RecordHeader::new(content_type, body_len as u16).to_bytes();

        let nonce = RecordNonce::new(self.local.apply_to_seq(self.send_seq));
        let ciphertext = self
            .cipher
            .encrypt(
                nonce.as_bytes().into(),
                Payload {
                    msg: plaintext,
                    aad: &header,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;
        self.send_seq += 1;

        let mut record = Vec::with_capacity(HEADER_LEN + body_len);
        record.extend_from_slice(&header);
        record.extend_from_slice(nonce.tail_bytes());
        record.extend_from_slice(&ciphertext);
        Ok(record)
    }

    /// 受信した 1 レコードを復号する
    ///
    /// # エラー
    /// - `CryptoError::RecordTooShort`: body が nonce + tag に満たない
    /// - `CryptoError::DecryptionFailed`: 認証タグ検証失敗（鍵違い・改ざん）
    /// - `CryptoError::WrongDirection`: 自分の方向のレコード
    /// - `CryptoError::UnexpectedSequence`: 欠落・重複・並べ替え
    pub fn open(&mut self, record: &Record<'_>) -> Result<Vec<u8>, CryptoError> {
        let body = record.body;
        if body.len() < NONCE_TAIL_LEN + TAG_LEN {
            return Err(CryptoError::RecordTooShort(body.len()));
        }
        let nonce =
            RecordNonce::from_body_prefix(body).ok_or(CryptoError::RecordTooShort(body.len()))?;

        let plaintext = self
            .cipher
            .decrypt(
                nonce.as_bytes().into(),
                Payload {
                    msg: &body[NONCE_TAIL_LEN..],
                    aad: record.raw_header,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;

        let direction_seq = nonce.seq();
        if Direction::from_seq(direction_seq) == self.local {
            return Err(CryptoError::WrongDirection);
        }
        let seq = direction_seq & !(1u64 << 63);
        if seq != self.recv_seq {
            return Err(CryptoError::UnexpectedSequence {
                expected: self.recv_seq,
                received: seq,
            });
        }
        self.recv_seq += 1;

        Ok(plaintext)
    }

    /// 次の送信シーケンス番号（テスト用）
    pub fn send_seq(&self) -> u64 {
        self.send_seq
    }

    /// 次に受信するシーケンス番号（テスト用）
    pub fn recv_seq(&self) -> u64 {
        self.recv_seq
    }
}

impl core::fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordCipher")
            .field("local", &self.local)
            .field("send_seq", &self.send_seq)
            .field("recv_seq", &self.recv_seq)
            .finish_non_exhaustive()
    }
}
