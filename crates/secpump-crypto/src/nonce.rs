//! レコード Nonce
//!
//! ```text
//! bytes[0..4]  = 0x00000000  (ゼロパディング)
//! bytes[4..12] = direction_seq as u64, big-endian
//! ```
//!
//! レコードには後半 8 バイトのみ載せる（先頭 4 バイトは常にゼロなので省略）。

use crate::NONCE_TAIL_LEN;

/// AES-128-OCB3 の Nonce（12バイト）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordNonce([u8; 12]);

impl RecordNonce {
    /// direction 込みのシーケンス番号から Nonce を構築する
    ///
    /// # 例
    /// ```
    /// use secpump_crypto::RecordNonce;
    /// let nonce = RecordNonce::new(42);
    /// assert_eq!(nonce.seq(), 42);
    /// ```
    pub fn new(direction_seq: u64) -> Self {
        let mut bytes = [0u8; 12];
        bytes[4..12].copy_from_slice(&direction_seq.to_be_bytes());
        RecordNonce(bytes)
    }

    /// レコード body の先頭 8 バイトから Nonce を復元する
    pub fn from_body_prefix(body: &[u8]) -> Option<Self> {
        let tail: [u8; NONCE_TAIL_LEN] = body.get(..NONCE_TAIL_LEN)?.try_into().ok()?;
        let mut bytes = [0u8; 12];
        bytes[4..12].copy_from_slice(&tail);
        Some(RecordNonce(bytes))
    }

    /// direction 込みのシーケンス番号
    pub fn seq(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[4..12]);
        u64::from_be_bytes(buf)
    }

    /// AES-OCB3 の nonce 引数
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// レコードに埋め込む 8 バイト
    pub fn tail_bytes(&self) -> &[u8] {
        &self.0[4..12]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_padding() {
        let nonce = RecordNonce::new(0xFFFFFFFFFFFFFFFF);
        assert_eq!(&nonce.0[0..4], &[0u8; 4]);
        assert_eq!(nonce.tail_bytes(), &[0xFF; 8]);
    }

    #[test]
    fn test_restore_from_body() {
        let original = RecordNonce::new(0x8000_0000_0000_0007);
        let mut body = original.tail_bytes().to_vec();
        body.extend_from_slice(b"ciphertext");

        let restored = RecordNonce::from_body_prefix(&body).unwrap();
        assert_eq!(restored, original);
        assert_eq!(restored.seq(), 0x8000_0000_0000_0007);
    }

    #[test]
    fn test_short_body() {
        assert!(RecordNonce::from_body_prefix(&[0u8; 7]).is_none());
    }
}
