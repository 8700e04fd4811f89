//! レコードの分割と組み立て
//!
//! ## Wire Format
//! ```text
//! [content_type: u8][version: u16 BE][length: u16 BE][body...]
//! ```

use alloc::vec::Vec;

use crate::error::ProtoError;
use crate::{HEADER_LEN, MAX_RECORD_BODY, WIRE_VERSION};

/// レコードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    /// 警告・終了通知
    Alert = 21,
    /// ハンドシェイクメッセージ
    Handshake = 22,
    /// アプリケーションデータ
    ApplicationData = 23,
}

impl ContentType {
    /// ワイヤ上の値から変換する
    pub fn from_u8(value: u8) -> Result<Self, ProtoError> {
        match value {
            21 => Ok(ContentType::Alert),
            22 => Ok(ContentType::Handshake),
            23 => Ok(ContentType::ApplicationData),
            other => Err(ProtoError::UnknownContentType(other)),
        }
    }
}

/// レコードヘッダー（5 バイト）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// レコードの種類
    pub content_type: ContentType,
    /// body 長
    pub length: u16,
}

impl RecordHeader {
    /// body 長を指定してヘッダーを作る
    pub fn new(content_type: ContentType, length: u16) -> Self {
        RecordHeader { content_type, length }
    }

    /// ワイヤ形式に変換する
    ///
    /// AEAD の associated data としても使う。
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let version = WIRE_VERSION.to_be_bytes();
        let length = self.length.to_be_bytes();
        [self.content_type as u8, version[0], version[1], length[0], length[1]]
    }

    /// 先頭 5 バイトからヘッダーを解析する
    ///
    /// # 戻り値
    /// - `Ok(None)`: 5 バイトに満たない（入力待ち）
    pub fn parse(bytes: &[u8]) -> Result<Option<Self>, ProtoError> {
        if bytes.len() < HEADER_LEN {
            return Ok(None);
        }

        let content_type = ContentType::from_u8(bytes[0])?;
        let version = u16::from_be_bytes([bytes[1], bytes[2]]);
        if version != WIRE_VERSION {
            return Err(ProtoError::UnsupportedRecordVersion(version));
        }

        let length = u16::from_be_bytes([bytes[3], bytes[4]]);
        if length as usize > MAX_RECORD_BODY {
            return Err(ProtoError::RecordTooLarge {
                size: length as usize,
                max: MAX_RECORD_BODY,
            });
        }

        Ok(Some(RecordHeader { content_type, length }))
    }
}

/// 入力バッファ上の 1 レコード（借用）
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// 解析済みヘッダー
    pub header: RecordHeader,
    /// ヘッダーの生バイト（AEAD の associated data）
    pub raw_header: &'a [u8],
    /// body
    pub body: &'a [u8],
}

impl Record<'_> {
    /// ヘッダーを含むレコード全体の長さ
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.body.len()
    }
}

/// 入力の先頭から 1 レコードを切り出す
///
/// 続くバイトは次のレコードに属する（呼び出し側が extra bytes として扱う）。
///
/// # 戻り値
/// - `Ok(Some(record))`: 完全なレコード
/// - `Ok(None)`: ヘッダーまたは body が揃っていない
///
/// # エラー
/// ヘッダーが不正（未知の種類・バージョン不一致・長さ超過）
pub fn split_record(input: &[u8]) -> Result<Option<Record<'_>>, ProtoError> {
    let header = match RecordHeader::parse(input)? {
        Some(header) => header,
        None => return Ok(None),
    };

    let total = HEADER_LEN + header.length as usize;
    if input.len() < total {
        return Ok(None);
    }

    Ok(Some(Record {
        header,
        raw_header: &input[..HEADER_LEN],
        body: &input[HEADER_LEN..total],
    }))
}

/// ヘッダーと body を連結してレコードを組み立てる
///
/// # エラー
/// body が [`MAX_RECORD_BODY`] を超える
pub fn encode_record(content_type: ContentType, body: &[u8]) -> Result<Vec<u8>, ProtoError> {
    if body.len() > MAX_RECORD_BODY {
        return Err(ProtoError::RecordTooLarge {
            size: body.len(),
            max: MAX_RECORD_BODY,
        });
    }

    let header = RecordHeader::new(content_type, body.len() as u16);
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_single_record() {
        let rec = encode_record(ContentType::Handshake, b"hello").unwrap();
        assert_eq!(rec.len(), HEADER_LEN + 5);

        let parsed = split_record(&rec).unwrap().unwrap();
        assert_eq!(parsed.header.content_type, ContentType::Handshake);
        assert_eq!(parsed.body, b"hello");
        assert_eq!(parsed.wire_len(), rec.len());
        assert_eq!(parsed.raw_header, &rec[..HEADER_LEN]);
    }

    #[test]
    fn test_split_leaves_trailing_bytes() {
        let mut buf = encode_record(ContentType::ApplicationData, b"first").unwrap();
        let second = encode_record(ContentType::ApplicationData, b"second").unwrap();
        buf.extend_from_slice(&second[..3]);

        let parsed = split_record(&buf).unwrap().unwrap();
        assert_eq!(parsed.body, b"first");
        assert_eq!(&buf[parsed.wire_len()..], &second[..3]);
    }

    #[test]
    fn test_split_incomplete() {
        let rec = encode_record(ContentType::Alert, &[1, 0]).unwrap();
        for cut in 0..rec.len() {
            assert!(split_record(&rec[..cut]).unwrap().is_none(), "cut = {}", cut);
        }
    }

    #[test]
    fn test_unknown_content_type() {
        let bad = [0x99u8, 0x00, 0x02, 0x00, 0x00];
        assert_eq!(
            split_record(&bad).unwrap_err(),
            ProtoError::UnknownContentType(0x99)
        );
    }

    #[test]
    fn test_version_mismatch() {
        let bad = [22u8, 0x03, 0x03, 0x00, 0x00];
        assert_eq!(
            split_record(&bad).unwrap_err(),
            ProtoError::UnsupportedRecordVersion(0x0303)
        );
    }

    #[test]
    fn test_oversized_length_rejected_before_body_arrives() {
        let bad = [23u8, 0x00, 0x02, 0xFF, 0xFF];
        assert!(matches!(
            split_record(&bad),
            Err(ProtoError::RecordTooLarge { size: 0xFFFF, .. })
        ));
    }
}
