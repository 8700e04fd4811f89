//! ハンドシェイクメッセージ
//!
//! Handshake レコードの body。Protocol Buffers（prost derive）で符号化する。
//!
//! ```text
//! ClientHello  : client → server  { random_c, peer_identity }
//! ServerHello  : server → client  { random_s, verify }
//! HelloRequest : server → client  {}  (確立後の再ネゴシエーション要求)
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use prost::Message;

use crate::error::ProtoError;
use crate::{HANDSHAKE_VERSION, RANDOM_LEN};

/// ハンドシェイクメッセージの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    /// クライアントの開始メッセージ
    ClientHello = 1,
    /// サーバーの応答（鍵確認値を含む）
    ServerHello = 2,
    /// サーバーからの再ネゴシエーション要求
    HelloRequest = 3,
}

impl HandshakeKind {
    /// ワイヤ上の値から変換する
    pub fn from_wire(value: u32) -> Result<Self, ProtoError> {
        match value {
            1 => Ok(HandshakeKind::ClientHello),
            2 => Ok(HandshakeKind::ServerHello),
            3 => Ok(HandshakeKind::HelloRequest),
            other => Err(ProtoError::UnknownHandshakeKind(other)),
        }
    }
}

/// ハンドシェイクメッセージ本体
#[derive(Clone, PartialEq, prost::Message)]
pub struct HandshakeMessage {
    /// プロトコルバージョン（[`HANDSHAKE_VERSION`]）
    #[prost(uint32, tag = "1")]
    pub protocol_version: u32,
    /// [`HandshakeKind`] のワイヤ値
    #[prost(uint32, tag = "2")]
    pub kind: u32,
    /// ハンドシェイク乱数（ClientHello / ServerHello）
    #[prost(bytes = "vec", tag = "3")]
    pub random: Vec<u8>,
    /// 接続先として要求するピア識別子（ClientHello のみ）
    #[prost(string, tag = "4")]
    pub peer_identity: String,
    /// 鍵確認値（ServerHello のみ）
    #[prost(bytes = "vec", tag = "5")]
    pub verify: Vec<u8>,
}

impl HandshakeMessage {
    /// ClientHello を組み立てる
    pub fn client_hello(peer_identity: &str, random: [u8; RANDOM_LEN]) -> Self {
        HandshakeMessage {
            protocol_version: HANDSHAKE_VERSION,
            kind: HandshakeKind::ClientHello as u32,
            random: random.to_vec(),
            peer_identity: String::from(peer_identity),
            verify: Vec::new(),
        }
    }

    /// ServerHello を組み立てる
    pub fn server_hello(random: [u8; RANDOM_LEN], verify: [u8; 16]) -> Self {
        HandshakeMessage {
            protocol_version: HANDSHAKE_VERSION,
            kind: HandshakeKind::ServerHello as u32,
            random: random.to_vec(),
            peer_identity: String::new(),
            verify: verify.to_vec(),
        }
    }

    /// HelloRequest を組み立てる
    pub fn hello_request() -> Self {
        HandshakeMessage {
            protocol_version: HANDSHAKE_VERSION,
            kind: HandshakeKind::HelloRequest as u32,
            random: Vec::new(),
            peer_identity: String::new(),
            verify: Vec::new(),
        }
    }

    /// バイト列からデコードする
    ///
    /// # エラー
    /// - `ProtoError::DecodeFailed`: protobuf デコード失敗
    /// - `ProtoError::InvalidProtocolVersion`: バージョン不一致
    pub fn decode_from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        let msg = HandshakeMessage::decode(bytes).map_err(ProtoError::DecodeFailed)?;
        if msg.protocol_version != HANDSHAKE_VERSION {
            return Err(ProtoError::InvalidProtocolVersion(msg.protocol_version));
        }
        Ok(msg)
    }

    /// バイト列にエンコードする
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// メッセージの種類
    pub fn handshake_kind(&self) -> Result<HandshakeKind, ProtoError> {
        HandshakeKind::from_wire(self.kind)
    }

    /// 乱数フィールドを固定長配列として取り出す
    pub fn random_bytes(&self) -> Result<[u8; RANDOM_LEN], ProtoError> {
        self.random
            .as_slice()
            .try_into()
            .map_err(|_| ProtoError::InvalidRandomLength(self.random.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_hello_roundtrip() {
        let msg = HandshakeMessage::client_hello("db.internal", [7u8; RANDOM_LEN]);
        let decoded = HandshakeMessage::decode_from_bytes(&msg.encode_to_bytes()).unwrap();

        assert_eq!(decoded.handshake_kind().unwrap(), HandshakeKind::ClientHello);
        assert_eq!(decoded.peer_identity, "db.internal");
        assert_eq!(decoded.random_bytes().unwrap(), [7u8; RANDOM_LEN]);
        assert!(decoded.verify.is_empty());
    }

    #[test]
    fn test_hello_request_has_no_random() {
        let msg = HandshakeMessage::hello_request();
        let decoded = HandshakeMessage::decode_from_bytes(&msg.encode_to_bytes()).unwrap();

        assert_eq!(decoded.handshake_kind().unwrap(), HandshakeKind::HelloRequest);
        assert_eq!(decoded.random_bytes(), Err(ProtoError::InvalidRandomLength(0)));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut msg = HandshakeMessage::hello_request();
        msg.protocol_version = 99;
        let result = HandshakeMessage::decode_from_bytes(&msg.encode_to_bytes());
        assert_eq!(result, Err(ProtoError::InvalidProtocolVersion(99)));
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let result = HandshakeMessage::decode_from_bytes(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(ProtoError::DecodeFailed(_))));
    }

    #[test]
    fn test_unknown_kind() {
        let mut msg = HandshakeMessage::hello_request();
        msg.kind = 42;
        assert_eq!(
            msg.handshake_kind(),
            Err(ProtoError::UnknownHandshakeKind(42))
        );
    }
}
