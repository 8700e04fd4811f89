//! PSK リファレンスエンジン
//!
//! [`SecurityContextProvider`] の実装。クライアント・サーバーのどちらの役割でも動くので、
//! 同じプロセス内で 2 つのポンプを向かい合わせて試験できる。
//!
//! ## 再ネゴシエーション
//!
//! - サーバーは確立後いつでも HelloRequest（[`hello_request_record`]）を送れる。
//!   クライアントの `decrypt_record` はそれを消費して `Renegotiate` を返し、
//!   次の `continue_handshake` で新しい ClientHello を出す。
//! - 確立済みのサーバーの `decrypt_record` が ClientHello を見たら、消費せずに
//!   `Renegotiate` を返す。次の `continue_handshake` がその ClientHello に応答する。
//!
//! 新しい鍵が使われるのはハンドシェイク完了後のレコードから。

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use secpump_core::{
    DecryptStatus, DecryptStep, HandshakeStart, HandshakeStep, ProviderError, RecordLimits,
    SecurityContextProvider,
};
use secpump_proto::{
    Alert, ContentType, HandshakeKind, HandshakeMessage, ProtoError, Record,
    HEADER_LEN, RANDOM_LEN,
};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::cipher::RecordCipher;
use crate::error::CryptoError;
use crate::kdf::{derive_session_key, key_confirmation, verify_key_confirmation};
use crate::{Direction, KEY_LEN, MAX_PLAINTEXT_RECORD, NONCE_TAIL_LEN, TAG_LEN};

/// エンドポイントの役割
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// この役割が送るレコードの方向
    pub fn local_direction(&self) -> Direction {
        match self {
            Role::Client => Direction::ClientToServer,
            Role::Server => Direction::ServerToClient,
        }
    }
}

/// エンジンの設定
#[derive(Clone)]
pub struct EngineConfig {
    pub role: Role,
    /// 事前共有鍵
    pub psk: Zeroizing<[u8; KEY_LEN]>,
    /// 1 レコードに載せる平文の上限（1..=16384）
    pub max_plaintext_record: usize,
}

impl EngineConfig {
    pub fn client(psk: [u8; KEY_LEN]) -> Self {
        Self::new(Role::Client, psk)
    }

    pub fn server(psk: [u8; KEY_LEN]) -> Self {
        Self::new(Role::Server, psk)
    }

    fn new(role: Role, psk: [u8; KEY_LEN]) -> Self {
        EngineConfig {
            role,
            psk: Zeroizing::new(psk),
            max_plaintext_record: MAX_PLAINTEXT_RECORD,
        }
    }

    /// レコード上限を変更する（1..=16384 に丸める）
    pub fn with_max_plaintext_record(mut self, max: usize) -> Self {
        self.max_plaintext_record = max.clamp(1, MAX_PLAINTEXT_RECORD);
        self
    }
}

impl core::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("role", &self.role)
            .field("psk", &"<redacted>")
            .field("max_plaintext_record", &self.max_plaintext_record)
            .finish()
    }
}

/// ハンドシェイクの進行段階
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// サーバー: ClientHello 待ち
    AwaitClientHello,
    /// クライアント: ServerHello 待ち
    AwaitServerHello { client_random: [u8; RANDOM_LEN] },
    /// クライアント: HelloRequest を受けたので次の呼び出しで ClientHello を送る
    SendClientHello,
    /// 確立済み
    Established,
}

/// 接続ごとのコンテキスト
#[derive(Debug)]
pub struct PskContext {
    phase: Phase,
    /// クライアント: 接続先の識別子 / サーバー: 自分の識別子
    identity: String,
    /// 現世代のレコード暗号（最初のハンドシェイク完了まで `None`）
    cipher: Option<RecordCipher>,
    /// 完了したハンドシェイクの数
    generation: u32,
}

impl PskContext {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_established(&self) -> bool {
        self.phase == Phase::Established
    }
}

/// PSK リファレンスエンジン
#[derive(Debug)]
pub struct PskEngine {
    config: EngineConfig,
}

impl PskEngine {
    pub fn new(config: EngineConfig) -> Self {
        PskEngine { config }
    }

    /// クライアント役のエンジン
    pub fn client(psk: [u8; KEY_LEN]) -> Self {
        Self::new(EngineConfig::client(psk))
    }

    /// サーバー役のエンジン
    pub fn server(psk: [u8; KEY_LEN]) -> Self {
        Self::new(EngineConfig::server(psk))
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ===== ハンドシェイク =====

    /// ClientHello を送って ServerHello 待ちに移る
    fn send_client_hello(&self, ctx: &mut PskContext) -> Result<Vec<u8>, ProviderError> {
        let client_random = random_bytes()?;
        let hello = HandshakeMessage::client_hello(&ctx.identity, client_random);
        let record = plain_record(ContentType::Handshake, &hello.encode_to_bytes())?;
        ctx.phase = Phase::AwaitServerHello { client_random };
        debug!(identity = %ctx.identity, generation = ctx.generation, "client hello");
        Ok(record)
    }

    /// サーバー: ClientHello に ServerHello で応答する
    fn answer_client_hello(
        &self,
        ctx: &mut PskContext,
        hello: &HandshakeMessage,
    ) -> Result<Vec<u8>, ProviderError> {
        if hello.peer_identity != ctx.identity {
            return Err(ProviderError::IdentityMismatch {
                requested: hello.peer_identity.clone(),
                local: ctx.identity.clone(),
            });
        }
        let client_random = hello.random_bytes().map_err(proto_error)?;
        let server_random = random_bytes()?;

        let session_key = derive_session_key(&self.config.psk, &client_random, &server_random);
        let verify = key_confirmation(&session_key, &client_random).map_err(crypto_error)?;
        let reply = HandshakeMessage::server_hello(server_random, verify);
        let record = plain_record(ContentType::Handshake, &reply.encode_to_bytes())?;

        self.install_keys(ctx, &session_key);
        Ok(record)
    }

    /// クライアント: ServerHello の鍵確認値を検証する
    fn accept_server_hello(
        &self,
        ctx: &mut PskContext,
        client_random: &[u8; RANDOM_LEN],
        hello: &HandshakeMessage,
    ) -> Result<(), ProviderError> {
        let server_random = hello.random_bytes().map_err(proto_error)?;
        let session_key = derive_session_key(&self.config.psk, client_random, &server_random);

        let confirmed = verify_key_confirmation(&session_key, client_random, &hello.verify)
            .map_err(crypto_error)?;
        if !confirmed {
            return Err(ProviderError::AuthenticationFailed);
        }
        self.install_keys(ctx, &session_key);
        Ok(())
    }

    fn install_keys(&self, ctx: &mut PskContext, session_key: &[u8; KEY_LEN]) {
        ctx.cipher = Some(RecordCipher::new(
            session_key,
            self.config.role.local_direction(),
        ));
        ctx.phase = Phase::Established;
        ctx.generation += 1;
        debug!(
            role = ?self.config.role,
            generation = ctx.generation,
            "session keys installed"
        );
    }

    /// 1 つの Handshake レコードを処理する
    ///
    /// # 戻り値
    /// - `Ok(Some(token))`: 完了（送るトークンつき、空の場合あり）
    /// - `Ok(None)`: まだ続く
    fn handle_handshake_record(
        &self,
        ctx: &mut PskContext,
        record: &Record<'_>,
    ) -> Result<Option<Vec<u8>>, ProviderError> {
        let msg = HandshakeMessage::decode_from_bytes(record.body).map_err(proto_error)?;
        let kind = msg.handshake_kind().map_err(proto_error)?;

        match (ctx.phase.clone(), kind) {
            (Phase::AwaitClientHello, HandshakeKind::ClientHello) => {
                self.answer_client_hello(ctx, &msg).map(Some)
            }
            (Phase::AwaitServerHello { client_random }, HandshakeKind::ServerHello) => {
                self.accept_server_hello(ctx, &client_random, &msg)?;
                Ok(Some(Vec::new()))
            }
            // ハンドシェイク中に届いた HelloRequest は読み捨てる
            (Phase::AwaitServerHello { .. }, HandshakeKind::HelloRequest) => Ok(None),
            (_, kind) => Err(ProviderError::UnexpectedMessage(kind_name(kind))),
        }
    }

    /// Alert レコードを読む（鍵があれば復号する）
    fn read_alert(&self, ctx: &mut PskContext, record: &Record<'_>) -> Result<Alert, ProviderError> {
        match ctx.cipher.as_mut() {
            Some(cipher) => {
                let body = cipher.open(record).map_err(crypto_error)?;
                Alert::from_bytes(&body).map_err(proto_error)
            }
            None => Alert::from_bytes(record.body).map_err(proto_error),
        }
    }
}

impl SecurityContextProvider for PskEngine {
    type Context = PskContext;

    fn begin_handshake(&mut self, peer_identity: &str) -> Result<HandshakeStart<PskContext>, ProviderError> {
        let mut context = PskContext {
            phase: Phase::AwaitClientHello,
            identity: String::from(peer_identity),
            cipher: None,
            generation: 0,
        };

        let token = match self.config.role {
            Role::Client => self.send_client_hello(&mut context)?,
            Role::Server => Vec::new(),
        };
        Ok(HandshakeStart { context, token })
    }

    fn continue_handshake(&mut self, ctx: &mut PskContext, input: &[u8]) -> HandshakeStep {
        if ctx.phase == Phase::SendClientHello {
            return match self.send_client_hello(ctx) {
                Ok(token) => HandshakeStep::continue_needed(0, token),
                Err(err) => HandshakeStep::failed(err),
            };
        }
        if ctx.phase == Phase::Established {
            return HandshakeStep::failed(ProviderError::UnexpectedMessage("handshake after completion"));
        }

        let record = match secpump_proto::split_record(input) {
            Ok(Some(record)) => record,
            Ok(None) => return HandshakeStep::incomplete(),
            Err(err) => return HandshakeStep::failed(proto_error(err)),
        };
        let consumed = record.wire_len();
        trace!(content_type = ?record.header.content_type, consumed, "handshake record");

        match record.header.content_type {
            ContentType::Handshake => match self.handle_handshake_record(ctx, &record) {
                Ok(Some(token)) => HandshakeStep::complete(consumed, token),
                Ok(None) => HandshakeStep::continue_needed(consumed, Vec::new()),
                Err(err) => HandshakeStep::failed(err),
            },
            ContentType::Alert => match self.read_alert(ctx, &record) {
                Ok(alert) => HandshakeStep::failed(ProviderError::PeerAlert(alert.description)),
                Err(err) => HandshakeStep::failed(err),
            },
            ContentType::ApplicationData => {
                HandshakeStep::failed(ProviderError::UnexpectedMessage("application data"))
            }
        }
    }

    fn query_record_limits(&self, _ctx: &PskContext) -> RecordLimits {
        RecordLimits {
            max_plaintext_record: self.config.max_plaintext_record,
            header_size: HEADER_LEN + NONCE_TAIL_LEN,
            trailer_size: TAG_LEN,
        }
    }

    fn encrypt_record(&mut self, ctx: &mut PskContext, plaintext: &[u8]) -> Result<Vec<u8>, ProviderError> {
        let max = self.config.max_plaintext_record;
        if plaintext.len() > max {
            return Err(ProviderError::RecordTooLarge {
                size: plaintext.len(),
                max,
            });
        }
        let cipher = ctx
            .cipher
            .as_mut()
            .ok_or(ProviderError::UnexpectedMessage("application data before handshake"))?;
        cipher
            .seal(ContentType::ApplicationData, plaintext)
            .map_err(crypto_error)
    }

    fn decrypt_record(&mut self, ctx: &mut PskContext, input: &[u8]) -> DecryptStep {
        let record = match secpump_proto::split_record(input) {
            Ok(Some(record)) => record,
            Ok(None) => return DecryptStep::incomplete(),
            Err(err) => return DecryptStep::failed(proto_error(err)),
        };
        let consumed = record.wire_len();

        match record.header.content_type {
            ContentType::ApplicationData => {
                let Some(cipher) = ctx.cipher.as_mut() else {
                    return DecryptStep::failed(ProviderError::UnexpectedMessage(
                        "application data before handshake",
                    ));
                };
                match cipher.open(&record) {
                    Ok(plaintext) => DecryptStep::ok(consumed, plaintext),
                    Err(err) => DecryptStep::failed(crypto_error(err)),
                }
            }
            ContentType::Alert => match self.read_alert(ctx, &record) {
                Ok(alert) if alert.is_close_notify() => {
                    DecryptStep::signal(consumed, DecryptStatus::PeerClosed)
                }
                Ok(alert) => DecryptStep::failed(ProviderError::PeerAlert(alert.description)),
                Err(err) => DecryptStep::failed(err),
            },
            ContentType::Handshake => {
                let kind = HandshakeMessage::decode_from_bytes(record.body)
                    .and_then(|msg| msg.handshake_kind());
                match (self.config.role, kind) {
                    (Role::Client, Ok(HandshakeKind::HelloRequest)) => {
                        ctx.phase = Phase::SendClientHello;
                        debug!("hello request received");
                        DecryptStep::signal(consumed, DecryptStatus::Renegotiate)
                    }
                    (Role::Server, Ok(HandshakeKind::ClientHello)) => {
                        // ClientHello 自体は次の continue_handshake で処理する
                        ctx.phase = Phase::AwaitClientHello;
                        debug!("client initiated renegotiation");
                        DecryptStep::signal(0, DecryptStatus::Renegotiate)
                    }
                    (_, Ok(kind)) => {
                        DecryptStep::failed(ProviderError::UnexpectedMessage(kind_name(kind)))
                    }
                    (_, Err(err)) => DecryptStep::failed(proto_error(err)),
                }
            }
        }
    }

    fn request_shutdown(&mut self, ctx: &mut PskContext) -> Vec<u8> {
        let alert = Alert::close_notify().to_bytes();
        let sealed = ctx
            .cipher
            .as_mut()
            .map(|cipher| cipher.seal(ContentType::Alert, &alert));

        match sealed {
            Some(Ok(record)) => record,
            // 鍵がない（または暗号化に失敗した）ときは平文の Alert
            _ => plain_record(ContentType::Alert, &alert).unwrap_or_default(),
        }
    }
}

/// サーバーが確立後に送る再ネゴシエーション要求レコード
pub fn hello_request_record() -> Vec<u8> {
    plain_record(
        ContentType::Handshake,
        &HandshakeMessage::hello_request().encode_to_bytes(),
    )
    .unwrap_or_default()
}

/// 保護しないレコード（ハンドシェイク・鍵なし Alert）
///
/// ClientHello の body は接続先の識別子を含むので、上限を超えることがある。
fn plain_record(content_type: ContentType, body: &[u8]) -> Result<Vec<u8>, ProviderError> {
    secpump_proto::encode_record(content_type, body).map_err(proto_error)
}

fn random_bytes() -> Result<[u8; RANDOM_LEN], ProviderError> {
    let mut buf = [0u8; RANDOM_LEN];
    getrandom::getrandom(&mut buf).map_err(|e| ProviderError::Backend(e.to_string()))?;
    Ok(buf)
}

fn kind_name(kind: HandshakeKind) -> &'static str {
    match kind {
        HandshakeKind::ClientHello => "ClientHello",
        HandshakeKind::ServerHello => "ServerHello",
        HandshakeKind::HelloRequest => "HelloRequest",
    }
}

fn proto_error(err: ProtoError) -> ProviderError {
    match err {
        ProtoError::InvalidProtocolVersion(version) => ProviderError::UnsupportedVersion(version),
        ProtoError::UnsupportedRecordVersion(version) => {
            ProviderError::UnsupportedVersion(u32::from(version))
        }
        ProtoError::RecordTooLarge { size, max } => ProviderError::RecordTooLarge { size, max },
        other => ProviderError::Malformed(other.to_string()),
    }
}

fn crypto_error(err: CryptoError) -> ProviderError {
    match err {
        CryptoError::DecryptionFailed => ProviderError::AuthenticationFailed,
        other => ProviderError::Malformed(other.to_string()),
    }
}
