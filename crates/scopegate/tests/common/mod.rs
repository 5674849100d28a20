//! Common test utilities for integration tests
//!
//! A wiremock-backed identity provider that serves an OpenID Connect
//! discovery document and a JWK Set, plus RSA signing keys for minting
//! tokens against it.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rsa::RsaPrivateKey;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use scopegate::{DiscoveryConfig, TokenValidationEngine, TrustConfig};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "contoso";
pub const AUDIENCE: &str = "api://orders";
pub const JWKS_PATH: &str = "/common/discovery/v2.0/keys";

pub static PRIMARY_KEY: LazyLock<SigningKey> = LazyLock::new(|| SigningKey::generate("key-2026-01"));
pub static ROTATED_KEY: LazyLock<SigningKey> = LazyLock::new(|| SigningKey::generate("key-2026-07"));
pub static ATTACKER_KEY: LazyLock<SigningKey> = LazyLock::new(|| SigningKey::generate("attacker"));

/// RSA key pair with its public JWK
pub struct SigningKey {
    pub kid: &'static str,
    encoding: EncodingKey,
    pub modulus: String,
    pub exponent: String,
}

impl SigningKey {
    pub fn generate(kid: &'static str) -> Self {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
        let public_key = private_key.to_public_key();
        let pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("private pem");

        Self {
            kid,
            encoding: EncodingKey::from_rsa_pem(pem.as_bytes()).expect("encoding key"),
            modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }
    }

    /// Public JWK as published by the provider
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "use": "sig",
            "kid": self.kid,
            "n": self.modulus,
            "e": self.exponent
        })
    }

    /// RS256 token with this key's kid
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.to_string());
        self.sign_with_header(header, claims)
    }

    pub fn sign_with_header(&self, header: Header, claims: &Value) -> String {
        encode(&header, claims, &self.encoding).expect("sign token")
    }
}

/// Seconds since the epoch, offset by `delta`
pub fn epoch(delta: i64) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_secs() as i64;
    now + delta
}

/// Mock identity provider for one tenant
pub struct MockIdentityProvider {
    pub server: MockServer,
}

impl MockIdentityProvider {
    /// Start a provider with no routes mounted
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Start a provider serving discovery and the given keys
    pub async fn with_keys(keys: &[&SigningKey]) -> Self {
        let idp = Self::start().await;
        idp.mount_discovery().await;
        idp.mount_jwks(keys).await;
        idp
    }

    pub fn instance(&self) -> String {
        format!("{}/", self.server.uri())
    }

    /// Issuer the provider publishes after tenant substitution
    pub fn issuer(&self) -> String {
        format!("{}/{}/v2.0", self.server.uri(), TENANT)
    }

    pub fn discovery_path(&self) -> String {
        format!("/{TENANT}/v2.0/.well-known/openid-configuration")
    }

    /// Discovery document with a `{tenantid}` templated issuer
    pub fn discovery_document(&self) -> Value {
        json!({
            "issuer": format!("{}/{{tenantid}}/v2.0", self.server.uri()),
            "jwks_uri": format!("{}{}", self.server.uri(), JWKS_PATH),
            "id_token_signing_alg_values_supported": ["RS256"],
            "response_types_supported": ["code", "id_token"]
        })
    }

    pub async fn mount_discovery(&self) {
        self.mount_discovery_response(
            ResponseTemplate::new(200).set_body_json(self.discovery_document()),
        )
        .await;
    }

    pub async fn mount_discovery_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(self.discovery_path()))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_jwks(&self, keys: &[&SigningKey]) {
        let keys: Vec<Value> = keys.iter().map(|key| key.jwk()).collect();
        self.mount_jwks_response(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .await;
    }

    pub async fn mount_jwks_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Remove every mounted route and recorded request
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Requests received so far for `request_path`
    pub async fn hits(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }

    pub async fn discovery_hits(&self) -> usize {
        self.hits(&self.discovery_path()).await
    }

    pub async fn jwks_hits(&self) -> usize {
        self.hits(JWKS_PATH).await
    }

    pub async fn total_hits(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .len()
    }

    pub fn trust_config(&self) -> TrustConfig {
        TrustConfig::new(self.instance(), TENANT, AUDIENCE).expect("trust config")
    }

    pub fn engine(&self) -> TokenValidationEngine {
        TokenValidationEngine::new(self.trust_config()).expect("engine")
    }

    pub fn engine_with(&self, discovery: DiscoveryConfig) -> TokenValidationEngine {
        TokenValidationEngine::builder(self.trust_config())
            .discovery_config(discovery)
            .build()
            .expect("engine")
    }

    /// Claims that pass every check
    pub fn claims(&self) -> Value {
        json!({
            "iss": self.issuer(),
            "aud": AUDIENCE,
            "sub": "00000000-0000-0000-0000-0000000000a1",
            "preferred_username": "alice@contoso.com",
            "iat": epoch(-60),
            "nbf": epoch(-60),
            "exp": epoch(3600),
            "scp": "access_as_user"
        })
    }

    /// Valid claims with one field replaced
    pub fn claims_with(&self, claim: &str, value: Value) -> Value {
        let mut claims = self.claims();
        claims[claim] = value;
        claims
    }

    /// Valid claims with one field removed
    pub fn claims_without(&self, claim: &str) -> Value {
        let mut claims = self.claims();
        if let Some(map) = claims.as_object_mut() {
            map.remove(claim);
        }
        claims
    }
}

/// `Authorization` header value for a token
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Short TTL discovery settings for cache expiry tests
pub fn short_ttl(ttl: Duration) -> DiscoveryConfig {
    DiscoveryConfig {
        default_ttl: ttl,
        ..DiscoveryConfig::default()
    }
}

/// In-memory writer for capturing `tracing` output
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Everything written so far
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
    }

    /// Subscriber writing plain-text events at every level into this buffer
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let buffer = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || buffer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
