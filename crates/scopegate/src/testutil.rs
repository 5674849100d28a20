//! Signing keys and token helpers shared by unit tests

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rsa::RsaPrivateKey;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use serde_json::{Value, json};

pub(crate) static TRUSTED_KEY: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("trusted"));
pub(crate) static OTHER_KEY: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("other"));

pub(crate) struct TestKey {
    pub kid: &'static str,
    encoding: EncodingKey,
    modulus: String,
    exponent: String,
}

impl TestKey {
    fn generate(kid: &'static str) -> Self {
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

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "use": "sig",
            "kid": self.kid,
            "n": self.modulus,
            "e": self.exponent
        })
    }

    pub fn jwk_set(&self) -> JwkSet {
        serde_json::from_value(json!({ "keys": [self.jwk()] })).expect("jwk set")
    }

    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_kid(claims, self.kid)
    }

    pub fn sign_with_kid(&self, claims: &Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &self.encoding).expect("sign token")
    }

    pub fn sign_without_kid(&self, claims: &Value) -> String {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding).expect("sign token")
    }
}

/// `alg: none` token with an empty signature segment
pub(crate) fn unsigned_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}
