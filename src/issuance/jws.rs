//! ACME v1 request envelopes: flattened JWS signed with RS256 over the
//! account key, carrying the JWK in both the unprotected and protected
//! headers and the replay nonce in the protected one.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use openssl::{hash::MessageDigest, sign::Signer};
use serde::Serialize;
use serde_json::Value;

use super::{keys::AccountKeyPair, transport::TransportError};

pub const ALGORITHM: &str = "RS256";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RsaJwk {
    pub e: String,
    pub kty: &'static str,
    pub n: String,
}

impl RsaJwk {
    pub fn from_account_key(key: &AccountKeyPair) -> Result<Self, TransportError> {
        let signing = |e: super::error::IssuanceError| TransportError::Signing(e.to_string());
        Ok(Self {
            e: URL_SAFE_NO_PAD.encode(key.public_exponent().map_err(signing)?),
            kty: "RSA",
            n: URL_SAFE_NO_PAD.encode(key.modulus().map_err(signing)?),
        })
    }
}

#[derive(Debug, Serialize)]
struct Header<'a> {
    alg: &'static str,
    jwk: &'a RsaJwk,
}

#[derive(Debug, Serialize)]
struct ProtectedHeader<'a> {
    alg: &'static str,
    jwk: &'a RsaJwk,
    nonce: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedEnvelope {
    pub header: Value,
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

/// Signs `payload` for `key` using `nonce`.
pub fn sign(
    key: &AccountKeyPair,
    jwk: &RsaJwk,
    nonce: &str,
    payload: &Value,
) -> Result<SignedEnvelope, TransportError> {
    let header = serde_json::to_value(Header {
        alg: ALGORITHM,
        jwk,
    })
    .map_err(|e| TransportError::Signing(e.to_string()))?;
    let protected = serde_json::to_vec(&ProtectedHeader {
        alg: ALGORITHM,
        jwk,
        nonce,
    })
    .map_err(|e| TransportError::Signing(e.to_string()))?;
    let payload =
        serde_json::to_vec(payload).map_err(|e| TransportError::Signing(e.to_string()))?;

    let protected = URL_SAFE_NO_PAD.encode(protected);
    let payload = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{protected}.{payload}");

    let signature = rs256(key, signing_input.as_bytes())
        .map_err(|e| TransportError::Signing(e.to_string()))?;

    Ok(SignedEnvelope {
        header,
        protected,
        payload,
        signature: URL_SAFE_NO_PAD.encode(signature),
    })
}

fn rs256(key: &AccountKeyPair, input: &[u8]) -> Result<Vec<u8>, openssl::error::ErrorStack> {
    let mut signer = Signer::new(MessageDigest::sha256(), key.private_key())?;
    signer.update(input)?;
    signer.sign_to_vec()
}
