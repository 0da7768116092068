//! Key authorization values binding a challenge token to the account key.
//!
//! The CA recomputes the thumbprint on its side and compares byte for byte,
//! so the canonical JWK must be exactly `{"e":..,"kty":"RSA","n":..}`:
//! members in lexicographic order, no whitespace, unpadded base64url values.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use super::{error::IssuanceError, keys::AccountKeyPair};

/// Canonical JSON form of an RSA public key as hashed for the thumbprint.
pub fn canonical_jwk(modulus: &[u8], exponent: &[u8]) -> String {
    // Base64url output never needs JSON escaping.
    format!(
        r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#,
        URL_SAFE_NO_PAD.encode(exponent),
        URL_SAFE_NO_PAD.encode(modulus)
    )
}

pub fn jwk_thumbprint(modulus: &[u8], exponent: &[u8]) -> String {
    let digest = Sha256::digest(canonical_jwk(modulus, exponent).as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// `token + "." + thumbprint`.
pub fn key_authorization(token: &str, modulus: &[u8], exponent: &[u8]) -> String {
    format!("{token}.{}", jwk_thumbprint(modulus, exponent))
}

pub fn key_authorization_for(
    token: &str,
    account_key: &AccountKeyPair,
) -> Result<String, IssuanceError> {
    Ok(key_authorization(
        token,
        &account_key.modulus()?,
        &account_key.public_exponent()?,
    ))
}
