use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::issuance::keys::DomainKeyPair;

/// An `http-01` challenge the caller has to publish before validation.
///
/// The response is served at `http://<domain>/.well-known/acme-challenge/<token>`
/// with `key_authorization` as the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub domain: String,
    /// URI the challenge response is submitted to.
    pub challenge_url: String,
    pub token: String,
    pub key_authorization: String,
    /// Authorization resource polled for the validation status.
    pub authorization_location: String,
}

impl Challenge {
    /// Path the CA fetches the key authorization from.
    pub fn well_known_path(&self) -> String {
        format!("/.well-known/acme-challenge/{}", self.token)
    }
}

/// Subject attributes for the certificate signing request.
///
/// Attributes use OpenSSL short names (`C`, `ST`, `L`, `O`, `OU`, ...) and are
/// emitted in insertion order. The common name defaults to the domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrSpec {
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl CsrSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn common_name(mut self, value: impl Into<String>) -> Self {
        self.common_name = Some(value.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn country(self, value: impl Into<String>) -> Self {
        self.attribute("C", value)
    }

    pub fn state(self, value: impl Into<String>) -> Self {
        self.attribute("ST", value)
    }

    pub fn organization(self, value: impl Into<String>) -> Self {
        self.attribute("O", value)
    }
}

/// An issued certificate together with the key it was requested for.
#[derive(Debug, Clone)]
pub struct Certificate {
    pub domain: String,
    pub domain_key: DomainKeyPair,
    /// PEM-encoded leaf certificate.
    pub pem: String,
    /// PEM-encoded issuer certificates, nearest first.
    pub chain: Vec<String>,
}

impl Certificate {
    /// Leaf followed by the issuer chain, ready for a TLS server.
    pub fn fullchain_pem(&self) -> String {
        let mut out = self.pem.clone();
        for issuer in &self.chain {
            out.push_str(issuer);
        }
        out
    }

    /// SHA-256 fingerprint of the leaf DER, lowercase hex.
    pub fn fingerprint(&self) -> Option<String> {
        let block = pem::parse(self.pem.as_bytes()).ok()?;
        let mut hasher = Sha256::new();
        hasher.update(block.contents());
        Some(hex::encode(hasher.finalize()))
    }
}

/// Result of a `new-reg` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRegistration {
    /// Account resource URL, when the CA returned one.
    pub location: Option<String>,
    /// False when the CA reported the key as already registered.
    pub created: bool,
}
