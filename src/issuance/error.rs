use thiserror::Error;

use super::transport::TransportError;

/// Every failure an issuance operation can surface to its caller.
#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("no account key pair configured; call set_account_key first")]
    AccountKeyMissing,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("CA offered no supported challenge type for {domain}: {body}")]
    ChallengeNotSupported { domain: String, body: String },
    #[error("challenge for {domain} failed: {body}")]
    ChallengeFailed { domain: String, body: String },
    #[error("challenge for {domain} still pending after {timeout_secs}s")]
    ChallengeTimedOut { domain: String, timeout_secs: u64 },
    #[error("CSR generation failed: {0}")]
    CsrGenerationFailed(String),
    #[error("certificate request failed with status {status}: {body}")]
    CertificateRequestFailed { status: u16, body: String },
    #[error("certificate for {domain} still processing after {timeout_secs}s")]
    CertificateRequestTimedOut { domain: String, timeout_secs: u64 },
    #[error("account registration failed with status {status}: {body}")]
    RegistrationFailed { status: u16, body: String },
    #[error("key material error: {0}")]
    Key(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl IssuanceError {
    /// Returns the CA response body attached to the error, if any.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            IssuanceError::ChallengeNotSupported { body, .. }
            | IssuanceError::ChallengeFailed { body, .. }
            | IssuanceError::CertificateRequestFailed { body, .. }
            | IssuanceError::RegistrationFailed { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<openssl::error::ErrorStack> for IssuanceError {
    fn from(value: openssl::error::ErrorStack) -> Self {
        IssuanceError::Key(value.to_string())
    }
}

pub(crate) fn body_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}
