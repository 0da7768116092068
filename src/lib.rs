//! Client side of ACME v1 certificate issuance with `http-01` validation.
//!
//! ```no_run
//! use acme_v1_issuer::{
//!     AccountKeyPair, CaConfig, CaEnvironment, CsrSpec, DomainKeyPair, IssuanceClient,
//! };
//!
//! # fn main() -> Result<(), acme_v1_issuer::IssuanceError> {
//! let mut client = IssuanceClient::new(CaConfig::lets_encrypt(CaEnvironment::Staging));
//! let account_key = AccountKeyPair::generate(2048)?;
//! client.set_account_key(&account_key)?;
//! client.register_account(Some("admin@example.com"))?;
//!
//! let challenge = client.request_challenge("example.com")?;
//! // Serve `challenge.key_authorization` at `challenge.well_known_path()`.
//! client.check_challenge(&challenge)?;
//!
//! let domain_key = DomainKeyPair::generate(2048)?;
//! let certificate = client.request_certificate("example.com", &domain_key, &CsrSpec::new())?;
//! println!("{}", certificate.fullchain_pem());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod issuance;

pub use crate::core::config::{CaConfig, CaEnvironment, DEFAULT_TIMEOUT_SECS};
pub use crate::core::types::{AccountRegistration, Certificate, Challenge, CsrSpec};
pub use issuance::client::{IssuanceClient, TransportFactory};
pub use issuance::error::IssuanceError;
pub use issuance::http::HttpTransport;
pub use issuance::key_authorization::{canonical_jwk, jwk_thumbprint, key_authorization};
pub use issuance::keys::{AccountKeyPair, DomainKeyPair};
pub use issuance::observer::{
    IssuanceEvent, IssuanceObserver, LogObserver, Outcome, Phase, RecordingObserver,
};
pub use issuance::poll::{Pause, PollOutcome, ThreadPause};
pub use issuance::transport::{Method, RawResponse, Transport, TransportError};
