use std::sync::Arc;

use serde_json::json;

use crate::{
    core::{
        config::CaConfig,
        types::{AccountRegistration, Certificate, Challenge, CsrSpec},
    },
    domain::normalize_domain,
};

use super::{
    authorization::AuthorizationRequester,
    certificate::CertificateIssuer,
    challenge::ChallengeValidator,
    error::IssuanceError,
    http::HttpTransport,
    keys::{AccountKeyPair, DomainKeyPair},
    observer::{IssuanceEvent, IssuanceObserver, LogObserver, Phase, report_finished},
    poll::{Pause, ThreadPause},
    transport::{Method, Transport, TransportError},
};

pub const NEW_REG_PATH: &str = "/acme/new-reg";
const CREATED: u16 = 201;
const CONFLICT: u16 = 409;

/// Builds the transport bound to a freshly configured account key.
pub type TransportFactory = Box<
    dyn Fn(&CaConfig, &AccountKeyPair) -> Result<Box<dyn Transport>, TransportError> + Send + Sync,
>;

struct AccountBinding {
    key: AccountKeyPair,
    transport: Box<dyn Transport>,
}

/// Entry point for issuing certificates from one CA.
///
/// Typical use: [`set_account_key`](Self::set_account_key), optionally
/// [`register_account`](Self::register_account), then per domain
/// [`request_challenge`](Self::request_challenge), publish the key
/// authorization, [`check_challenge`](Self::check_challenge) and
/// [`request_certificate`](Self::request_certificate).
///
/// Calls on one client are serialised through `&mut self`; separate clients
/// (separate account bindings) can run on separate threads.
pub struct IssuanceClient {
    config: CaConfig,
    factory: TransportFactory,
    account: Option<AccountBinding>,
    observer: Arc<dyn IssuanceObserver>,
    pause: Arc<dyn Pause>,
}

impl IssuanceClient {
    /// Client talking HTTP to the CA described by `config`.
    pub fn new(config: CaConfig) -> Self {
        Self::with_transport_factory(
            config,
            Box::new(|config: &CaConfig, key: &AccountKeyPair| {
                let transport: Box<dyn Transport> = Box::new(HttpTransport::new(config, key)?);
                Ok::<_, TransportError>(transport)
            }),
        )
    }

    pub fn with_transport_factory(config: CaConfig, factory: TransportFactory) -> Self {
        Self {
            config,
            factory,
            account: None,
            observer: Arc::new(LogObserver),
            pause: Arc::new(ThreadPause),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IssuanceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    pub fn config(&self) -> &CaConfig {
        &self.config
    }

    pub fn has_account_key(&self) -> bool {
        self.account.is_some()
    }

    /// Binds `key` and a new transport for it, replacing any previous binding.
    pub fn set_account_key(&mut self, key: &AccountKeyPair) -> Result<(), IssuanceError> {
        let transport = (self.factory)(&self.config, key)?;
        self.account = Some(AccountBinding {
            key: key.clone(),
            transport,
        });
        Ok(())
    }

    /// Registers the account key with the CA, agreeing to the configured
    /// license. An already registered key is not an error.
    pub fn register_account(
        &mut self,
        email: Option<&str>,
    ) -> Result<AccountRegistration, IssuanceError> {
        let binding = self.account.as_mut().ok_or(IssuanceError::AccountKeyMissing)?;

        let mut payload = json!({
            "resource": "new-reg",
            "agreement": self.config.license_url,
        });
        if let Some(email) = email {
            let email = validate_email(email)?;
            payload["contact"] = json!([format!("mailto:{email}")]);
        }

        self.observer.on_event(&IssuanceEvent::RequestSent {
            phase: Phase::Registration,
            resource: "new-reg",
            url: NEW_REG_PATH.to_string(),
        });
        let result = binding
            .transport
            .request(Method::Post, NEW_REG_PATH, Some(&payload))
            .map_err(IssuanceError::from)
            .and_then(|response| {
                let status = binding.transport.last_status_code().unwrap_or_default();
                match status {
                    CREATED | CONFLICT => Ok(AccountRegistration {
                        location: binding.transport.last_location(),
                        created: status == CREATED,
                    }),
                    _ => Err(IssuanceError::RegistrationFailed {
                        status,
                        body: response.to_string(),
                    }),
                }
            });
        report_finished(
            self.observer.as_ref(),
            Phase::Registration,
            email.unwrap_or("account"),
            result,
        )
    }

    /// Opens an authorization for `domain` and returns its `http-01` challenge.
    pub fn request_challenge(&mut self, domain: &str) -> Result<Challenge, IssuanceError> {
        let binding = self.account.as_mut().ok_or(IssuanceError::AccountKeyMissing)?;
        let domain = checked_domain(domain)?;
        AuthorizationRequester::new(
            binding.transport.as_mut(),
            &binding.key,
            self.observer.as_ref(),
        )
        .request_authorization(&domain)
    }

    /// Asks the CA to validate a published challenge and waits for the result.
    ///
    /// A configured timeout of 0 is an `InvalidArgument`, not a
    /// `ChallengeTimedOut`: nothing is submitted.
    pub fn check_challenge(&mut self, challenge: &Challenge) -> Result<(), IssuanceError> {
        let binding = self.account.as_mut().ok_or(IssuanceError::AccountKeyMissing)?;
        for (field, value) in [
            ("domain", &challenge.domain),
            ("token", &challenge.token),
            ("challenge_url", &challenge.challenge_url),
            ("authorization_location", &challenge.authorization_location),
            ("key_authorization", &challenge.key_authorization),
        ] {
            if value.trim().is_empty() {
                return Err(IssuanceError::InvalidArgument(format!(
                    "challenge {field} is empty"
                )));
            }
        }
        let timeout_secs = checked_timeout(self.config.timeout_secs)?;
        ChallengeValidator::new(
            binding.transport.as_mut(),
            self.observer.as_ref(),
            self.pause.as_ref(),
        )
        .validate(challenge, timeout_secs)
    }

    /// Requests and downloads a certificate for an already validated domain.
    ///
    /// A configured timeout of 0 is an `InvalidArgument`, not a
    /// `CertificateRequestTimedOut`: no CSR is submitted.
    pub fn request_certificate(
        &mut self,
        domain: &str,
        domain_key: &DomainKeyPair,
        csr_spec: &CsrSpec,
    ) -> Result<Certificate, IssuanceError> {
        let binding = self.account.as_mut().ok_or(IssuanceError::AccountKeyMissing)?;
        let domain = checked_domain(domain)?;
        let timeout_secs = checked_timeout(self.config.timeout_secs)?;
        CertificateIssuer::new(
            binding.transport.as_mut(),
            self.observer.as_ref(),
            self.pause.as_ref(),
        )
        .issue(&domain, domain_key, csr_spec, timeout_secs)
    }
}

fn checked_domain(domain: &str) -> Result<String, IssuanceError> {
    normalize_domain(domain).map_err(|e| IssuanceError::InvalidArgument(e.to_string()))
}

fn checked_timeout(timeout_secs: u64) -> Result<u64, IssuanceError> {
    if timeout_secs == 0 {
        return Err(IssuanceError::InvalidArgument(
            "timeout must be at least one second".to_string(),
        ));
    }
    Ok(timeout_secs)
}

fn validate_email(email: &str) -> Result<&str, IssuanceError> {
    let email = email.trim();
    let invalid = || IssuanceError::InvalidArgument(format!("invalid contact email: {email:?}"));
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, host) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || host.is_empty() || host.contains('@') || !host.contains('.') {
        return Err(invalid());
    }
    Ok(email)
}
