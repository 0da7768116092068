use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use log::warn;
use openssl::{
    error::ErrorStack,
    hash::MessageDigest,
    stack::Stack,
    x509::{X509NameBuilder, X509ReqBuilder, extension::SubjectAlternativeName},
};
use pem::{EncodeConfig, LineEnding, Pem};
use serde_json::json;

use crate::core::types::{Certificate, CsrSpec};

use super::{
    error::{IssuanceError, body_text},
    keys::DomainKeyPair,
    observer::{IssuanceEvent, IssuanceObserver, Phase, report_finished},
    poll::{Pause, PollOutcome, poll_fixed_interval},
    transport::{Method, RawResponse, Transport},
};

pub const NEW_CERT_PATH: &str = "/acme/new-cert";
const CREATED: u16 = 201;
const OK: u16 = 200;
const ACCEPTED: u16 = 202;

/// DER-encoded PKCS#10 request for `domain`, signed with SHA-256.
pub fn build_csr(
    domain: &str,
    domain_key: &DomainKeyPair,
    spec: &CsrSpec,
) -> Result<Vec<u8>, IssuanceError> {
    build_csr_der(domain, domain_key, spec)
        .map_err(|e| IssuanceError::CsrGenerationFailed(e.to_string()))
}

fn build_csr_der(
    domain: &str,
    domain_key: &DomainKeyPair,
    spec: &CsrSpec,
) -> Result<Vec<u8>, ErrorStack> {
    let mut name = X509NameBuilder::new()?;
    for (field, value) in &spec.attributes {
        name.append_entry_by_text(field, value)?;
    }
    name.append_entry_by_text("CN", spec.common_name.as_deref().unwrap_or(domain))?;
    let name = name.build();

    let mut req = X509ReqBuilder::new()?;
    req.set_version(0)?;
    req.set_subject_name(&name)?;
    req.set_pubkey(domain_key.private_key())?;

    let mut extensions = Stack::new()?;
    let san = SubjectAlternativeName::new()
        .dns(domain)
        .build(&req.x509v3_context(None))?;
    extensions.push(san)?;
    req.add_extensions(&extensions)?;

    req.sign(domain_key.private_key(), MessageDigest::sha256())?;
    req.build().to_der()
}

/// Frames raw DER as a `CERTIFICATE` PEM block with 64-column lines.
pub fn pem_encode_certificate(der: &[u8]) -> String {
    pem::encode_config(
        &Pem::new("CERTIFICATE", der.to_vec()),
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    )
}

/// Requests a certificate for an authorized domain and waits for issuance.
pub struct CertificateIssuer<'a> {
    transport: &'a mut dyn Transport,
    observer: &'a dyn IssuanceObserver,
    pause: &'a dyn Pause,
}

impl<'a> CertificateIssuer<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        observer: &'a dyn IssuanceObserver,
        pause: &'a dyn Pause,
    ) -> Self {
        Self {
            transport,
            observer,
            pause,
        }
    }

    /// A `timeout_secs` of 0 is rejected with `InvalidArgument` before the
    /// CSR is submitted, rather than requesting and timing out without a poll.
    pub fn issue(
        &mut self,
        domain: &str,
        domain_key: &DomainKeyPair,
        csr_spec: &CsrSpec,
        timeout_secs: u64,
    ) -> Result<Certificate, IssuanceError> {
        if timeout_secs == 0 {
            return Err(IssuanceError::InvalidArgument(
                "timeout must be at least one second".to_string(),
            ));
        }
        let result = self.request_and_download(domain, domain_key, csr_spec, timeout_secs);
        report_finished(self.observer, Phase::Certificate, domain, result)
    }

    fn request_and_download(
        &mut self,
        domain: &str,
        domain_key: &DomainKeyPair,
        csr_spec: &CsrSpec,
        timeout_secs: u64,
    ) -> Result<Certificate, IssuanceError> {
        let csr = build_csr(domain, domain_key, csr_spec)?;
        let payload = json!({
            "resource": "new-cert",
            "csr": URL_SAFE_NO_PAD.encode(&csr),
        });
        self.observer.on_event(&IssuanceEvent::RequestSent {
            phase: Phase::Certificate,
            resource: "new-cert",
            url: NEW_CERT_PATH.to_string(),
        });
        let response = self
            .transport
            .request(Method::Post, NEW_CERT_PATH, Some(&payload))?;

        let status = self.transport.last_status_code().unwrap_or_default();
        if status != CREATED {
            return Err(IssuanceError::CertificateRequestFailed {
                status,
                body: response.to_string(),
            });
        }
        let Some(location) = self.transport.last_location() else {
            return Err(IssuanceError::CertificateRequestFailed {
                status,
                body: "CA did not return a certificate location".to_string(),
            });
        };

        let transport = &mut *self.transport;
        let observer = self.observer;
        let outcome = poll_fixed_interval(
            &format!("certificate for {domain}"),
            timeout_secs,
            self.pause,
            |elapsed| {
                // Plain retrieval by location; nothing to sign.
                let raw = transport.unsigned_request(Method::Get, &location)?;
                match raw.status {
                    OK => Ok(PollOutcome::Terminal(raw)),
                    ACCEPTED => {
                        observer.on_event(&IssuanceEvent::PollTick {
                            phase: Phase::Certificate,
                            domain: domain.to_string(),
                            elapsed_secs: elapsed,
                            status: ACCEPTED.to_string(),
                        });
                        Ok(PollOutcome::Pending)
                    }
                    other => Err(IssuanceError::CertificateRequestFailed {
                        status: other,
                        body: body_text(&raw.body),
                    }),
                }
            },
        )?;

        let issued = match outcome {
            PollOutcome::Terminal(raw) => raw,
            PollOutcome::Pending | PollOutcome::TimedOut => {
                return Err(IssuanceError::CertificateRequestTimedOut {
                    domain: domain.to_string(),
                    timeout_secs,
                });
            }
        };

        let chain = self.fetch_chain(domain, &issued);
        Ok(Certificate {
            domain: domain.to_string(),
            domain_key: domain_key.clone(),
            pem: pem_encode_certificate(&issued.body),
            chain,
        })
    }

    /// Issuer certificates advertised with `rel="up"`. Failures only cost the
    /// chain, never the leaf.
    fn fetch_chain(&mut self, domain: &str, issued: &RawResponse) -> Vec<String> {
        let mut chain = Vec::new();
        for link in &issued.links_up {
            match self.transport.unsigned_request(Method::Get, link) {
                Ok(raw) if raw.status == OK && !raw.body.is_empty() => {
                    chain.push(pem_encode_certificate(&raw.body));
                }
                Ok(raw) => warn!(
                    "[acme-cert] issuer certificate {} for {} returned status {}; skipping",
                    link, domain, raw.status
                ),
                Err(err) => warn!(
                    "[acme-cert] failed to fetch issuer certificate {} for {}: {}",
                    link, domain, err
                ),
            }
        }
        chain
    }
}
