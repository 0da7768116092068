use log::warn;
use serde_json::{Value, json};

use crate::core::types::Challenge;

use super::{
    error::IssuanceError,
    key_authorization::key_authorization_for,
    keys::AccountKeyPair,
    observer::{IssuanceEvent, IssuanceObserver, Phase, report_finished},
    transport::{Method, Transport},
};

pub const NEW_AUTHZ_PATH: &str = "/acme/new-authz";
const CREATED: u16 = 201;
/// The only challenge type this client can answer.
pub const HTTP_01: &str = "http-01";

/// Opens a domain authorization with the CA and picks the `http-01` challenge.
pub struct AuthorizationRequester<'a> {
    transport: &'a mut dyn Transport,
    account_key: &'a AccountKeyPair,
    observer: &'a dyn IssuanceObserver,
}

impl<'a> AuthorizationRequester<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        account_key: &'a AccountKeyPair,
        observer: &'a dyn IssuanceObserver,
    ) -> Self {
        Self {
            transport,
            account_key,
            observer,
        }
    }

    pub fn request_authorization(&mut self, domain: &str) -> Result<Challenge, IssuanceError> {
        if domain.is_empty() {
            return Err(IssuanceError::InvalidArgument(
                "domain name is required".to_string(),
            ));
        }
        let result = self.open_authorization(domain);
        report_finished(self.observer, Phase::Authorization, domain, result)
    }

    fn open_authorization(&mut self, domain: &str) -> Result<Challenge, IssuanceError> {
        let payload = json!({
            "resource": "new-authz",
            "identifier": { "type": "dns", "value": domain },
        });
        self.observer.on_event(&IssuanceEvent::RequestSent {
            phase: Phase::Authorization,
            resource: "new-authz",
            url: NEW_AUTHZ_PATH.to_string(),
        });
        let response = self
            .transport
            .request(Method::Post, NEW_AUTHZ_PATH, Some(&payload))?;
        let location = self.transport.last_location();

        let Some((token, uri)) = select_http01(&response) else {
            if let Some(status) = self.transport.last_status_code().filter(|s| *s != CREATED) {
                warn!(
                    "[acme-authz] new-authz for {} returned status {}",
                    domain, status
                );
            }
            return Err(IssuanceError::ChallengeNotSupported {
                domain: domain.to_string(),
                body: response.to_string(),
            });
        };

        let authorization_location = match location {
            Some(location) => location,
            None => {
                warn!(
                    "[acme-authz] CA sent no authorization location for {}; polling challenge uri {}",
                    domain, uri
                );
                uri.clone()
            }
        };

        let key_authorization = key_authorization_for(&token, self.account_key)?;
        self.observer.on_event(&IssuanceEvent::ChallengeFound {
            domain: domain.to_string(),
            token: token.clone(),
            url: uri.clone(),
        });

        Ok(Challenge {
            domain: domain.to_string(),
            challenge_url: uri,
            token,
            key_authorization,
            authorization_location,
        })
    }
}

/// First `http-01` entry carrying both a token and a URI.
fn select_http01(response: &Value) -> Option<(String, String)> {
    response
        .get("challenges")?
        .as_array()?
        .iter()
        .filter(|challenge| challenge.get("type").and_then(Value::as_str) == Some(HTTP_01))
        .find_map(|challenge| {
            let token = challenge.get("token")?.as_str()?;
            let uri = challenge.get("uri")?.as_str()?;
            if token.is_empty() || uri.is_empty() {
                return None;
            }
            Some((token.to_string(), uri.to_string()))
        })
}
