use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, LINK, LOCATION};
use serde_json::{Value, json};

use crate::core::config::CaConfig;

use super::{
    jws::{self, RsaJwk},
    keys::AccountKeyPair,
    transport::{Method, RawResponse, Transport, TransportError, parse_up_links},
};

pub const REPLAY_NONCE_HEADER: &str = "Replay-Nonce";
const DIRECTORY_PATH: &str = "/directory";

/// Blocking HTTP transport bound to one account key.
///
/// POST bodies are wrapped in a signed JWS envelope; every response's
/// `Replay-Nonce` is kept for the next signature.
pub struct HttpTransport {
    client: Client,
    config: CaConfig,
    account_key: AccountKeyPair,
    jwk: RsaJwk,
    nonce: Option<String>,
    last_location: Option<String>,
    last_status: Option<u16>,
}

impl HttpTransport {
    pub fn new(config: &CaConfig, account_key: &AccountKeyPair) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(config),
            config: config.clone(),
            account_key: account_key.clone(),
            jwk: RsaJwk::from_account_key(account_key)?,
            nonce: None,
            last_location: None,
            last_status: None,
        })
    }

    fn take_nonce(&mut self) -> Result<String, TransportError> {
        if let Some(nonce) = self.nonce.take() {
            return Ok(nonce);
        }
        let url = self.config.resolve(DIRECTORY_PATH);
        debug!("[acme-http] fetching fresh nonce from {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| TransportError::Nonce(e.to_string()))?;
        self.remember_nonce(response.headers());
        self.nonce.take().ok_or_else(|| {
            TransportError::Nonce(format!(
                "{url} returned status {} without a {REPLAY_NONCE_HEADER} header",
                response.status().as_u16()
            ))
        })
    }

    fn remember_nonce(&mut self, headers: &HeaderMap) {
        if let Some(nonce) = headers
            .get(REPLAY_NONCE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            self.nonce = Some(nonce.to_string());
        }
    }

    fn location_of(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(|location| self.config.resolve(location.trim()))
    }

    fn send(&mut self, method: Method, url: &str, body: Option<Value>) -> Result<Response, TransportError> {
        let request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        let request = match body {
            Some(body) => request.json(&body),
            None => request,
        };
        let response = request.send().map_err(|e| {
            warn!("[acme-http] {} {} failed: {}", method.as_str(), url, e);
            TransportError::Http(e.to_string())
        })?;
        debug!(
            "[acme-http] {} {} -> {}",
            method.as_str(),
            url,
            response.status().as_u16()
        );
        self.remember_nonce(response.headers());
        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn request(
        &mut self,
        method: Method,
        path_or_url: &str,
        payload: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let url = self.config.resolve(path_or_url);
        let body = match method {
            // GET carries no body in ACME v1, so there is nothing to sign.
            Method::Get => None,
            Method::Post => {
                let nonce = self.take_nonce()?;
                let empty = json!({});
                let envelope =
                    jws::sign(&self.account_key, &self.jwk, &nonce, payload.unwrap_or(&empty))?;
                Some(
                    serde_json::to_value(envelope)
                        .map_err(|e| TransportError::Signing(e.to_string()))?,
                )
            }
        };

        let response = self.send(method, &url, body)?;
        self.last_status = Some(response.status().as_u16());
        self.last_location = self.location_of(response.headers());
        let bytes = response
            .bytes()
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(decode_body(&bytes))
    }

    fn unsigned_request(
        &mut self,
        method: Method,
        url: &str,
    ) -> Result<RawResponse, TransportError> {
        let url = self.config.resolve(url);
        let response = self.send(method, &url, None)?;
        let status = response.status().as_u16();
        let location = self.location_of(response.headers());
        let links_up = parse_up_links(
            response
                .headers()
                .get_all(LINK)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        )
        .into_iter()
        .map(|link| self.config.resolve(&link))
        .collect();
        let body = response
            .bytes()
            .map_err(|e| TransportError::Decode(e.to_string()))?
            .to_vec();
        Ok(RawResponse {
            status,
            location,
            links_up,
            body,
        })
    }

    fn last_location(&self) -> Option<String> {
        self.last_location.clone()
    }

    fn last_status_code(&self) -> Option<u16> {
        self.last_status
    }
}

fn build_client(config: &CaConfig) -> Client {
    Client::builder()
        .timeout(config.http_timeout())
        .build()
        .unwrap_or_else(|err| {
            warn!("[acme-http] failed to build client: {err}");
            Client::new()
        })
}

/// JSON bodies decode to their value; empty or binary bodies become `Null`.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}
