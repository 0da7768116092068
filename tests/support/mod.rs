use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use acme_v1_issuer::{Method, Pause, RawResponse, Transport, TransportError};
use serde_json::Value;

/// One canned CA response.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub location: Option<String>,
    pub links_up: Vec<String>,
    pub body: Vec<u8>,
}

impl CannedResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            location: None,
            links_up: Vec::new(),
            body: body.to_string().into_bytes(),
        }
    }

    pub fn raw(status: u16, body: &[u8]) -> Self {
        Self {
            status,
            location: None,
            links_up: Vec::new(),
            body: body.to_vec(),
        }
    }

    pub fn at(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: Method,
    pub url: String,
    pub payload: Option<Value>,
    pub signed: bool,
}

#[derive(Default)]
struct Script {
    responses: VecDeque<CannedResponse>,
    exchanges: Vec<Exchange>,
}

/// Fake CA replaying canned responses in order. Clones share the script so the
/// test keeps a handle after the client takes ownership of its transport.
#[derive(Clone, Default)]
pub struct FakeCa {
    script: Arc<Mutex<Script>>,
    last_location: Option<String>,
    last_status: Option<u16>,
}

impl FakeCa {
    pub fn new(responses: impl IntoIterator<Item = CannedResponse>) -> Self {
        let script = Script {
            responses: responses.into_iter().collect(),
            exchanges: Vec::new(),
        };
        Self {
            script: Arc::new(Mutex::new(script)),
            ..Self::default()
        }
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.script.lock().unwrap().exchanges.clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().responses.len()
    }

    fn next(&self, exchange: Exchange) -> Result<CannedResponse, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.exchanges.push(exchange);
        script
            .responses
            .pop_front()
            .ok_or_else(|| TransportError::Http("fake CA has no more responses".into()))
    }
}

impl Transport for FakeCa {
    fn request(
        &mut self,
        method: Method,
        path_or_url: &str,
        payload: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let response = self.next(Exchange {
            method,
            url: path_or_url.to_string(),
            payload: payload.cloned(),
            signed: true,
        })?;
        self.last_status = Some(response.status);
        self.last_location = response.location;
        Ok(serde_json::from_slice(&response.body).unwrap_or(Value::Null))
    }

    fn unsigned_request(&mut self, method: Method, url: &str) -> Result<RawResponse, TransportError> {
        let response = self.next(Exchange {
            method,
            url: url.to_string(),
            payload: None,
            signed: false,
        })?;
        Ok(RawResponse {
            status: response.status,
            location: response.location,
            links_up: response.links_up,
            body: response.body,
        })
    }

    fn last_location(&self) -> Option<String> {
        self.last_location.clone()
    }

    fn last_status_code(&self) -> Option<u16> {
        self.last_status
    }
}

/// Counts pauses instead of sleeping.
#[derive(Default)]
pub struct NoSleep {
    pauses: Mutex<u32>,
}

impl NoSleep {
    pub fn count(&self) -> u32 {
        *self.pauses.lock().unwrap()
    }
}

impl Pause for NoSleep {
    fn pause(&self, _interval: std::time::Duration) {
        *self.pauses.lock().unwrap() += 1;
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
