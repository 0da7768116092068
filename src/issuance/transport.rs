//! Seam between the issuance state machines and the wire.
//!
//! The state machines only ever talk to a [`Transport`]; the production
//! implementation lives in [`super::http::HttpTransport`], tests script one.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(String),
    #[error("request signing failed: {0}")]
    Signing(String),
    #[error("replay nonce unavailable: {0}")]
    Nonce(String),
    #[error("response decoding failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Undecoded response of a plain (unsigned) retrieval.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub location: Option<String>,
    /// Targets of `Link: <...>;rel="up"` headers.
    pub links_up: Vec<String>,
    pub body: Vec<u8>,
}

/// Request/response exchange with the CA.
///
/// `request` performs an authenticated exchange and decodes the body as JSON
/// (`Value::Null` when the body is empty or not JSON). The status code and
/// `Location` header of the most recent `request` stay readable through
/// `last_status_code` and `last_location`, since the CA does not always echo
/// resource locations in the body.
pub trait Transport: Send {
    fn request(
        &mut self,
        method: Method,
        path_or_url: &str,
        payload: Option<&Value>,
    ) -> Result<Value, TransportError>;

    fn unsigned_request(&mut self, method: Method, url: &str)
    -> Result<RawResponse, TransportError>;

    fn last_location(&self) -> Option<String>;

    fn last_status_code(&self) -> Option<u16>;
}

/// Parses the `rel="up"` targets out of raw `Link` header values.
pub(crate) fn parse_up_links<'a>(headers: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut links = Vec::new();
    for header in headers {
        for entry in split_unquoted(header, ',') {
            let entry = entry.trim();
            let Some(rest) = entry.strip_prefix('<') else {
                continue;
            };
            let Some((target, params)) = rest.split_once('>') else {
                continue;
            };
            let is_up = split_unquoted(params, ';').into_iter().any(|param| {
                let Some((name, value)) = param.split_once('=') else {
                    return false;
                };
                name.trim().eq_ignore_ascii_case("rel")
                    && value
                        .trim()
                        .trim_matches('"')
                        .split_whitespace()
                        .any(|rel| rel.eq_ignore_ascii_case("up"))
            });
            if is_up {
                links.push(target.trim().to_string());
            }
        }
    }
    links
}

/// Splits on `separator` outside of `<...>` targets and quoted strings.
fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_target = false;
    for (index, c) in input.char_indices() {
        match c {
            '"' if !in_target => in_quotes = !in_quotes,
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            c if c == separator && !in_quotes && !in_target => {
                parts.push(&input[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}
