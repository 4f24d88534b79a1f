//! HTTP transport.
//!
//! One [`Transport`] holds the connection settings shared by every call
//! (base URL, auth header, zone, timeout). Each call performs exactly one
//! request; nothing is retried.
//!
//! Streaming calls hand back the response body as a [`ByteStream`]. The
//! connection belongs to that reader and is released when it is dropped,
//! whether or not the body was read to the end.

use std::io::{BufReader, Read};
use std::time::Duration;

use serde_json::Value;

use crate::error::{ApiError, TransportErrorKind};

/// Buffered response body of a streaming call.
pub type ByteStream = BufReader<Box<dyn Read + Send + Sync + 'static>>;

/// The only status code that means "request accepted".
pub const EXPECTED_STATUS: u16 = 200;

/// Header carrying the auth token.
pub const AUTH_HEADER: &str = "X-Neptulon-Token";

/// Pagination defaults sent with every request, streaming or not.
const DEFAULT_PARAMS: [(&str, &str); 2] = [("start", "0"), ("limit", "100")];

/// Connection settings for a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub host: String,
    pub version: String,
    /// Covers the whole request/response lifecycle, body included.
    pub timeout: Option<Duration>,
    pub auth_token: Option<String>,
    pub zone: Option<String>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            version: "v1".to_string(),
            timeout: None,
            auth_token: None,
            zone: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// `{host}/api/{version}` with any trailing slash on the host removed.
    pub fn api_base(&self) -> String {
        format!("{}/api/{}", self.host.trim_end_matches('/'), self.version)
    }
}

/// Reusable HTTP context.
pub struct Transport {
    agent: ureq::Agent,
    config: ClientConfig,
    base: String,
}

impl Transport {
    pub fn new(config: ClientConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let base = config.api_base();

        Self {
            agent: builder.build(),
            config,
            base,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issue a request and hand back the response body unread.
    ///
    /// Fails before any byte of the body is consumed if the server cannot be
    /// reached or answers with anything but [`EXPECTED_STATUS`].
    pub fn open_stream(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ByteStream, ApiError> {
        let response = self.send(method, path, &[], body)?;
        Ok(BufReader::new(response.into_reader()))
    }

    /// Issue a request and decode the whole body as one JSON document.
    pub fn fetch_json(
        &self,
        method: &str,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let response = self.send(method, path, params, body)?;
        let code = response.status();
        let text = response.into_string().map_err(ApiError::from_io)?;

        serde_json::from_str(&text).map_err(|_| ApiError::Remote {
            code,
            message: format!("Citadel did not return json, code {code}, body {text}"),
        })
    }

    fn send(
        &self,
        method: &str,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<ureq::Response, ApiError> {
        let url = format!("{}{}", self.base, path);
        let mut request = self.agent.request(method, &url);

        for (key, value) in query_params(params, self.config.zone.as_deref()) {
            request = request.query(key, value);
        }
        if let Some(ref token) = self.config.auth_token {
            request = request.set(AUTH_HEADER, token);
        }

        log::debug!("{} {}", method, url);
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        let response = result.map_err(map_ureq_error)?;
        if response.status() != EXPECTED_STATUS {
            return Err(remote_error(response.status(), response));
        }

        log::debug!("{} {} -> {}", method, url, response.status());
        Ok(response)
    }
}

/// Caller params, then the pagination defaults the caller did not set, then the zone.
fn query_params<'a>(params: &[(&'a str, &'a str)], zone: Option<&'a str>) -> Vec<(&'a str, &'a str)> {
    let mut query: Vec<(&str, &str)> = params.to_vec();
    for (key, value) in DEFAULT_PARAMS {
        if !query.iter().any(|(k, _)| *k == key) {
            query.push((key, value));
        }
    }
    if let Some(zone) = zone {
        query.push(("zone", zone));
    }
    query
}

fn map_ureq_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(code, response) => remote_error(code, response),
        ureq::Error::Transport(transport) => {
            let kind = transport_kind(&transport);
            let message = match kind {
                TransportErrorKind::Timeout => "Read timeout".to_string(),
                TransportErrorKind::ConnectionRefused => {
                    format!("ConnectionError, is citadel correctly set? ({transport})")
                }
                TransportErrorKind::Other => transport.to_string(),
            };
            log::debug!("transport failure ({}): {}", kind, transport);
            ApiError::Transport { kind, message }
        }
    }
}

fn transport_kind(transport: &ureq::Transport) -> TransportErrorKind {
    use std::error::Error as _;

    let timed_out = transport
        .source()
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .is_some_and(|e| {
            matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        });
    if timed_out {
        return TransportErrorKind::Timeout;
    }

    match transport.kind() {
        ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Dns => {
            TransportErrorKind::ConnectionRefused
        }
        _ => TransportErrorKind::Other,
    }
}

fn remote_error(code: u16, response: ureq::Response) -> ApiError {
    let body = response.into_string().unwrap_or_default();
    let message = remote_message(&body);
    log::debug!("remote refused with {}: {}", code, message);
    ApiError::Remote { code, message }
}

/// Extract the `error` field of a refusal body.
///
/// A JSON body without `error` yields `"Unknown error"`; a body that is not
/// JSON at all is reported as-is.
pub(crate) fn remote_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("error") {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Null) | None => "Unknown error".to_string(),
            Some(other) => other.to_string(),
        },
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "Unknown error".to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_strips_trailing_slash() {
        let config = ClientConfig::new("http://citadel.local/");
        assert_eq!(config.api_base(), "http://citadel.local/api/v1");

        let config = ClientConfig::new("http://citadel.local").version("v2");
        assert_eq!(config.api_base(), "http://citadel.local/api/v2");
    }

    #[test]
    fn query_params_adds_pagination_defaults() {
        let query = query_params(&[], None);
        assert_eq!(query, vec![("start", "0"), ("limit", "100")]);
    }

    #[test]
    fn query_params_keeps_caller_values() {
        let query = query_params(&[("limit", "20")], Some("c1"));
        assert_eq!(query, vec![("limit", "20"), ("start", "0"), ("zone", "c1")]);
    }

    #[test]
    fn remote_message_reads_error_field() {
        assert_eq!(remote_message(r#"{"error":"pod dev not found"}"#), "pod dev not found");
    }

    #[test]
    fn remote_message_without_error_field() {
        assert_eq!(remote_message(r#"{"detail":"x"}"#), "Unknown error");
        assert_eq!(remote_message(""), "Unknown error");
    }

    #[test]
    fn remote_message_non_json_body_is_verbatim() {
        assert_eq!(remote_message("502 Bad Gateway\n"), "502 Bad Gateway");
    }
}
