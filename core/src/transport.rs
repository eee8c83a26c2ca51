//! HTTP transport for the direct-mail API.
//!
//! # Design
//! Entities never talk to the network directly; every remote operation takes
//! an explicit `&dyn Transport`. That keeps the entity code deterministic and
//! testable with an in-memory mock, and avoids a process-wide "current
//! client" singleton. [`HttpClient`] is the real implementation over ureq;
//! [`NullTransport`] is the not-authenticated sentinel that fails every call.
//!
//! Requests use HTTP basic auth and form-encoded bodies. Responses are JSON,
//! with a service quirk: some endpoints return JSON encoded *as a JSON
//! string*, so string bodies are decoded a second time.

use std::time::{Duration, Instant};

use base64::prelude::*;
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::error::Error;

/// Default endpoint of the hosted service.
const BASE_URL: &str = "https://api.lettermail.dev/v1";

/// RESTful actions shared by all entities.
///
/// `path` is the segments already joined by `/`, relative to the base URL.
/// `post` sends its fields form-encoded. Implementations return the decoded
/// JSON body.
pub trait Transport {
    fn get(&self, path: &str) -> Result<Value, Error>;
    fn post(&self, path: &str, form: &[(&str, String)]) -> Result<Value, Error>;
    fn delete(&self, path: &str) -> Result<Value, Error>;
}

/// Transport used before [`authenticate`](crate::authenticate) has produced
/// a real client. Every call fails with an API error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl NullTransport {
    fn refuse(&self) -> Error {
        Error::Api("not authenticated, call authenticate() first".to_string())
    }
}

impl Transport for NullTransport {
    fn get(&self, _path: &str) -> Result<Value, Error> {
        Err(self.refuse())
    }

    fn post(&self, _path: &str, _form: &[(&str, String)]) -> Result<Value, Error> {
        Err(self.refuse())
    }

    fn delete(&self, _path: &str) -> Result<Value, Error> {
        Err(self.refuse())
    }
}

/// Blocking HTTP client with stored basic-auth credentials.
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
    auth_header: String,
}

impl HttpClient {
    /// Build a client against the hosted service endpoint.
    ///
    /// Fails with an API error when either credential is empty; the service
    /// rejects anonymous requests, so there is no point issuing them.
    pub fn new(username: &str, password: &str) -> Result<Self, Error> {
        Self::with_base_url(username, password, BASE_URL)
    }

    /// Build a client against a different endpoint, e.g. a local mock server.
    pub fn with_base_url(username: &str, password: &str, base_url: &str) -> Result<Self, Error> {
        if username.is_empty() {
            return Err(Error::Api("username must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(Error::Api("password must not be empty".to_string()));
        }

        // Status interpretation belongs to this crate, not to ureq.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();

        let credentials = BASE64_STANDARD.encode(format!("{username}:{password}"));

        Ok(Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {credentials}"),
        })
    }

    /// Current time on the server, from the `test/ping` endpoint.
    pub fn server_time(&self) -> Result<NaiveDateTime, Error> {
        let value = self.get("test/ping")?;
        let pong = value
            .get("pong")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Decode("missing pong field in ping response".to_string()))?;

        DateTime::parse_from_rfc3339(pong)
            .map(|dt| dt.naive_utc())
            .or_else(|_| NaiveDateTime::parse_from_str(pong, "%Y-%m-%dT%H:%M:%S%.f"))
            .map_err(|e| Error::Decode(format!("bad pong timestamp: {e}")))
    }

    /// One-way latency to the server, estimated as half a `test/ping`
    /// round trip.
    pub fn ping(&self) -> Result<Duration, Error> {
        let sent = Instant::now();
        self.get("test/ping")?;
        Ok(sent.elapsed() / 2)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn read(
        &self,
        result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
        path: &str,
    ) -> Result<Value, Error> {
        let mut response = result.map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            log::warn!("{path} failed with HTTP {status}");
        }
        decode_body(status, body)
    }
}

impl Transport for HttpClient {
    fn get(&self, path: &str) -> Result<Value, Error> {
        log::debug!("GET {path}");
        let result = self
            .agent
            .get(self.url(path))
            .header("authorization", self.auth_header.as_str())
            .call();
        self.read(result, path)
    }

    fn post(&self, path: &str, form: &[(&str, String)]) -> Result<Value, Error> {
        log::debug!("POST {path}");
        let result = self
            .agent
            .post(self.url(path))
            .header("authorization", self.auth_header.as_str())
            .send_form(form.iter().map(|(k, v)| (*k, v.as_str())));
        self.read(result, path)
    }

    fn delete(&self, path: &str) -> Result<Value, Error> {
        log::debug!("DELETE {path}");
        let result = self
            .agent
            .delete(self.url(path))
            .header("authorization", self.auth_header.as_str())
            .call();
        self.read(result, path)
    }
}

/// Interpret a raw response: non-2xx wraps the status, string bodies holding
/// JSON are decoded twice.
pub(crate) fn decode_body(status: u16, body: String) -> Result<Value, Error> {
    if !(200..300).contains(&status) {
        return Err(Error::Http { status, body });
    }

    let value: Value = serde_json::from_str(&body).map_err(|e| Error::Decode(e.to_string()))?;
    match value {
        Value::String(inner) => {
            serde_json::from_str(&inner).map_err(|e| Error::Decode(e.to_string()))
        }
        other => Ok(other),
    }
}

/// Fetch `{base}/0`, `{base}/1`, ... until the first empty page, returning
/// the concatenated records in request order.
pub(crate) fn fetch_all_pages(
    transport: &dyn Transport,
    base: &str,
) -> Result<Vec<Value>, Error> {
    let mut all = Vec::new();
    for page in 0u32.. {
        let value = transport.get(&format!("{base}/{page}"))?;
        let items = value
            .as_array()
            .ok_or_else(|| Error::Decode(format!("expected an array from {base}")))?;
        if items.is_empty() {
            break;
        }
        all.extend(items.iter().cloned());
    }
    Ok(all)
}

/// Pull the integer id field out of a create response.
pub(crate) fn id_field(value: &Value, field: &str) -> Result<i32, Error> {
    let id = value
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Decode(format!("missing {field} in response")))?;
    i32::try_from(id).map_err(|_| Error::Decode(format!("{field} out of range: {id}")))
}

/// Unwrap the one-element array an id lookup returns, failing with a request
/// error when the result set is empty.
pub(crate) fn single_record(value: Value, what: &str, id: i32) -> Result<Value, Error> {
    match value {
        Value::Array(mut records) if !records.is_empty() => Ok(records.remove(0)),
        Value::Array(_) => Err(Error::Request(format!("no {what} with id {id}"))),
        _ => Err(Error::Decode(format!("expected an array of {what} records"))),
    }
}

/// Reject ids that can't name a server record before any request is built.
pub(crate) fn check_id(id: i32, what: &str) -> Result<(), Error> {
    if id <= 0 {
        return Err(Error::InvalidValue(format!("{what} id must be positive")));
    }
    Ok(())
}

/// Render a browse-range timestamp the way the service expects it.
pub(crate) fn iso8601(when: NaiveDateTime) -> String {
    when.format("%Y-%m-%dT%H:%M:%S").to_string()
}
