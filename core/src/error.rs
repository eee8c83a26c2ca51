//! Error types for the direct-mail API client.
//!
//! # Design
//! One variant per failure kind so callers can match on what went wrong
//! rather than parsing messages. All field and lifecycle validation happens
//! locally, before any request is issued, so by the time `Http` or `Decode`
//! shows up the request itself was well-formed.

use std::fmt;

/// Errors returned by the client and by entity operations.
#[derive(Debug)]
pub enum Error {
    /// A dynamically-typed value of the wrong kind, e.g. a JSON number
    /// supplied as mailing data.
    InvalidType(String),

    /// A value of the right type but outside its allowed set: an unknown
    /// enum string from the wire, a non-positive id, a digest mismatch.
    InvalidValue(String),

    /// A setter was called on a write-once field of an already-created
    /// entity. Carries the field name.
    ReadOnly(&'static str),

    /// The operation is invalid in the entity's current lifecycle state,
    /// or the transport has no credentials.
    Api(String),

    /// An id lookup that expects exactly one record got an empty result.
    Request(String),

    /// The server returned a non-2xx status.
    Http { status: u16, body: String },

    /// The request never produced a response: connection, TLS, or I/O
    /// failure below the HTTP layer.
    Transport(String),

    /// The response body could not be decoded into the expected shape.
    Decode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidType(msg) => write!(f, "invalid type: {msg}"),
            Error::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            Error::ReadOnly(field) => {
                write!(f, "can't modify attribute of created entity: {field}")
            }
            Error::Api(msg) => write!(f, "api error: {msg}"),
            Error::Request(msg) => write!(f, "request error: {msg}"),
            Error::Http { status, body } => write!(f, "HTTP {status}: {body}"),
            Error::Transport(msg) => write!(f, "transport failed: {msg}"),
            Error::Decode(msg) => write!(f, "decode failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Error for a value outside its allowed set, shared by the wire enums so
/// every field reports the same way.
pub(crate) fn bad_attribute(attribute: &str, allowed: &[&str]) -> Error {
    Error::InvalidValue(format!("{attribute} must be one of {}", allowed.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_status_and_body() {
        let err = Error::Http {
            status: 422,
            body: "bad batch".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 422: bad batch");
    }

    #[test]
    fn read_only_names_the_field() {
        let err = Error::ReadOnly("template");
        assert!(err.to_string().contains("template"));
    }

    #[test]
    fn bad_attribute_lists_allowed_values() {
        let err = bad_attribute("status", &["processing", "hold", "archive"]);
        assert_eq!(
            err.to_string(),
            "invalid value: status must be one of processing, hold, archive"
        );
    }
}
