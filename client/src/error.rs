//! Error types for the Atlas Command client.
//!
//! # Design
//! Three enums, one per failure origin, so callers can route recovery
//! without string matching: `ComponentError` (construction-time validation:
//! fix the input), `TransportError` (connectivity: retry at a higher layer),
//! and `Error` (everything an operation can return, including HTTP statuses).
//! Non-2xx responses land uniformly in `Error::Status` with the raw status
//! code and body for debugging; the client performs no retries and no
//! suppression.

use thiserror::Error;

/// Convenience alias for operation results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Validation failure raised while constructing a component value.
///
/// These never reach the network; a component that fails its builder or
/// constructor is simply never handed to the client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComponentError {
    /// A numeric field was given a NaN or infinite value, which JSON cannot
    /// represent.
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    /// A numeric field was outside its documented range.
    #[error("{field} {requirement}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
    },

    /// A required string field was empty.
    #[error("{field} must be a non-empty string")]
    Empty { field: &'static str },

    /// A timestamp field did not parse as RFC 3339.
    #[error("{field} must be a valid RFC 3339 timestamp, got '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },

    /// An extension key was missing the `custom_` prefix. `kind` names the
    /// field family ("component", "task parameter", ...) so the message
    /// matches the resource being built.
    #[error("unknown {kind} '{key}': custom fields must be prefixed with 'custom_'")]
    UnknownKey { kind: &'static str, key: String },
}

/// Connection-level failure reported by a [`Transport`](crate::http::Transport).
///
/// Distinct from `Error::Status`: the request never produced an HTTP
/// response at all.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The configured request timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// DNS resolution or TCP/TLS connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Errors returned by `AtlasCommandClient` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument combination was missing. Raised before any
    /// request is sent.
    #[error("{0}")]
    InvalidRequest(String),

    /// The server returned a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never completed at the transport level.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client was closed; its connection has been released.
    #[error("client is closed")]
    Closed,

    /// The upload response carried no `object_id` although references were
    /// requested, so the reference-attachment step cannot proceed. Signals
    /// a server-contract violation, not a usage error.
    #[error("upload response did not include an object_id; cannot attach references")]
    MissingUploadObjectId,

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The response body could not be parsed as JSON.
    #[error("deserialization failed: {0}")]
    Deserialize(#[source] serde_json::Error),
}

impl Error {
    /// The HTTP status code, when this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_error_messages_name_field_and_constraint() {
        let err = ComponentError::OutOfRange {
            field: "latitude",
            requirement: "must be between -90 and 90",
        };
        assert_eq!(err.to_string(), "latitude must be between -90 and 90");

        let err = ComponentError::InvalidTimestamp {
            field: "last_seen",
            value: "not-a-date".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "last_seen must be a valid RFC 3339 timestamp, got 'not-a-date'"
        );
    }

    #[test]
    fn unknown_key_message_names_offender_and_convention() {
        let err = ComponentError::UnknownKey {
            kind: "component",
            key: "weather".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown component 'weather': custom fields must be prefixed with 'custom_'"
        );
    }

    #[test]
    fn status_accessor_only_matches_status_errors() {
        let err = Error::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.status(), Some(502));
        assert_eq!(Error::Closed.status(), None);
    }

    #[test]
    fn transport_errors_convert_into_client_errors() {
        let err: Error = TransportError::Timeout.into();
        assert!(matches!(err, Error::Transport(TransportError::Timeout)));
    }
}
