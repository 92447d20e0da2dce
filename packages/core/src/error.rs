use std::time::Duration;

use crate::address::AddressError;
use crate::envelope::ErrorDetail;

/// Errors raised by the resource protocol.
///
/// Transport failures (including undecodable bodies) are kept apart from
/// well-formed application errors reported inside a response envelope;
/// callers usually branch on [`ErrorDetail::class`] for the latter.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Connection failure, unexpected content type, or a non-2xx response
    /// that is not an error envelope.
    #[error("transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },

    /// The transport reported success but the body is not valid JSON.
    #[error("decode error (HTTP {status}): {message}")]
    Decode {
        status: u16,
        message: String,
        body: String,
    },

    /// A well-formed envelope reporting a remote-side failure.
    #[error("{detail}")]
    Application {
        detail: ErrorDetail,
        envelope: serde_json::Value,
    },

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    /// A local value with no address was asked to perform a verb.
    #[error("{kind} value is not addressable")]
    NotAddressable { kind: &'static str },

    /// The batch deadline expired before this slot produced a result.
    #[error("request {index} did not complete within {after:?}")]
    Timeout { index: usize, after: Duration },

    /// Every fetch worker stopped before this slot produced a result.
    #[error("fetch pool error: {message}")]
    Pool { message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(" (HTTP {})", status),
        None => String::new(),
    }
}

impl Error {
    /// Build a transport error with no HTTP status (e.g. connection refused).
    pub fn connection(message: impl Into<String>) -> Self {
        Error::Transport {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    /// True for transport failures, including decode errors.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::Decode { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }

    pub fn is_application(&self) -> bool {
        matches!(self, Error::Application { .. })
    }

    /// The structured detail of an application error.
    pub fn application(&self) -> Option<&ErrorDetail> {
        match self {
            Error::Application { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// The HTTP status associated with a transport failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => *status,
            Error::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }
}
