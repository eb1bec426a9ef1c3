use thiserror::Error;

use crate::device::types::Operation;

/// Why a remote operation did not succeed.
///
/// The workflow only cares that an operation failed; the variants exist so the
/// cause can be logged.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("could not build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("invalid device URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{operation} payload is not valid JSON: {source}")]
    InvalidPayload {
        operation: Operation,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} request failed: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {status}")]
    UnexpectedStatus { operation: Operation, status: u16 },

    #[error("root response carried no Set-Cookie header")]
    MissingSessionCookie,

    #[error("{operation} requires a session token")]
    MissingSession { operation: Operation },

    #[error("{operation} response did not contain {marker:?}")]
    MarkerNotFound { operation: Operation, marker: String },
}

impl DeviceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeviceError::Transport { source, .. } if source.is_timeout())
    }
}
