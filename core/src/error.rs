//! Failure taxonomy for pipeline requests.
//!
//! Every failed dispatch is classified into exactly one [`RequestError`]
//! variant so callers branch on failure *kind* rather than on transport
//! details: the request never left (or never completed) the wire, the server
//! answered with a recognized failure status, or the response had a shape
//! this pipeline does not recognize.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T, E = RequestError> = std::result::Result<T, E>;

/// A failure that occurred before any response was obtained.
///
/// Transport failures mean the server never answered: the caller learns
/// nothing about the request's validity, only that delivery failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The endpoint could not be reached (DNS, connect, TLS, broken pipe).
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    /// No response arrived within the transport's deadline.
    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),
}

/// Classified failure for a dispatched request.
///
/// # Classification
///
/// - [`Transport`](RequestError::Transport): the transport failed before a
///   response was obtained.
/// - [`Protocol`](RequestError::Protocol): the server answered with a
///   recognized failure status (400..=599). The status code is preserved so
///   callers can branch on it.
/// - [`Unknown`](RequestError::Unknown): anything else - a response arrived
///   but its status falls outside both the success range and the recognized
///   failure range.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The transport failed before any response was obtained.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportFailure),

    /// The server rejected the request with a recognized failure status.
    #[error("Server error (status {status}): {message}")]
    Protocol {
        /// HTTP-style status code (400..=599).
        status: u16,
        /// Message extracted from the response body, or a generic fallback.
        message: String,
    },

    /// A response arrived whose shape this pipeline does not recognize.
    #[error("Unexpected response: {0}")]
    Unknown(String),
}

impl RequestError {
    /// Get the server status code, if the server produced one.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::error::RequestError;
    ///
    /// let error = RequestError::Protocol { status: 503, message: "down".into() };
    /// assert_eq!(error.status(), Some(503));
    /// ```
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            Self::Transport(_) | Self::Unknown(_) => None,
        }
    }

    /// Check whether this is a transport-level failure (no response obtained).
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check whether the server rejected the request as unauthenticated (401).
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch_core::error::RequestError;
    ///
    /// let error = RequestError::Protocol { status: 401, message: "expired".into() };
    /// assert!(error.is_unauthorized());
    /// ```
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Protocol { status: 401, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failure_converts_via_from() {
        let error: RequestError = TransportFailure::Unreachable("connection refused".into()).into();
        assert!(error.is_transport());
        assert_eq!(error.status(), None);
    }

    #[test]
    fn protocol_exposes_status() {
        let error = RequestError::Protocol {
            status: 422,
            message: "validation failed".into(),
        };
        assert_eq!(error.status(), Some(422));
        assert!(!error.is_transport());
        assert!(!error.is_unauthorized());
    }

    #[test]
    fn unauthorized_is_exactly_401() {
        let unauthorized = RequestError::Protocol {
            status: 401,
            message: "token expired".into(),
        };
        let forbidden = RequestError::Protocol {
            status: 403,
            message: "no access".into(),
        };
        assert!(unauthorized.is_unauthorized());
        assert!(!forbidden.is_unauthorized());
    }

    #[test]
    fn display_messages() {
        let timeout: RequestError = TransportFailure::TimedOut(Duration::from_secs(5)).into();
        assert_eq!(format!("{timeout}"), "Transport failure: Request timed out after 5s");

        let protocol = RequestError::Protocol {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(format!("{protocol}"), "Server error (status 500): boom");

        let unknown = RequestError::Unknown("status 304 outside taxonomy".into());
        assert_eq!(format!("{unknown}"), "Unexpected response: status 304 outside taxonomy");
    }
}
