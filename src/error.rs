//! Error handling for groovify.
//!
//! Every fallible operation returns [`Result`], whose error carries an
//! [`ErrorKind`] classifying the failure and the underlying error with its
//! details.
//!
//! # Error Categories
//!
//! * Device storage faults ([`StorageFault`](ErrorKind::StorageFault))
//! * Requests that could not complete ([`NetworkFault`](ErrorKind::NetworkFault))
//! * Token rejected by the backend, HTTP 401 ([`Unauthorized`](ErrorKind::Unauthorized))
//! * Login redirects without a code ([`MalformedRedirect`](ErrorKind::MalformedRedirect))
//! * One-time codes rejected by the backend ([`ExchangeFailed`](ErrorKind::ExchangeFailed))
//! * Any other backend rejection ([`Api`](ErrorKind::Api))
//!
//! # Presenting errors
//!
//! When the backend explains a failure, it sends a `detail` message. That
//! message is kept as a [`BackendDetail`] and returned by
//! [`Error::user_message`]; otherwise the caller's fallback text is used.
//!
//! ```rust
//! match backend.ai_description(&id).await {
//!     Ok(text) => println!("{text}"),
//!     Err(e) => eprintln!("{}", e.user_message("Could not generate description.")),
//! }
//! ```

#![allow(clippy::enum_glob_use)]

use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// Main error type combining error kind and details.
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

/// Standard result type for groovify operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// Device storage is unavailable, unreadable or corrupt.
    #[error("storage fault")]
    StorageFault,

    /// The request could not complete: connection refused, timeout, reset.
    #[error("network fault")]
    NetworkFault,

    /// The backend rejected the session token (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// A login redirect did not carry the expected `code` parameter.
    #[error("malformed redirect")]
    MalformedRedirect,

    /// The backend rejected the one-time exchange code.
    #[error("code exchange failed")]
    ExchangeFailed,

    /// The backend answered with a non-success status other than 401.
    #[error("backend error")]
    Api,

    /// A value supplied by the caller or the backend is invalid.
    #[error("invalid argument")]
    InvalidArgument,

    /// Unexpected internal error.
    #[error("internal error")]
    Internal,
}

/// Explanation sent by the backend alongside a non-success status.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{message} (HTTP {status})")]
pub struct BackendDetail {
    /// Status code of the response.
    pub status: StatusCode,

    /// Human-readable message taken from the response `detail`.
    pub message: String,
}

impl Error {
    /// Creates a new error with specified kind and details.
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    pub fn storage_fault<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::StorageFault, error)
    }

    pub fn network_fault<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::NetworkFault, error)
    }

    pub fn unauthorized<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unauthorized, error)
    }

    pub fn malformed_redirect<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::MalformedRedirect, error)
    }

    pub fn exchange_failed<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::ExchangeFailed, error)
    }

    pub fn api<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Api, error)
    }

    pub fn invalid_argument<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::InvalidArgument, error)
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Internal, error)
    }

    /// Attempts to downcast the underlying error to a concrete type.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// The backend explanation attached to this error, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&BackendDetail> {
        self.downcast::<BackendDetail>()
    }

    /// Text to show the user: the backend message when one was sent,
    /// otherwise `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail()
            .map_or_else(|| fallback.to_owned(), |detail| detail.message.clone())
    }

    /// Re-classifies this error while keeping its details.
    #[must_use]
    pub fn with_kind(self, kind: ErrorKind) -> Self {
        Self { kind, ..self }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            AddrNotAvailable | ConnectionRefused | NotConnected | BrokenPipe
            | ConnectionReset | ConnectionAborted | TimedOut => Self::network_fault(err),
            InvalidInput => Self::invalid_argument(err),
            _ => Self::storage_fault(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::internal(err);
        }

        if err.is_decode() {
            return Self::invalid_argument(err);
        }

        if let Some(status) = err.status() {
            if status == StatusCode::UNAUTHORIZED {
                return Self::unauthorized(err);
            }
            return Self::api(err);
        }

        Self::network_fault(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_argument(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid_argument(err)
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::internal(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_backend_detail() {
        let err = Error::api(BackendDetail {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid type. Must be 'artists' or 'tracks'.".to_owned(),
        });
        assert_eq!(
            err.user_message("Could not load."),
            "Invalid type. Must be 'artists' or 'tracks'."
        );
    }

    #[test]
    fn user_message_falls_back() {
        let err = Error::network_fault("connection reset");
        assert_eq!(err.user_message("Could not load."), "Could not load.");
    }

    #[test]
    fn io_errors_map_to_storage_faults() {
        let err = Error::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind, ErrorKind::StorageFault);

        let err = Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(err.kind, ErrorKind::NetworkFault);
    }

    #[test]
    fn with_kind_keeps_detail() {
        let err = Error::api(BackendDetail {
            status: StatusCode::BAD_REQUEST,
            message: "code already used".to_owned(),
        })
        .with_kind(ErrorKind::ExchangeFailed);
        assert_eq!(err.kind, ErrorKind::ExchangeFailed);
        assert_eq!(err.user_message("fallback"), "code already used");
    }
}
