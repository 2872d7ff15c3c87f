//! Error types for the kasa library.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, protocol, storage and input validation errors.

use std::fmt;
use thiserror::Error;

/// The unified error type for kasa operations.
///
/// Callers can match on the family to decide what to do: only an
/// [`AuthError`] ever changes session state, and only a 401
/// [`ProtocolError`] ever starts a credential renewal.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (bad credentials, failed renewal, corrupt token).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The API answered with a non-success status.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input validation errors (base URL, amounts).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Persisted credential storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// True for both a rejected login and a locked account.
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            Error::Auth(AuthError::LoginFailed { .. } | AuthError::AccountLocked { .. })
        )
    }

    /// True when the API rejected the presented access credential.
    pub fn is_expiry_rejection(&self) -> bool {
        matches!(self, Error::Protocol(e) if e.is_expiry_rejection())
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// The response body could not be decoded.
    #[error("invalid response body: {message}")]
    Decode { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            TransportError::Decode {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication-related errors.
///
/// `Clone` so that one renewal outcome can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The access token could not be parsed into its claims.
    #[error("malformed credential: {reason}")]
    MalformedCredential { reason: String },

    /// Renewal was rejected, or there was no renewal token to present.
    #[error("credential renewal failed: {reason}")]
    RefreshFailed { reason: String },

    /// Username or password was rejected.
    #[error("login failed: {message}")]
    LoginFailed { message: String },

    /// Too many failed attempts; the account is temporarily locked.
    #[error("account locked: {message}")]
    AccountLocked { message: String },

    /// The operation needs a session and there is none.
    #[error("not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AuthError::MalformedCredential {
            reason: reason.into(),
        }
    }

    pub(crate) fn refresh_failed(reason: impl Into<String>) -> Self {
        AuthError::RefreshFailed {
            reason: reason.into(),
        }
    }
}

/// Protocol-level errors from API responses.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Server-supplied `detail` or `error` message (if present).
    pub message: Option<String>,
    /// Raw error body, kept for field-level validation errors.
    pub body: Option<serde_json::Value>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, message: Option<String>, body: Option<serde_json::Value>) -> Self {
        Self {
            status,
            message,
            body,
        }
    }

    /// Build from a JSON error body, picking out the human-readable message.
    ///
    /// The API reports errors as `{"detail": ...}`, `{"error": ...}`, or a
    /// map of field names to lists of messages.
    pub fn from_body(status: u16, body: Option<serde_json::Value>) -> Self {
        let message = body.as_ref().and_then(|b| {
            b.get("detail")
                .or_else(|| b.get("error"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| first_field_message(b))
        });
        Self::new(status, message, body)
    }

    /// The presented access credential was expired or invalid.
    pub fn is_expiry_rejection(&self) -> bool {
        self.status == 401
    }

    /// The account is locked out (only meaningful on the login path).
    pub fn is_lockout(&self) -> bool {
        self.status == 403
    }
}

fn first_field_message(body: &serde_json::Value) -> Option<String> {
    let (field, messages) = body.as_object()?.iter().next()?;
    let message = match messages {
        serde_json::Value::Array(items) => items.first()?.as_str()?.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return None,
    };
    Some(format!("{}: {}", field, message))
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid decimal amount.
    #[error("invalid amount '{value}': {reason}")]
    Amount { value: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

/// Credential storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but is not a valid key-value document.
    #[error("corrupt credential file {path}: {message}")]
    Corrupt { path: String, message: String },
}
