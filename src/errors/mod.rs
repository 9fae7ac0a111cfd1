//! # Error Handling
//!
//! Error types for certificate issuance. Callers of [`crate::Issuer::issue`]
//! need to tell "cannot authenticate" apart from "the CA refused this request",
//! so authorization and backend failures are distinct variants.

use crate::config::IssuerKind;
use thiserror::Error;

/// Result type for issuer operations.
pub type Result<T> = std::result::Result<T, IssuerError>;

/// Errors that can occur while configuring issuers or issuing certificates.
#[derive(Error, Debug)]
pub enum IssuerError {
    /// Invalid or missing settings, detected at construction.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The credential is missing, expired or was rejected by the CA.
    #[error("Authorization failed: {message}")]
    Authorization { message: String },

    /// The CA rejected the request or could not be reached.
    #[error("{backend} backend error: {message}")]
    Backend { backend: IssuerKind, message: String, status: Option<u16> },

    /// A background credential renewal attempt failed.
    #[error("Credential renewal failed: {message}")]
    Renewal { message: String },

    /// The request cannot be expressed for the selected backend.
    #[error("Invalid certificate request: {reason}")]
    InvalidRequest { reason: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IssuerError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization { message: message.into() }
    }

    /// Create a backend error without an HTTP status.
    pub fn backend(backend: IssuerKind, message: impl Into<String>) -> Self {
        Self::Backend { backend, message: message.into(), status: None }
    }

    /// Create a backend error carrying the status code the CA answered with.
    pub fn backend_status(backend: IssuerKind, status: u16, message: impl Into<String>) -> Self {
        Self::Backend { backend, message: message.into(), status: Some(status) }
    }

    /// Create a renewal error.
    pub fn renewal(message: impl Into<String>) -> Self {
        Self::Renewal { message: message.into() }
    }

    /// Create an invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest { reason: reason.into() }
    }

    /// Classify a CA response status: 401/403 mean the credential was rejected.
    pub fn from_status(backend: IssuerKind, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::authorization(format!("{} rejected the credential: {}", backend, message)),
            _ => Self::backend_status(backend, status, message),
        }
    }

    /// True when the failure is about credentials rather than the request itself.
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Authorization { .. })
    }

    /// True for configuration errors (fatal at startup).
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// True when the CA refused the request or was unreachable.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

impl From<validator::ValidationErrors> for IssuerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::config(errors.to_string())
    }
}
