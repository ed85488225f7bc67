//! Usage-error taxonomy for the invocation layer.
//!
//! These are the failures that are *not* captured as a [`crate::Fault`]:
//! misconfiguration and authentication problems that surface immediately and
//! are never retried.

use thiserror::Error;

/// Rejected endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("endpoint address must use https: {address}")]
    InsecureAddress { address: String },
    #[error("endpoint address is not a valid URL: {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("endpoint address has no host: {address}")]
    MissingHost { address: String },
    #[error("contract name must not be empty")]
    EmptyContract,
    #[error("client type must not be empty")]
    EmptyClientType,
}

/// Rejected transport binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("{name} timeout must be non-zero")]
    ZeroTimeout { name: &'static str },
    #[error("{name} quota must be non-zero")]
    ZeroQuota { name: &'static str },
}

/// Certificate lookup failures. Authentication failures are never retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("certificate subject must not be empty")]
    EmptySubject,
    #[error("no certificate matches subject '{subject}'")]
    NotFound { subject: String },
    #[error("no certificate with thumbprint {thumbprint}")]
    ThumbprintNotFound { thumbprint: String },
    #[error("certificate material is unusable: {reason}")]
    InvalidMaterial { reason: String },
    #[error("certificate store unavailable: {reason}")]
    Store { reason: String },
}

/// Errors raised by the invoker before any remote call is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("method '{method}' not found on contract '{contract}'")]
    MethodNotFound { method: String, contract: String },
    #[error("no contract registered for client type '{client_type}'")]
    UnknownClientType { client_type: String },
    #[error("credential '{subject}' is outside its validity window")]
    CredentialExpired { subject: String },
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error("invalid transport binding: {0}")]
    InvalidBinding(#[from] BindingError),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),
}
