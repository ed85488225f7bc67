//! Captured remote-call failures and the tagged invocation result.

use std::fmt;

use serde::Serialize;

/// Where a fault arose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    /// Channel construction or network failure.
    Transport,
    /// The remote answered with a protocol-level fault carrying a detail payload.
    Protocol,
    /// A parameter or reply could not be encoded or decoded.
    Marshal,
    /// The attempt exceeded the binding deadline.
    Timeout,
    /// The reply broke a receive quota.
    Quota,
}

impl FaultKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Marshal => "marshal",
            Self::Timeout => "timeout",
            Self::Quota => "quota",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure captured during channel construction or invocation.
///
/// Faults are returned as values inside [`InvocationResult::Fault`]; they are
/// never retried by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    kind: FaultKind,
    message: String,
    inner_message: Option<String>,
    detail: Option<String>,
}

impl Fault {
    #[must_use]
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            inner_message: None,
            detail: None,
        }
    }

    /// Captures `err`, keeping the message of its immediate source as the
    /// inner message.
    #[must_use]
    pub fn from_error(kind: FaultKind, err: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            kind,
            message: err.to_string(),
            inner_message: err.source().map(ToString::to_string),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_inner(mut self, inner: impl Into<String>) -> Self {
        self.inner_message = Some(inner.into());
        self
    }

    /// Attaches a structured detail payload, kept verbatim.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// The message to report: the inner message when present, otherwise the
    /// outer one.
    #[must_use]
    pub fn message(&self) -> &str {
        self.inner_message.as_deref().unwrap_or(&self.message)
    }

    #[must_use]
    pub fn outer_message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fault: {}", self.kind, self.message())
    }
}

impl std::error::Error for Fault {}

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult<T> {
    Success(T),
    Fault(Fault),
}

impl<T> InvocationResult<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Converts into a `Result`, turning the fault into the error.
    ///
    /// # Errors
    ///
    /// Returns the captured [`Fault`].
    pub fn into_result(self) -> Result<T, Fault> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Fault(fault) => Err(fault),
        }
    }

    #[must_use]
    pub fn as_ref(&self) -> InvocationResult<&T> {
        match self {
            Self::Success(value) => InvocationResult::Success(value),
            Self::Fault(fault) => InvocationResult::Fault(fault.clone()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> InvocationResult<U> {
        match self {
            Self::Success(value) => InvocationResult::Success(f(value)),
            Self::Fault(fault) => InvocationResult::Fault(fault),
        }
    }
}

impl<T> From<Result<T, Fault>> for InvocationResult<T> {
    fn from(result: Result<T, Fault>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(fault) => Self::Fault(fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("channel faulted")]
    struct Outer {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn from_error_prefers_inner_message() {
        let err = Outer {
            inner: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
        };
        let fault = Fault::from_error(FaultKind::Transport, &err);
        assert_eq!(fault.outer_message(), "channel faulted");
        assert_eq!(fault.message(), "connection reset");
        assert_eq!(fault.to_string(), "transport fault: connection reset");
    }

    #[test]
    fn message_without_inner_is_outer() {
        let fault = Fault::new(FaultKind::Timeout, "deadline elapsed");
        assert_eq!(fault.message(), "deadline elapsed");
        assert!(fault.detail().is_none());
    }

    #[test]
    fn detail_is_kept_verbatim() {
        let fault = Fault::new(FaultKind::Protocol, "soap fault")
            .with_detail("<ErrorCode>40001</ErrorCode>");
        assert_eq!(fault.detail(), Some("<ErrorCode>40001</ErrorCode>"));
    }

    #[test]
    fn into_result_and_back() {
        let ok: InvocationResult<u8> = Ok(1).into();
        assert!(ok.is_success());
        assert_eq!(ok.into_result().unwrap(), 1);

        let fault = Fault::new(FaultKind::Transport, "down");
        let err: InvocationResult<u8> = Err(fault.clone()).into();
        assert_eq!(err.into_result().unwrap_err(), fault);
    }

    #[test]
    fn map_preserves_fault() {
        let r: InvocationResult<u8> = InvocationResult::Fault(Fault::new(FaultKind::Marshal, "bad"));
        assert!(matches!(r.map(u32::from), InvocationResult::Fault(f) if f.kind() == FaultKind::Marshal));
    }
}
