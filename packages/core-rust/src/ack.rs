//! Response-level acknowledgement codes.
//!
//! Remote commerce operations report success or a domain-level failure in an
//! `Ack` field that is independent of transport success. The retry loop only
//! ever looks at this field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Acknowledgement reported by a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckCode {
    Success,
    Warning,
    Failure,
    PartialFailure,
}

impl AckCode {
    /// Returns true only for [`AckCode::Success`].
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Parses the wire spelling of an acknowledgement code (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "failure" => Some(Self::Failure),
            "partialfailure" | "partial_failure" => Some(Self::PartialFailure),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Warning => "Warning",
            Self::Failure => "Failure",
            Self::PartialFailure => "PartialFailure",
        }
    }
}

/// A response carrying an acknowledgement code.
pub trait Acknowledged {
    /// The acknowledgement reported by the remote operation.
    fn ack(&self) -> AckCode;

    /// Short error message accompanying an unsuccessful acknowledgement.
    fn error_message(&self) -> Option<&str> {
        None
    }
}

/// Untyped responses read the `Ack` field (or `ack`).
///
/// A document without a recognizable acknowledgement counts as a failure, so
/// the retry loop never mistakes a malformed answer for success.
impl Acknowledged for Value {
    fn ack(&self) -> AckCode {
        self.get("Ack")
            .or_else(|| self.get("ack"))
            .and_then(Value::as_str)
            .and_then(AckCode::parse)
            .unwrap_or(AckCode::Failure)
    }

    fn error_message(&self) -> Option<&str> {
        let error = self.get("Error").or_else(|| self.get("error"))?;
        error
            .get("ErrorShortMessage")
            .or_else(|| error.get("error_short_message"))
            .and_then(Value::as_str)
    }
}
