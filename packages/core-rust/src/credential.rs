//! Client certificates used for transport authentication.

use std::fmt;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CertificateError;

/// `CN=<value>` at the start of the subject or after a comma, up to the next
/// comma or the end of the string.
static CN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|,)\s*CN=([^,]*)").expect("CN pattern is valid")
});

const PEM_CERT_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_CERT_END: &str = "-----END CERTIFICATE-----";

/// A client certificate together with its private key material.
///
/// `Debug` and `Serialize` never expose the PEM material.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ClientCredential {
    subject: String,
    thumbprint: String,
    /// Start of the validity window, unix seconds.
    not_before: u64,
    /// End of the validity window (`NotAfter`), unix seconds.
    not_after: u64,
    #[serde(skip)]
    pem: Vec<u8>,
}

impl ClientCredential {
    /// Creates a credential from already-known metadata.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        thumbprint: impl Into<String>,
        not_before: u64,
        not_after: u64,
        pem: Vec<u8>,
    ) -> Self {
        Self {
            subject: subject.into(),
            thumbprint: thumbprint.into().to_ascii_uppercase(),
            not_before,
            not_after,
            pem,
        }
    }

    /// Creates a credential from PEM material (certificate plus private key),
    /// deriving the thumbprint from the first certificate block.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::InvalidMaterial`] when the PEM holds no
    /// decodable certificate block.
    pub fn from_pem(
        subject: impl Into<String>,
        not_before: u64,
        not_after: u64,
        pem: Vec<u8>,
    ) -> Result<Self, CertificateError> {
        let thumbprint = thumbprint_of_pem(&pem)?;
        Ok(Self::new(subject, thumbprint, not_before, not_after, pem))
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Upper-case hex thumbprint.
    #[must_use]
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    #[must_use]
    pub fn not_before(&self) -> u64 {
        self.not_before
    }

    #[must_use]
    pub fn not_after(&self) -> u64 {
        self.not_after
    }

    /// PEM-encoded certificate chain and private key.
    #[must_use]
    pub fn pem(&self) -> &[u8] {
        &self.pem
    }

    /// The `CN` component of the subject, if any.
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        common_name(&self.subject)
    }

    #[must_use]
    pub fn is_valid_at(&self, unix_secs: u64) -> bool {
        self.not_before <= unix_secs && unix_secs <= self.not_after
    }

    #[must_use]
    pub fn is_valid_now(&self) -> bool {
        self.is_valid_at(unix_now())
    }
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredential")
            .field("subject", &self.subject)
            .field("thumbprint", &self.thumbprint)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .field("pem", &format_args!("<{} bytes>", self.pem.len()))
            .finish()
    }
}

/// Extracts the `CN` component of an X.500 subject string.
///
/// ```
/// use mint_core::credential::common_name;
///
/// assert_eq!(common_name("CN=partner.example.com, O=Contoso"), Some("partner.example.com"));
/// assert_eq!(common_name("O=Contoso, cn=svc-01"), Some("svc-01"));
/// assert_eq!(common_name("O=Contoso"), None);
/// ```
#[must_use]
pub fn common_name(subject: &str) -> Option<&str> {
    CN_RE
        .captures(subject)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|cn| !cn.is_empty())
}

/// True when the subject's `CN` equals `expected`, ignoring case.
#[must_use]
pub fn cn_matches(subject: &str, expected: &str) -> bool {
    common_name(subject).is_some_and(|cn| cn.to_lowercase() == expected.trim().to_lowercase())
}

/// SHA-256 over the DER bytes of the first certificate block, upper-case hex.
///
/// # Errors
///
/// Returns [`CertificateError::InvalidMaterial`] if there is no certificate
/// block or its body is not valid base64.
pub fn thumbprint_of_pem(pem: &[u8]) -> Result<String, CertificateError> {
    let text = std::str::from_utf8(pem).map_err(|_| CertificateError::InvalidMaterial {
        reason: "PEM is not UTF-8".to_string(),
    })?;
    let start = text
        .find(PEM_CERT_BEGIN)
        .ok_or_else(|| CertificateError::InvalidMaterial {
            reason: "no CERTIFICATE block".to_string(),
        })?
        + PEM_CERT_BEGIN.len();
    let len = text[start..]
        .find(PEM_CERT_END)
        .ok_or_else(|| CertificateError::InvalidMaterial {
            reason: "unterminated CERTIFICATE block".to_string(),
        })?;

    let body: String = text[start..start + len]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let der = STANDARD
        .decode(body)
        .map_err(|e| CertificateError::InvalidMaterial {
            reason: format!("CERTIFICATE body is not base64: {e}"),
        })?;

    Ok(hex::encode_upper(Sha256::digest(&der)))
}

/// Current time in unix seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
