//! Transport binding configuration shared by every call to one endpoint.
//!
//! A binding is built once per endpoint and then only read. The defaults are a
//! fixed contract with the remote commerce services and are asserted
//! field-for-field in the tests below.

use std::time::Duration;

use serde::Serialize;

use crate::endpoint::ServiceEndpointConfig;
use crate::error::BindingError;

/// Limits applied while reading a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReaderQuotas {
    /// Maximum nesting depth of the received document.
    pub max_depth: u32,
    /// Maximum length of any single string value, in characters.
    pub max_string_content_length: u32,
    /// Maximum number of elements in any single array.
    pub max_array_length: u32,
    /// Maximum bytes handed to the reader per read.
    pub max_bytes_per_read: u32,
    /// Maximum total characters across distinct element names.
    pub max_name_table_char_count: u32,
}

impl Default for ReaderQuotas {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_string_content_length: 16_384,
            max_array_length: 16_384,
            max_bytes_per_read: 4_096,
            max_name_table_char_count: 16_384,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageEncoding {
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    Utf8,
}

impl TextEncoding {
    #[must_use]
    pub fn charset(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SecurityMode {
    /// Security provided by the transport (TLS) only.
    Transport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClientCredentialType {
    Certificate,
}

/// How the server's certificate is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CertificateValidationMode {
    ChainTrust,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RevocationMode {
    NoCheck,
}

/// Transport-level security settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransportSecurity {
    pub mode: SecurityMode,
    pub client_credential_type: ClientCredentialType,
    pub server_certificate_validation: CertificateValidationMode,
    pub revocation_mode: RevocationMode,
}

impl Default for TransportSecurity {
    fn default() -> Self {
        Self {
            mode: SecurityMode::Transport,
            client_credential_type: ClientCredentialType::Certificate,
            server_certificate_validation: CertificateValidationMode::ChainTrust,
            revocation_mode: RevocationMode::NoCheck,
        }
    }
}

/// Reusable transport configuration for one endpoint.
///
/// Never mutated after construction; share it behind an `Arc` across
/// concurrent calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportBindingConfig {
    pub open_timeout: Duration,
    pub close_timeout: Duration,
    pub receive_timeout: Duration,
    pub send_timeout: Duration,
    /// Maximum size of the buffer pool in bytes.
    pub max_buffer_pool_size: u64,
    /// Maximum size of a received message in bytes.
    pub max_received_message_size: u64,
    pub reader_quotas: ReaderQuotas,
    pub message_encoding: MessageEncoding,
    pub text_encoding: TextEncoding,
    pub bypass_proxy_on_local: bool,
    pub use_default_web_proxy: bool,
    pub allow_cookies: bool,
    pub security: TransportSecurity,
}

impl Default for TransportBindingConfig {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(60),
            close_timeout: Duration::from_secs(60),
            receive_timeout: Duration::from_secs(180),
            send_timeout: Duration::from_secs(180),
            max_buffer_pool_size: 524_288,     // 512 KB
            max_received_message_size: 65_536, // 64 KB
            reader_quotas: ReaderQuotas::default(),
            message_encoding: MessageEncoding::Text,
            text_encoding: TextEncoding::Utf8,
            bypass_proxy_on_local: false,
            use_default_web_proxy: true,
            allow_cookies: false,
            security: TransportSecurity::default(),
        }
    }
}

impl TransportBindingConfig {
    /// Upper bound on a single attempt: sending the request plus receiving
    /// the reply. This is the only cancellation mechanism of an invocation.
    #[must_use]
    pub fn attempt_deadline(&self) -> Duration {
        self.send_timeout + self.receive_timeout
    }

    /// Checks that the binding can be used for dispatch.
    ///
    /// # Errors
    ///
    /// Returns an error for any zero timeout or quota.
    pub fn validate(&self) -> Result<(), BindingError> {
        let timeouts = [
            ("open", self.open_timeout),
            ("close", self.close_timeout),
            ("receive", self.receive_timeout),
            ("send", self.send_timeout),
        ];
        if let Some(&(name, _)) = timeouts.iter().find(|(_, d)| d.is_zero()) {
            return Err(BindingError::ZeroTimeout { name });
        }

        let q = &self.reader_quotas;
        let quotas = [
            ("max_received_message_size", self.max_received_message_size),
            ("max_depth", u64::from(q.max_depth)),
            ("max_string_content_length", u64::from(q.max_string_content_length)),
            ("max_array_length", u64::from(q.max_array_length)),
            ("max_bytes_per_read", u64::from(q.max_bytes_per_read)),
            ("max_name_table_char_count", u64::from(q.max_name_table_char_count)),
        ];
        if let Some(&(name, _)) = quotas.iter().find(|(_, v)| *v == 0) {
            return Err(BindingError::ZeroQuota { name });
        }

        Ok(())
    }
}

/// Builds the binding used for every call to a commerce endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportBindingFactory;

impl TransportBindingFactory {
    /// Produces the binding for `endpoint`. Pure: repeated calls yield equal
    /// configurations.
    #[must_use]
    pub fn build(endpoint: &ServiceEndpointConfig) -> TransportBindingConfig {
        tracing::debug!(
            address = endpoint.address(),
            contract = endpoint.contract_name(),
            "building transport binding"
        );
        TransportBindingConfig::default()
    }
}
