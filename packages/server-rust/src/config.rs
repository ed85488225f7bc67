//! Gateway configuration from command-line flags and `MINT_*` variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mint_core::error::EndpointError;
use mint_core::RetryPolicy;

use crate::catalog;
use crate::cert::{CertificateResolver, CertificateStore, DirectoryCertificateStore};
use crate::channel::ChannelFactory;
use crate::client::ServiceClient;
use crate::invoker::DynamicServiceInvoker;
use crate::network::{NetworkConfig, RegisteredService, ServiceDirectory};
use crate::telemetry::LogFormat;

#[derive(Debug, Clone, Parser)]
#[command(name = "mint-gateway", version, about = "REST gateway to the commerce web services")]
pub struct GatewayConfig {
    /// Bind address of the REST facade.
    #[arg(long, env = "MINT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "MINT_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Host name of the commerce services, e.g. `commerce.example.com`.
    #[arg(long, env = "MINT_SOAP_SERVER")]
    pub soap_server: String,

    /// Subject (or part of it) of the client certificate to present.
    #[arg(long, env = "MINT_CERT_SUBJECT")]
    pub cert_subject: String,

    /// Directory holding `store.json` and the PEM files it lists.
    #[arg(long, env = "MINT_CERT_STORE")]
    pub cert_store: PathBuf,

    /// Retries after an unsuccessful acknowledgement.
    #[arg(long, env = "MINT_MAX_RETRIES", default_value_t = 2)]
    pub max_retries: u32,

    /// Upper bound on one facade request, all attempts included.
    #[arg(long, env = "MINT_REQUEST_TIMEOUT_SECS", default_value_t = 1200)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "MINT_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "MINT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Port for the Prometheus exporter; metrics are off when unset.
    #[arg(long, env = "MINT_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl GatewayConfig {
    #[must_use]
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..NetworkConfig::default()
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }

    #[must_use]
    pub fn certificate_store(&self) -> Arc<dyn CertificateStore> {
        Arc::new(DirectoryCertificateStore::new(&self.cert_store))
    }

    /// One client per catalog entry, sharing a single invoker.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured SOAP host does not yield valid
    /// service addresses.
    pub fn services(
        &self,
        store: Arc<dyn CertificateStore>,
        channels: Arc<dyn ChannelFactory>,
    ) -> Result<ServiceDirectory, EndpointError> {
        let resolver = CertificateResolver::new(store);
        let invoker =
            DynamicServiceInvoker::new(Arc::new(catalog::registry()), channels, resolver.clone());

        catalog::ENTRIES
            .iter()
            .map(|entry| -> Result<_, EndpointError> {
                let client = ServiceClient::new(
                    entry.key,
                    entry.endpoint(&self.soap_server)?,
                    self.cert_subject.clone(),
                    resolver.clone(),
                    invoker.clone(),
                    self.retry_policy(),
                );
                Ok((
                    entry.key.to_string(),
                    RegisteredService {
                        client,
                        retry_on_ack: entry.retry_on_ack,
                    },
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::MemoryCertificateStore;
    use crate::channel::mock::ScriptedChannelFactory;

    fn parse(extra: &[&str]) -> GatewayConfig {
        let mut args = vec![
            "mint-gateway",
            "--soap-server",
            "commerce.example.com",
            "--cert-subject",
            "SPK_PARTNER",
            "--cert-store",
            "/etc/mint/certs",
        ];
        args.extend_from_slice(extra);
        GatewayConfig::try_parse_from(args).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.request_timeout_secs, 1200);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.metrics_port.is_none());
        assert_eq!(config.retry_policy().max_attempts(), 3);
        assert_eq!(config.network().request_timeout, Duration::from_secs(1200));
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--port",
            "9000",
            "--max-retries",
            "0",
            "--log-format",
            "json",
            "--cors-origins",
            "https://a.example.com,https://b.example.com",
            "--metrics-port",
            "9100",
        ]);
        assert_eq!(config.network().port, 9000);
        assert_eq!(config.retry_policy().max_attempts(), 1);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.network().cors_origins.len(), 2);
        assert_eq!(config.metrics_port, Some(9100));
    }

    #[test]
    fn required_settings_are_enforced() {
        assert!(GatewayConfig::try_parse_from(["mint-gateway", "--soap-server", "x"]).is_err());
    }

    #[test]
    fn every_catalog_entry_gets_a_service() {
        let config = parse(&[]);
        let services = config
            .services(
                Arc::new(MemoryCertificateStore::default()),
                Arc::new(ScriptedChannelFactory::default()),
            )
            .unwrap();

        assert_eq!(services.len(), catalog::ENTRIES.len());
        let account = &services["account"];
        assert!(account.retry_on_ack);
        assert_eq!(
            account.client.endpoint().address(),
            "https://commerce.example.com/Commerce/Account/AccountWebService.svc?wsdl"
        );
        assert!(!services["scs"].retry_on_ack);
    }

    #[test]
    fn malformed_soap_host_is_rejected() {
        let config = GatewayConfig::try_parse_from([
            "mint-gateway",
            "--soap-server",
            "",
            "--cert-subject",
            "SPK_PARTNER",
            "--cert-store",
            "/etc/mint/certs",
        ])
        .unwrap();
        let result = config.services(
            Arc::new(MemoryCertificateStore::default()),
            Arc::new(ScriptedChannelFactory::default()),
        );
        assert!(result.is_err());
    }
}
