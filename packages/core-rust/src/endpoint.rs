//! Remote service endpoint addressing.

use serde::{Deserialize, Serialize};
use url::{ParseError, Url};

use crate::error::EndpointError;

/// Address and contract identity of one logical remote service.
///
/// Immutable once constructed. The address is used verbatim as the channel
/// address; the `?wsdl` suffix is never fetched or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpointConfig {
    address: String,
    host: String,
    contract_name: String,
    client_type: String,
}

impl ServiceEndpointConfig {
    /// Creates an endpoint from an explicit address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not parse as a URL, is not
    /// `https`, has no host or carries credentials, or if the contract name
    /// or client type is empty.
    pub fn new(
        address: impl Into<String>,
        contract_name: impl Into<String>,
        client_type: impl Into<String>,
    ) -> Result<Self, EndpointError> {
        let address = address.into();
        let contract_name = contract_name.into();
        let client_type = client_type.into();

        let host = parse_host(&address)?;
        if contract_name.trim().is_empty() {
            return Err(EndpointError::EmptyContract);
        }
        if client_type.trim().is_empty() {
            return Err(EndpointError::EmptyClientType);
        }

        Ok(Self {
            address,
            host,
            contract_name,
            client_type,
        })
    }

    /// Builds the conventional `https://{host}/{service_path}?wsdl` address.
    /// `host` may carry a port.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceEndpointConfig::new`], plus
    /// [`EndpointError::MissingHost`] for a blank host.
    pub fn for_service(
        host: &str,
        service_path: &str,
        contract_name: impl Into<String>,
        client_type: impl Into<String>,
    ) -> Result<Self, EndpointError> {
        let host = host.trim();
        let path = service_path.trim_start_matches('/');
        let address = format!("https://{host}/{path}?wsdl");
        // `https:///path` would parse with `path` as the host.
        if host.is_empty() {
            return Err(EndpointError::MissingHost { address });
        }
        Self::new(address, contract_name, client_type)
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Namespaced logical contract identifier set on every channel.
    #[must_use]
    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    /// Identifier of the client implementation whose operation table serves
    /// this endpoint.
    #[must_use]
    pub fn client_type(&self) -> &str {
        &self.client_type
    }

    /// Host name of the address, without port.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

fn parse_host(address: &str) -> Result<String, EndpointError> {
    let url = Url::parse(address).map_err(|e| match e {
        ParseError::EmptyHost => EndpointError::MissingHost {
            address: address.to_string(),
        },
        other => EndpointError::InvalidAddress {
            address: address.to_string(),
            reason: other.to_string(),
        },
    })?;

    if url.scheme() != "https" {
        return Err(EndpointError::InsecureAddress {
            address: address.to_string(),
        });
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(EndpointError::InvalidAddress {
            address: address.to_string(),
            reason: "credentials are not allowed in the address".to_string(),
        });
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => Err(EndpointError::MissingHost {
            address: address.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_service_builds_wsdl_address() {
        let ep = ServiceEndpointConfig::for_service(
            "vm1box",
            "/Commerce/Account/AccountWebService.svc",
            "Microsoft.CommerceAccount.Interfaces.IAccountService",
            "AccountServiceClient",
        )
        .unwrap();
        assert_eq!(
            ep.address(),
            "https://vm1box/Commerce/Account/AccountWebService.svc?wsdl"
        );
        assert_eq!(ep.host(), "vm1box");
        assert_eq!(
            ep.contract_name(),
            "Microsoft.CommerceAccount.Interfaces.IAccountService"
        );
        assert_eq!(ep.client_type(), "AccountServiceClient");
    }

    #[test]
    fn rejects_plain_http() {
        let err = ServiceEndpointConfig::new("http://host/svc", "IContract", "Client").unwrap_err();
        assert!(matches!(err, EndpointError::InsecureAddress { .. }));
    }

    #[test]
    fn rejects_missing_host() {
        let err = ServiceEndpointConfig::new("https://?wsdl", "IContract", "Client").unwrap_err();
        assert!(matches!(err, EndpointError::MissingHost { .. }));
        let err = ServiceEndpointConfig::for_service(" ", "svc", "IContract", "Client").unwrap_err();
        assert!(matches!(err, EndpointError::MissingHost { .. }));
    }

    #[test]
    fn rejects_unparseable_addresses() {
        for address in [
            "https://host:notaport/svc?wsdl",
            "https://host:99999/svc?wsdl",
            "https://ho\0st/svc?wsdl",
            "https://ho st/svc",
            "vm1box/svc",
        ] {
            let err = ServiceEndpointConfig::new(address, "IContract", "Client").unwrap_err();
            assert!(
                matches!(err, EndpointError::InvalidAddress { .. }),
                "{address:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn for_service_rejects_bad_host() {
        for host in ["user@evil.example:99999", "user@evil.example", "ho\0st", "host:port"] {
            let err = ServiceEndpointConfig::for_service(host, "svc", "IContract", "Client").unwrap_err();
            assert!(
                matches!(err, EndpointError::InvalidAddress { .. }),
                "{host:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_empty_contract_and_client_type() {
        assert_eq!(
            ServiceEndpointConfig::new("https://h/s", " ", "Client").unwrap_err(),
            EndpointError::EmptyContract
        );
        assert_eq!(
            ServiceEndpointConfig::new("https://h/s", "IContract", "").unwrap_err(),
            EndpointError::EmptyClientType
        );
    }

    #[test]
    fn host_excludes_port_and_address_is_kept_verbatim() {
        let ep = ServiceEndpointConfig::for_service("h:8443", "Svc.svc", "C", "T").unwrap();
        assert_eq!(ep.host(), "h");
        assert_eq!(ep.address(), "https://h:8443/Svc.svc?wsdl");
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let ep = ServiceEndpointConfig::new("HTTPS://Vm1Box/svc", "C", "T").unwrap();
        assert_eq!(ep.host(), "vm1box");
    }
}
