//! HTTP handlers and the state they share.

pub mod health;
pub mod invoke;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use invoke::{invoke_handler, ApiError};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::client::ServiceClient;

/// A client exposed through the facade under a route key.
#[derive(Debug, Clone)]
pub struct RegisteredService {
    pub client: ServiceClient,
    /// Default for the `retry` query parameter.
    pub retry_on_ack: bool,
}

/// Route key (e.g. `account`) to service.
pub type ServiceDirectory = HashMap<String, RegisteredService>;

/// Shared state handed to every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<ServiceDirectory>,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Process start, for uptime.
    pub start_time: Instant,
}

#[cfg(test)]
pub(crate) fn test_state(factory: &crate::channel::mock::ScriptedChannelFactory) -> AppState {
    use mint_core::{ClientCredential, RetryPolicy};

    use crate::cert::{CertificateResolver, MemoryCertificateStore};
    use crate::catalog;
    use crate::invoker::DynamicServiceInvoker;

    let store = MemoryCertificateStore::new(vec![ClientCredential::new(
        "CN=SPK_PARTNER, O=Contoso",
        "01",
        0,
        u64::MAX,
        Vec::new(),
    )]);
    let resolver = CertificateResolver::new(Arc::new(store));
    let invoker = DynamicServiceInvoker::new(
        Arc::new(catalog::registry()),
        Arc::new(factory.clone()),
        resolver.clone(),
    );
    let client = ServiceClient::new(
        catalog::ACCOUNT.key,
        catalog::ACCOUNT.endpoint("commerce.example.com").unwrap(),
        "SPK_PARTNER",
        resolver,
        invoker,
        RetryPolicy::default(),
    );

    let mut services = ServiceDirectory::new();
    services.insert(
        catalog::ACCOUNT.key.to_string(),
        RegisteredService {
            client,
            retry_on_ack: catalog::ACCOUNT.retry_on_ack,
        },
    );
    AppState {
        services: Arc::new(services),
        shutdown: Arc::new(ShutdownController::new()),
        config: Arc::new(NetworkConfig::default()),
        start_time: Instant::now(),
    }
}
