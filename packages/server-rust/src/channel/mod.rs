//! Communication channels to remote services.
//!
//! A [`ChannelFactory`] turns an endpoint, a binding and a credential into a
//! [`Channel`]. Channels are created per invocation and dropped after it.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use mint_core::{ClientCredential, Fault, Param, ServiceEndpointConfig, TransportBindingConfig};
use serde_json::Value;

pub use http::HttpChannelFactory;

/// An open channel to one remote service contract.
#[async_trait]
pub trait Channel: Send + Sync {
    fn address(&self) -> &str;

    fn contract_name(&self) -> &str;

    /// Sends one operation with its positional parameters and returns the
    /// decoded reply document.
    async fn call(&self, operation: &str, params: &[Param]) -> Result<Value, Fault>;
}

/// Builds channels for an endpoint.
pub trait ChannelFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`Fault`] if the channel cannot be constructed (for example
    /// the credential material is unusable).
    fn create(
        &self,
        endpoint: &ServiceEndpointConfig,
        binding: &TransportBindingConfig,
        credential: &ClientCredential,
    ) -> Result<Arc<dyn Channel>, Fault>;
}
