//! Service contracts: the operations a client type exposes, keyed by name.
//!
//! A contract is built once at startup and never mutated. Method lookup is a
//! map access, so an unknown method is detected before any channel exists.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mint_core::{Fault, FaultKind, Param};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::channel::Channel;

// ---------------------------------------------------------------------------
// Operation handlers
// ---------------------------------------------------------------------------

pub type OperationFuture = Pin<Box<dyn Future<Output = Result<Value, Fault>> + Send>>;

/// A registered operation: receives the open channel and the positional
/// parameters, yields the raw reply.
pub type OperationHandler = Arc<dyn Fn(Arc<dyn Channel>, Vec<Param>) -> OperationFuture + Send + Sync>;

// ---------------------------------------------------------------------------
// ServiceContract
// ---------------------------------------------------------------------------

/// The operations of one client type.
#[derive(Clone)]
pub struct ServiceContract {
    client_type: String,
    operations: HashMap<String, OperationHandler>,
}

impl ServiceContract {
    #[must_use]
    pub fn new(client_type: impl Into<String>) -> Self {
        Self {
            client_type: client_type.into(),
            operations: HashMap::new(),
        }
    }

    /// Registers an operation handler under `name`, replacing any previous one.
    #[must_use]
    pub fn operation<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<dyn Channel>, Vec<Param>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        let handler: OperationHandler =
            Arc::new(move |channel: Arc<dyn Channel>, params: Vec<Param>| -> OperationFuture {
                Box::pin(handler(channel, params))
            });
        self.operations.insert(name.into(), handler);
        self
    }

    /// Registers an operation that sends its parameters to the remote
    /// operation of the same name unchanged.
    #[must_use]
    pub fn forwarding(self, name: &str) -> Self {
        let remote: Arc<str> = Arc::from(name);
        self.operation(name, move |channel, params| {
            let remote = Arc::clone(&remote);
            async move { channel.call(&remote, &params).await }
        })
    }

    /// Registers an operation with a single typed input and a typed output.
    ///
    /// The first parameter is decoded into `I`; a missing or ill-typed
    /// parameter is a marshalling fault.
    #[must_use]
    pub fn typed<I, O, F, Fut>(self, name: &str, handler: F) -> Self
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + 'static,
        F: Fn(Arc<dyn Channel>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, Fault>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let method = name.to_string();
        self.operation(name, move |channel, params| {
            let handler = Arc::clone(&handler);
            let decoded = decode_first::<I>(&method, &params);
            async move {
                let output = handler(channel, decoded?).await?;
                serde_json::to_value(output).map_err(|e| Fault::from_error(FaultKind::Marshal, &e))
            }
        })
    }

    #[must_use]
    pub fn client_type(&self) -> &str {
        &self.client_type
    }

    #[must_use]
    pub fn handler(&self, name: &str) -> Option<&OperationHandler> {
        self.operations.get(name)
    }

    #[must_use]
    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Operation names in sorted order.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ServiceContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContract")
            .field("client_type", &self.client_type)
            .field("operations", &self.operation_names())
            .finish()
    }
}

fn decode_first<I: DeserializeOwned>(method: &str, params: &[Param]) -> Result<I, Fault> {
    let param = params.first().ok_or_else(|| {
        Fault::new(FaultKind::Marshal, format!("{method} expects one parameter"))
    })?;
    param
        .decode::<I>()
        .map_err(|e| Fault::from_error(FaultKind::Marshal, &e))
}

// ---------------------------------------------------------------------------
// ContractRegistry
// ---------------------------------------------------------------------------

/// All known contracts, keyed by client type.
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    contracts: HashMap<String, Arc<ServiceContract>>,
}

impl ContractRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contract, replacing any earlier one for the same client type.
    pub fn register(&mut self, contract: ServiceContract) {
        self.contracts
            .insert(contract.client_type().to_string(), Arc::new(contract));
    }

    #[must_use]
    pub fn get(&self, client_type: &str) -> Option<Arc<ServiceContract>> {
        self.contracts.get(client_type).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}
