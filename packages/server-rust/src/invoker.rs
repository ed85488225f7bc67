//! Name-based dispatch of a remote operation through a fresh channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mint_core::{
    ClientCredential, Fault, FaultKind, InvocationRequest, InvocationResult, InvokeError, Param,
    ServiceEndpointConfig, TransportBindingConfig,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::cert::CertificateResolver;
use crate::channel::ChannelFactory;
use crate::contract::{ContractRegistry, OperationHandler};

/// Invokes operations on remote services by name.
///
/// Checks run in a fixed order, each before any network activity:
/// contract, method, binding, credential. Failures there are returned as
/// [`InvokeError`]. Everything after channel construction is captured as a
/// [`Fault`] inside the returned [`InvocationResult`].
///
/// Each invocation builds and drops its own channel; the invoker holds no
/// per-call state and can be shared freely.
#[derive(Clone)]
pub struct DynamicServiceInvoker {
    contracts: Arc<ContractRegistry>,
    channels: Arc<dyn ChannelFactory>,
    certificates: CertificateResolver,
}

impl DynamicServiceInvoker {
    #[must_use]
    pub fn new(
        contracts: Arc<ContractRegistry>,
        channels: Arc<dyn ChannelFactory>,
        certificates: CertificateResolver,
    ) -> Self {
        Self {
            contracts,
            channels,
            certificates,
        }
    }

    /// Invokes `request.method` on the endpoint's contract and decodes the
    /// reply into `T`.
    ///
    /// The attempt is bounded by the binding's send plus receive timeouts.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::UnknownClientType`] if no contract is registered for
    ///   the endpoint's client type.
    /// - [`InvokeError::MethodNotFound`] if the contract has no such method.
    ///   No channel is created in this case.
    /// - [`InvokeError::InvalidBinding`] for an unusable binding.
    /// - [`InvokeError::CredentialExpired`] or [`InvokeError::Certificate`]
    ///   when the credential is outside its validity window or no longer in
    ///   the store.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        endpoint: &ServiceEndpointConfig,
        binding: &TransportBindingConfig,
        credential: &ClientCredential,
        request: InvocationRequest,
    ) -> Result<InvocationResult<T>, InvokeError> {
        let contract = self
            .contracts
            .get(endpoint.client_type())
            .ok_or_else(|| InvokeError::UnknownClientType {
                client_type: endpoint.client_type().to_string(),
            })?;
        let handler = contract
            .handler(&request.method)
            .cloned()
            .ok_or_else(|| InvokeError::MethodNotFound {
                method: request.method.clone(),
                contract: endpoint.contract_name().to_string(),
            })?;

        binding.validate()?;

        if !credential.is_valid_now() {
            return Err(InvokeError::CredentialExpired {
                subject: credential.subject().to_string(),
            });
        }
        let credential = self.certificates.resolve_thumbprint(credential.thumbprint())?;

        let deadline = binding.attempt_deadline();
        let span = info_span!(
            "invocation",
            call_id = %Uuid::new_v4(),
            contract = endpoint.contract_name(),
            method = %request.method,
            attempt_deadline_ms = millis(deadline),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let contract_name = endpoint.contract_name().to_string();
        let method = request.method;
        async move {
            let start = Instant::now();
            let result = self
                .dispatch(handler, endpoint, binding, &credential, request.params, deadline)
                .await;
            let elapsed = start.elapsed();

            let outcome = match &result {
                InvocationResult::Success(_) => "success",
                InvocationResult::Fault(fault) => fault.kind().as_str(),
            };
            tracing::Span::current().record("duration_ms", millis(elapsed));
            tracing::Span::current().record("outcome", outcome);

            metrics::counter!(
                "mint_invocations_total",
                "contract" => contract_name.clone(),
                "method" => method.clone(),
                "outcome" => outcome
            )
            .increment(1);
            metrics::histogram!(
                "mint_invocation_duration_seconds",
                "contract" => contract_name,
                "method" => method
            )
            .record(elapsed.as_secs_f64());

            if let InvocationResult::Fault(fault) = &result {
                tracing::warn!(kind = %fault.kind(), message = fault.message(), "invocation faulted");
            } else {
                debug!("invocation succeeded");
            }
            Ok(result)
        }
        .instrument(span)
        .await
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        handler: OperationHandler,
        endpoint: &ServiceEndpointConfig,
        binding: &TransportBindingConfig,
        credential: &ClientCredential,
        params: Vec<Param>,
        deadline: Duration,
    ) -> InvocationResult<T> {
        let channel = match self.channels.create(endpoint, binding, credential) {
            Ok(channel) => channel,
            Err(fault) => return InvocationResult::Fault(fault),
        };
        debug!(address = channel.address(), "channel open");

        let reply = match tokio::time::timeout(deadline, handler(channel, params)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(fault)) => return InvocationResult::Fault(fault),
            Err(_) => {
                return InvocationResult::Fault(Fault::new(
                    FaultKind::Timeout,
                    format!("no reply within {}ms", millis(deadline)),
                ))
            }
        };

        match serde_json::from_value::<T>(reply) {
            Ok(value) => InvocationResult::Success(value),
            Err(e) => InvocationResult::Fault(Fault::from_error(FaultKind::Marshal, &e)),
        }
    }
}

impl std::fmt::Debug for DynamicServiceInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicServiceInvoker")
            .field("contracts", &self.contracts.len())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}
