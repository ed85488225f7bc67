//! Per-service client: resolves the credential, invokes, retries and wraps
//! results in envelopes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mint_core::{
    AckCode, Acknowledged, Envelope, Fault, InvocationRequest, InvocationResult, InvokeError,
    ResultEnvelopeBuilder, RetryOutcome, RetryPolicy, RetryingCaller, ServiceEndpointConfig,
    TransportBindingConfig, TransportBindingFactory,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::cert::CertificateResolver;
use crate::invoker::DynamicServiceInvoker;

/// A reply together with the wall-clock time of the attempt that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt<T> {
    pub reply: T,
    pub elapsed: Duration,
}

impl<T: Acknowledged> Acknowledged for Attempt<T> {
    fn ack(&self) -> AckCode {
        self.reply.ack()
    }

    fn error_message(&self) -> Option<&str> {
        self.reply.error_message()
    }
}

/// Why a retried call produced no reply.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),
    /// A fault on some attempt. Faults end the retry sequence at once.
    #[error("{fault}")]
    Fault { fault: Fault, elapsed: Duration },
}

/// Client for one configured service endpoint.
///
/// The binding is built once from the endpoint. The credential is resolved
/// afresh for every invocation so certificate rotation in the store takes
/// effect without a restart.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    name: String,
    endpoint: ServiceEndpointConfig,
    binding: Arc<TransportBindingConfig>,
    certificate_subject: String,
    resolver: CertificateResolver,
    invoker: DynamicServiceInvoker,
    retry: RetryingCaller,
}

impl ServiceClient {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        endpoint: ServiceEndpointConfig,
        certificate_subject: impl Into<String>,
        resolver: CertificateResolver,
        invoker: DynamicServiceInvoker,
        retry: RetryPolicy,
    ) -> Self {
        let binding = Arc::new(TransportBindingFactory::build(&endpoint));
        Self {
            name: name.into(),
            endpoint,
            binding,
            certificate_subject: certificate_subject.into(),
            resolver,
            invoker,
            retry: RetryingCaller::new(retry),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn endpoint(&self) -> &ServiceEndpointConfig {
        &self.endpoint
    }

    #[must_use]
    pub fn binding(&self) -> &TransportBindingConfig {
        &self.binding
    }

    /// One attempt, no retry.
    ///
    /// # Errors
    ///
    /// Certificate resolution and pre-dispatch checks, see
    /// [`DynamicServiceInvoker::invoke`].
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        request: InvocationRequest,
    ) -> Result<InvocationResult<T>, InvokeError> {
        let credential = self.resolver.resolve(&self.certificate_subject)?;
        self.invoker
            .invoke(&self.endpoint, &self.binding, &credential, request)
            .await
    }

    /// One attempt, timed.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceClient::invoke`].
    pub async fn invoke_timed<T: DeserializeOwned>(
        &self,
        request: InvocationRequest,
    ) -> Result<Attempt<InvocationResult<T>>, InvokeError> {
        let start = Instant::now();
        let reply = self.invoke(request).await?;
        Ok(Attempt {
            reply,
            elapsed: start.elapsed(),
        })
    }

    /// Invokes until the reply is acknowledged as successful or the retry
    /// budget is spent. A given-up sequence returns the last reply.
    ///
    /// # Errors
    ///
    /// [`CallError::Invoke`] for usage errors, [`CallError::Fault`] as soon as
    /// any attempt faults.
    pub async fn invoke_with_retry<T>(
        &self,
        request: &InvocationRequest,
    ) -> Result<RetryOutcome<Attempt<T>>, CallError>
    where
        T: DeserializeOwned + Acknowledged,
    {
        let outcome = self
            .retry
            .call(move || async move {
                let attempt = self.invoke_timed::<T>(request.clone()).await?;
                match attempt.reply {
                    InvocationResult::Success(reply) => Ok(Attempt {
                        reply,
                        elapsed: attempt.elapsed,
                    }),
                    InvocationResult::Fault(fault) => Err(CallError::Fault {
                        fault,
                        elapsed: attempt.elapsed,
                    }),
                }
            })
            .await?;

        if outcome.attempts > 1 {
            metrics::counter!("mint_retry_attempts_total", "method" => request.method.clone())
                .increment(u64::from(outcome.attempts - 1));
        }
        Ok(outcome)
    }

    /// One attempt, with the result (or fault) rendered as an envelope.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceClient::invoke`]; faults are rendered, not returned.
    pub async fn invoke_with_envelope<T>(
        &self,
        request: InvocationRequest,
    ) -> Result<(InvocationResult<T>, Envelope), InvokeError>
    where
        T: DeserializeOwned + Serialize,
    {
        let method = request.method.clone();
        let params = request.params.clone();
        let attempt = self.invoke_timed::<T>(request).await?;
        let envelope = ResultEnvelopeBuilder::build(&method, &attempt.reply, &params, attempt.elapsed);
        Ok((attempt.reply, envelope))
    }
}

#[cfg(test)]
mod tests {
    use mint_core::{FaultKind, Param, RetryState};
    use serde_json::{json, Value};

    use super::*;
    use crate::cert::MemoryCertificateStore;
    use crate::channel::mock::ScriptedChannelFactory;
    use crate::contract::{ContractRegistry, ServiceContract};
    use mint_core::ClientCredential;

    fn client(factory: &ScriptedChannelFactory, certs: Vec<ClientCredential>) -> ServiceClient {
        let mut registry = ContractRegistry::new();
        registry.register(
            ServiceContract::new("AccountServiceClient")
                .forwarding("GetAccount")
                .forwarding("CreateAccount"),
        );
        let resolver = CertificateResolver::new(Arc::new(MemoryCertificateStore::new(certs)));
        let invoker = DynamicServiceInvoker::new(Arc::new(registry), Arc::new(factory.clone()), resolver.clone());
        let endpoint = ServiceEndpointConfig::for_service(
            "commerce.example.com",
            "Commerce/Account/AccountWebService.svc",
            "Microsoft.CommerceAccount.Interfaces.IAccountService",
            "AccountServiceClient",
        )
        .unwrap();
        ServiceClient::new("account", endpoint, "SPK_PARTNER", resolver, invoker, RetryPolicy::default())
    }

    fn partner() -> Vec<ClientCredential> {
        vec![ClientCredential::new("CN=SPK_PARTNER, O=Contoso", "01", 0, u64::MAX, Vec::new())]
    }

    fn get_account() -> InvocationRequest {
        InvocationRequest::new("GetAccount").param(Param::named("GetAccountInput", json!({"Puid": "1234"})))
    }

    #[tokio::test]
    async fn get_account_succeeds_in_one_attempt_with_envelope() {
        let factory = ScriptedChannelFactory::new(vec![Ok(json!({"Ack": "Success", "AccountID": "A-1"}))]);
        let client = client(&factory, partner());

        let outcome = client.invoke_with_retry::<Value>(&get_account()).await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.state, RetryState::Success);

        let (result, envelope) = client.invoke_with_envelope::<Value>(get_account()).await.unwrap();
        assert!(result.is_success());
        assert_eq!(envelope.root(), "GetAccount");
        assert!(envelope.has_section("Output"));
        assert!(envelope.has_section("GetAccountInput"));
        assert!(envelope.has_section("CallDuration"));
    }

    #[tokio::test]
    async fn failing_ack_is_retried_then_given_up() {
        let failure = json!({"Ack": "Failure", "Error": {"ErrorShortMessage": "Account locked"}});
        let factory = ScriptedChannelFactory::new(vec![Ok(failure.clone())]);
        let client = client(&factory, partner());

        let outcome = client.invoke_with_retry::<Value>(&get_account()).await.unwrap();

        assert_eq!(outcome.state, RetryState::GivenUp);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.value.reply, failure);
        assert_eq!(outcome.value.error_message(), Some("Account locked"));
        assert_eq!(factory.call_count(), 3);
        assert_eq!(factory.created(), 3);
    }

    #[tokio::test]
    async fn second_attempt_success_stops_retrying() {
        let factory = ScriptedChannelFactory::new(vec![
            Ok(json!({"Ack": "Failure"})),
            Ok(json!({"Ack": "Success"})),
        ]);
        let client = client(&factory, partner());

        let outcome = client.invoke_with_retry::<Value>(&get_account()).await.unwrap();
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.is_success());
        assert_eq!(factory.call_count(), 2);
    }

    #[tokio::test]
    async fn fault_ends_retry_sequence() {
        let factory = ScriptedChannelFactory::new(vec![Err(Fault::new(FaultKind::Transport, "connection reset"))]);
        let client = client(&factory, partner());

        let err = client.invoke_with_retry::<Value>(&get_account()).await.unwrap_err();
        assert!(matches!(err, CallError::Fault { ref fault, .. } if fault.message() == "connection reset"));
        assert_eq!(factory.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_certificate_is_usage_error() {
        let factory = ScriptedChannelFactory::default();
        let client = client(&factory, Vec::new());

        let err = client.invoke::<Value>(get_account()).await.unwrap_err();
        assert!(matches!(err, InvokeError::Certificate(_)));
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn faulted_call_renders_fault_envelope() {
        let fault = Fault::new(FaultKind::Protocol, "Account not found").with_detail("<Code>E100</Code>");
        let factory = ScriptedChannelFactory::new(vec![Err(fault)]);
        let client = client(&factory, partner());

        let (result, envelope) = client.invoke_with_envelope::<Value>(get_account()).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(envelope.root(), "Result");
        assert!(envelope
            .as_str()
            .contains("<FaultMessage>Account not found</FaultMessage><Code>E100</Code>"));
    }
}
