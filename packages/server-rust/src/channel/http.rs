//! HTTPS channel with mutual TLS, built on `reqwest`.
//!
//! A fresh client is built for every channel: no connection pooling and no
//! cookie store, so nothing leaks between invocations. The server
//! certificate is checked against the platform trust roots; revocation is not
//! checked.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::StatusCode;
use mint_core::binding::ReaderQuotas;
use mint_core::quota::check_message_size;
use mint_core::{
    ClientCredential, Fault, FaultKind, Param, ServiceEndpointConfig, TransportBindingConfig,
};
use serde_json::{json, Value};
use tracing::debug;

use super::{Channel, ChannelFactory};

/// Header naming the contract operation being invoked.
pub const ACTION_HEADER: &str = "SOAPAction";

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpChannelFactory;

impl ChannelFactory for HttpChannelFactory {
    fn create(
        &self,
        endpoint: &ServiceEndpointConfig,
        binding: &TransportBindingConfig,
        credential: &ClientCredential,
    ) -> Result<Arc<dyn Channel>, Fault> {
        let identity = reqwest::Identity::from_pem(credential.pem())
            .map_err(|e| Fault::from_error(FaultKind::Transport, &e))?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .https_only(true)
            .identity(identity)
            .connect_timeout(binding.open_timeout)
            .timeout(binding.attempt_deadline())
            .pool_idle_timeout(binding.close_timeout)
            .pool_max_idle_per_host(0);
        if !binding.use_default_web_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| Fault::from_error(FaultKind::Transport, &e))?;

        debug!(address = endpoint.address(), thumbprint = credential.thumbprint(), "channel created");

        Ok(Arc::new(HttpChannel {
            client,
            address: endpoint.address().to_string(),
            contract: endpoint.contract_name().to_string(),
            binding: binding.clone(),
        }))
    }
}

struct HttpChannel {
    client: reqwest::Client,
    address: String,
    contract: String,
    binding: TransportBindingConfig,
}

#[async_trait]
impl Channel for HttpChannel {
    fn address(&self) -> &str {
        &self.address
    }

    fn contract_name(&self) -> &str {
        &self.contract
    }

    async fn call(&self, operation: &str, params: &[Param]) -> Result<Value, Fault> {
        let body = serde_json::to_vec(&json!({
            "contract": self.contract,
            "operation": operation,
            "parameters": params,
        }))
        .map_err(|e| Fault::from_error(FaultKind::Marshal, &e))?;

        let mut response = self
            .client
            .post(&self.address)
            .header(
                CONTENT_TYPE,
                format!("application/json; charset={}", self.binding.text_encoding.charset()),
            )
            .header(ACTION_HEADER, format!("\"{}/{operation}\"", self.contract))
            .body(body)
            .send()
            .await
            .map_err(|e| transport_fault(&e))?;

        let limit = self.binding.max_received_message_size;
        if let Some(length) = response.content_length() {
            check_message_size(length, limit).map_err(|e| Fault::from_error(FaultKind::Quota, &e))?;
        }

        let status = response.status();
        let mut received = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| transport_fault(&e))? {
            received.extend_from_slice(&chunk);
            check_message_size(received.len() as u64, limit)
                .map_err(|e| Fault::from_error(FaultKind::Quota, &e))?;
        }

        decode_reply(status, &received, &self.binding.reader_quotas)
    }
}

fn transport_fault(err: &reqwest::Error) -> Fault {
    let kind = if err.is_timeout() {
        FaultKind::Timeout
    } else {
        FaultKind::Transport
    };
    Fault::from_error(kind, err)
}

/// Classifies a complete HTTP reply.
///
/// A 500 with a body is a protocol fault carrying the body as its detail.
/// Any other non-success status is a transport fault. A success body must be
/// a JSON document within the reader quotas.
pub(crate) fn decode_reply(
    status: StatusCode,
    body: &[u8],
    quotas: &ReaderQuotas,
) -> Result<Value, Fault> {
    if status == StatusCode::INTERNAL_SERVER_ERROR && !body.is_empty() {
        let detail = String::from_utf8_lossy(body).into_owned();
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|v| {
                ["faultstring", "message", "Message"]
                    .iter()
                    .find_map(|k| v.get(k).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_else(|| "remote service returned a fault".to_string());
        return Err(Fault::new(FaultKind::Protocol, message).with_detail(detail));
    }
    if !status.is_success() {
        return Err(Fault::new(
            FaultKind::Transport,
            format!("unexpected HTTP status {status}"),
        ));
    }

    let doc: Value =
        serde_json::from_slice(body).map_err(|e| Fault::from_error(FaultKind::Marshal, &e))?;
    quotas
        .check(&doc)
        .map_err(|e| Fault::from_error(FaultKind::Quota, &e))?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quotas() -> ReaderQuotas {
        ReaderQuotas::default()
    }

    #[test]
    fn success_body_is_decoded() {
        let reply = decode_reply(StatusCode::OK, br#"{"Ack":"Success"}"#, &quotas()).unwrap();
        assert_eq!(reply["Ack"], "Success");
    }

    #[test]
    fn server_fault_keeps_body_as_detail() {
        let body = br#"{"faultstring":"Account not found","code":"E100"}"#;
        let fault = decode_reply(StatusCode::INTERNAL_SERVER_ERROR, body, &quotas()).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::Protocol);
        assert_eq!(fault.message(), "Account not found");
        assert_eq!(fault.detail(), Some(std::str::from_utf8(body).unwrap()));
    }

    #[test]
    fn server_fault_with_opaque_body_gets_generic_message() {
        let fault =
            decode_reply(StatusCode::INTERNAL_SERVER_ERROR, b"<fault/>", &quotas()).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::Protocol);
        assert_eq!(fault.detail(), Some("<fault/>"));
    }

    #[test]
    fn other_statuses_are_transport_faults() {
        for status in [StatusCode::BAD_GATEWAY, StatusCode::FORBIDDEN, StatusCode::INTERNAL_SERVER_ERROR] {
            let fault = decode_reply(status, b"", &quotas()).unwrap_err();
            assert_eq!(fault.kind(), FaultKind::Transport, "{status}");
        }
    }

    #[test]
    fn malformed_body_is_marshal_fault() {
        let fault = decode_reply(StatusCode::OK, b"not json", &quotas()).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::Marshal);
    }

    #[test]
    fn reply_exceeding_reader_quota_is_rejected() {
        let tight = ReaderQuotas {
            max_depth: 2,
            ..ReaderQuotas::default()
        };
        let fault = decode_reply(StatusCode::OK, br#"{"a":{"b":{"c":1}}}"#, &tight).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::Quota);
    }

    #[test]
    fn unusable_certificate_material_is_transport_fault() {
        let endpoint = ServiceEndpointConfig::for_service(
            "commerce.example.com",
            "Commerce/Account/AccountWebService.svc",
            "IAccountService",
            "AccountServiceClient",
        )
        .unwrap();
        let binding = TransportBindingConfig::default();
        let credential = ClientCredential::new("CN=partner", "00", 0, u64::MAX, b"garbage".to_vec());

        let err = HttpChannelFactory
            .create(&endpoint, &binding, &credential)
            .err()
            .unwrap();
        assert_eq!(err.kind(), FaultKind::Transport);
    }
}
