//! `POST /services/{service}/operations/{method}`: runs one remote operation.
//!
//! The body is the JSON array of positional parameters
//! (`[{"type": "GetAccountInput", "value": {...}}]`). Query flags:
//! `retry` (defaults per service) and `envelope` (render the XML result
//! document instead of JSON).

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use mint_core::{
    Acknowledged, InvocationRequest, InvocationResult, InvokeError, Param, ResultEnvelopeBuilder,
};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::AppState;
use crate::client::{CallError, ServiceClient};

#[derive(Debug, Default, Deserialize)]
pub struct InvokeQuery {
    pub retry: Option<bool>,
    #[serde(default)]
    pub envelope: bool,
}

/// Requests the facade refuses before (or instead of) invoking.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown service '{service}'")]
    UnknownService { service: String },
    #[error("gateway is shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownService { .. } | Self::Invoke(InvokeError::MethodNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Invoke(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "invocation rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

struct Completed {
    result: InvocationResult<Value>,
    elapsed: Duration,
    /// Unknown when a retried sequence ended in a fault.
    attempts: Option<u32>,
}

pub async fn invoke_handler(
    State(state): State<AppState>,
    Path((service, method)): Path<(String, String)>,
    Query(query): Query<InvokeQuery>,
    Json(params): Json<Vec<Param>>,
) -> Result<Response, ApiError> {
    if !state.shutdown.state().accepts_invocations() {
        return Err(ApiError::ShuttingDown);
    }
    let _guard = state.shutdown.track_invocation();

    let entry = state
        .services
        .get(&service)
        .ok_or(ApiError::UnknownService { service })?;
    let request = InvocationRequest { method, params };

    let completed = if query.retry.unwrap_or(entry.retry_on_ack) {
        with_retry(&entry.client, &request).await?
    } else {
        let attempt = entry.client.invoke_timed::<Value>(request.clone()).await?;
        Completed {
            result: attempt.reply,
            elapsed: attempt.elapsed,
            attempts: Some(1),
        }
    };

    Ok(if query.envelope {
        envelope_response(&request, &completed)
    } else {
        json_response(completed)
    })
}

async fn with_retry(client: &ServiceClient, request: &InvocationRequest) -> Result<Completed, ApiError> {
    match client.invoke_with_retry::<Value>(request).await {
        Ok(outcome) => Ok(Completed {
            result: InvocationResult::Success(outcome.value.reply),
            elapsed: outcome.value.elapsed,
            attempts: Some(outcome.attempts),
        }),
        Err(CallError::Fault { fault, elapsed }) => Ok(Completed {
            result: InvocationResult::Fault(fault),
            elapsed,
            attempts: None,
        }),
        Err(CallError::Invoke(e)) => Err(e.into()),
    }
}

fn envelope_response(request: &InvocationRequest, completed: &Completed) -> Response {
    let envelope = ResultEnvelopeBuilder::build(
        &request.method,
        &completed.result,
        &request.params,
        completed.elapsed,
    );
    (
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        envelope.into_string(),
    )
        .into_response()
}

fn json_response(completed: Completed) -> Response {
    match completed.result {
        InvocationResult::Success(reply) => {
            let body = json!({
                "ack": reply.ack().as_str(),
                "error": reply.error_message(),
                "attempts": completed.attempts,
                "reply": reply,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        InvocationResult::Fault(fault) => {
            let body = json!({
                "error": fault.message(),
                "attempts": completed.attempts,
                "fault": fault,
            });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use mint_core::{Fault, FaultKind};

    use super::*;
    use crate::channel::mock::ScriptedChannelFactory;
    use crate::network::handlers::test_state;

    async fn call(state: AppState, service: &str, method: &str, query: InvokeQuery) -> Response {
        let params = vec![Param::named("GetAccountInput", json!({"Puid": "1234"}))];
        match invoke_handler(
            State(state),
            Path((service.to_string(), method.to_string())),
            Query(query),
            Json(params),
        )
        .await
        {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn successful_call_returns_reply_json() {
        let factory = ScriptedChannelFactory::new(vec![Ok(json!({"Ack": "Success", "AccountID": "A-1"}))]);
        let response = call(test_state(&factory), "account", "GetAccount", InvokeQuery::default()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["ack"], "Success");
        assert_eq!(body["attempts"], 1);
        assert_eq!(body["reply"]["AccountID"], "A-1");
    }

    #[tokio::test]
    async fn given_up_call_surfaces_short_error_message() {
        let factory = ScriptedChannelFactory::new(vec![Ok(json!({
            "Ack": "Failure",
            "Error": {"ErrorShortMessage": "Account locked"}
        }))]);
        let response = call(test_state(&factory), "account", "GetAccount", InvokeQuery::default()).await;

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["ack"], "Failure");
        assert_eq!(body["attempts"], 3);
        assert_eq!(body["error"], "Account locked");
        assert_eq!(factory.call_count(), 3);
    }

    #[tokio::test]
    async fn retry_can_be_disabled_per_request() {
        let factory = ScriptedChannelFactory::new(vec![Ok(json!({"Ack": "Failure"}))]);
        let query = InvokeQuery {
            retry: Some(false),
            envelope: false,
        };
        let response = call(test_state(&factory), "account", "GetAccount", query).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(factory.call_count(), 1);
    }

    #[tokio::test]
    async fn envelope_is_rendered_as_xml() {
        let factory = ScriptedChannelFactory::new(vec![Ok(json!({"Ack": "Success"}))]);
        let query = InvokeQuery {
            retry: None,
            envelope: true,
        };
        let response = call(test_state(&factory), "account", "GetAccount", query).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/xml; charset=utf-8"
        );
        let xml = body_text(response).await;
        assert!(xml.starts_with("<GetAccount>"));
        assert!(xml.contains("<GetAccountInput><GetAccountInput><Puid>1234</Puid></GetAccountInput></GetAccountInput>"));
        assert!(xml.contains("<CallDuration>"));
    }

    #[tokio::test]
    async fn fault_maps_to_bad_gateway() {
        let factory = ScriptedChannelFactory::new(vec![Err(Fault::new(FaultKind::Transport, "connection reset"))]);
        let response = call(test_state(&factory), "account", "GetAccount", InvokeQuery::default()).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "connection reset");
        assert_eq!(body["fault"]["kind"], "transport");
    }

    #[tokio::test]
    async fn unknown_method_and_service_are_not_found() {
        let factory = ScriptedChannelFactory::default();
        let state = test_state(&factory);

        let response = call(state.clone(), "account", "Frobnicate", InvokeQuery::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = call(state, "billing", "GetAccount", InvokeQuery::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn draining_gateway_refuses_new_calls() {
        let factory = ScriptedChannelFactory::default();
        let state = test_state(&factory);
        state.shutdown.begin_drain();

        let response = call(state, "account", "GetAccount", InvokeQuery::default()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn usage_errors_map_to_server_error() {
        let err = ApiError::from(InvokeError::CredentialExpired {
            subject: "CN=partner".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
