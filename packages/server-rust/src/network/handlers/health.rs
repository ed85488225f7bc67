//! Health endpoints for the gateway.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::network::HealthState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub state: &'static str,
    /// Facade service keys, sorted.
    pub services: Vec<String>,
    /// Invocations currently waiting on a remote service.
    pub running: u64,
    pub uptime_secs: u64,
}

/// Always answers 200; callers read `state` for the verdict.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    let mut services: Vec<String> = state.services.keys().cloned().collect();
    services.sort_unstable();

    Json(HealthReport {
        state: state.shutdown.state().as_str(),
        services,
        running: state.shutdown.running(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 503 until the listener is serving and again once draining begins.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    match state.shutdown.state() {
        HealthState::Ready => StatusCode::OK,
        HealthState::Starting | HealthState::Draining | HealthState::Stopped => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::channel::mock::ScriptedChannelFactory;
    use crate::network::handlers::test_state;
    use crate::network::{NetworkConfig, ServiceDirectory, ShutdownController};

    fn empty_state() -> AppState {
        AppState {
            services: Arc::new(ServiceDirectory::new()),
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(NetworkConfig::default()),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn report_lists_services_and_running_calls() {
        let state = test_state(&ScriptedChannelFactory::default());
        state.shutdown.mark_ready();
        let _call = state.shutdown.track_invocation();

        let report = health_handler(State(state)).await.0;
        assert_eq!(report.state, "ready");
        assert_eq!(report.running, 1);
        assert_eq!(report.services, vec!["account".to_string()]);
    }

    #[tokio::test]
    async fn report_serializes_field_names() {
        let body = serde_json::to_value(health_handler(State(empty_state())).await.0).unwrap();
        assert_eq!(body["state"], "starting");
        assert_eq!(body["services"], serde_json::json!([]));
        assert_eq!(body["running"], 0);
        assert!(body["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn liveness_ignores_lifecycle() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_only_while_serving() {
        let state = empty_state();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::SERVICE_UNAVAILABLE);
        state.shutdown.mark_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);
        state.shutdown.begin_drain();
        assert_eq!(readiness_handler(State(state)).await, StatusCode::SERVICE_UNAVAILABLE);
    }
}
