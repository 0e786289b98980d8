//! HTTP run trigger.
//!
//! `POST /run` performs one orchestrator run and answers `200` with the
//! `RunReport` as JSON, or `500` with `{"error", "code"}` when the run failed
//! before any permit was processed. `GET /health` is a liveness probe.
//!
//! Each run executes on its own task, so a caller that disconnects or times
//! out does not cut the batch short.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info};

use permits_contracts::{
    error::{PermitError, PermitResult},
    execution::RunReport,
};
use permits_core::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// A failed run as an HTTP response.
pub struct RunError(String);

impl From<PermitError> for RunError {
    fn from(e: PermitError) -> Self {
        RunError(e.to_string())
    }
}

impl IntoResponse for RunError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let body = Json(serde_json::json!({
            "error": self.0,
            "code": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/run", post(trigger_run))
        .route("/health", get(health))
        .with_state(state)
}

async fn trigger_run(State(state): State<AppState>) -> Result<Json<RunReport>, RunError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let report = tokio::spawn(async move { orchestrator.run().await })
        .await
        .map_err(|e| {
            error!(error = %e, "run task aborted");
            RunError(format!("run aborted: {e}"))
        })??;
    Ok(Json(report))
}

async fn health() -> &'static str {
    "ok"
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> PermitResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PermitError::ConfigError {
            reason: format!("failed to bind '{addr}': {e}"),
        })?;
    info!(%addr, evaluator = state.orchestrator.evaluator_name(), "run trigger listening");

    axum::serve(listener, router(state)).await.map_err(|e| {
        error!(error = %e, "server stopped");
        PermitError::ConfigError {
            reason: format!("server error: {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::{Address, U256};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use permits_contracts::{execution::ExecutionReceipt, permit::Permit};
    use permits_core::credential::StaticCredential;
    use permits_core::traits::Ledger;
    use permits_evaluators::AlwaysApprove;
    use permits_ledger::InMemoryLedger;

    use super::*;

    fn agent() -> Address {
        Address::repeat_byte(0xa9)
    }

    fn permit(owner: u8, condition: Option<&str>) -> Permit {
        Permit {
            active: true,
            uses_left: 1,
            time_left: 600,
            input_token: Address::ZERO,
            output_token: Address::ZERO,
            input_amount: U256::from(1u64),
            is_swap: false,
            command_descriptor: format!("cmd-{owner}"),
            condition: condition.map(str::to_string),
            created_at: 1_700_000_000,
            last_used_at: 0,
            owner: Address::repeat_byte(owner),
            agent: agent(),
        }
    }

    /// Delegates to an `InMemoryLedger`, taking `delay` for every execute.
    struct SlowLedger {
        inner: InMemoryLedger,
        delay: Duration,
    }

    #[async_trait]
    impl Ledger for SlowLedger {
        async fn fetch_active_permits(&self, agent: &Address) -> PermitResult<Vec<Permit>> {
            self.inner.fetch_active_permits(agent).await
        }

        async fn execute(&self, owner: &Address, command: &str) -> PermitResult<ExecutionReceipt> {
            tokio::time::sleep(self.delay).await;
            self.inner.execute(owner, command).await
        }
    }

    fn app(ledger: &InMemoryLedger) -> Router {
        app_with(Arc::new(ledger.clone()))
    }

    fn app_with(ledger: Arc<dyn Ledger>) -> Router {
        let orchestrator = Orchestrator::new(
            ledger,
            Arc::new(AlwaysApprove),
            Arc::new(StaticCredential::new(agent(), "agent-secret")),
        );
        router(AppState {
            orchestrator: Arc::new(orchestrator),
        })
    }

    fn run_request() -> Request<Body> {
        Request::builder().method("POST").uri("/run").body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_run_returns_report() {
        let ledger = InMemoryLedger::new(vec![permit(1, Some("go")), permit(2, None)]);

        let response = app(&ledger).oneshot(run_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let report = json_body(response).await;
        let outcomes = report["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0]["disposition"]["kind"], "executed");
        assert_eq!(outcomes[1]["disposition"]["kind"], "skipped_no_condition");
        assert_eq!(ledger.executions().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_500() {
        let ledger = InMemoryLedger::new(vec![permit(1, Some("go"))]);
        ledger.set_outage(Some("rpc down"));

        let response = app(&ledger).oneshot(run_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(response).await;
        assert_eq!(body["code"], 500);
        assert!(body["error"].as_str().unwrap().contains("ledger unavailable"));
        assert!(ledger.executions().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_trigger_finishes_run() {
        let ledger = InMemoryLedger::new(vec![permit(1, Some("go")), permit(2, Some("go"))]);
        let app = app_with(Arc::new(SlowLedger {
            inner: ledger.clone(),
            delay: Duration::from_millis(100),
        }));

        let pending = tokio::time::timeout(Duration::from_millis(50), app.oneshot(run_request())).await;
        assert!(pending.is_err(), "caller should give up before the run ends");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ledger.executions().len(), 2);
    }

    #[tokio::test]
    async fn test_run_requires_post() {
        let ledger = InMemoryLedger::default();
        let request = Request::builder().method("GET").uri("/run").body(Body::empty()).unwrap();

        let response = app(&ledger).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(&InMemoryLedger::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
