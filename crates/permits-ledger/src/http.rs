//! `Ledger` and `Simulator` over a JSON ledger gateway.
//!
//! The gateway fronts the on-chain permits contract:
//!
//! | call     | request                                                         |
//! |----------|-----------------------------------------------------------------|
//! | fetch    | `GET  {base}/contracts/{contract}/agents/{agent}/permits`       |
//! | execute  | `POST {base}/contracts/{contract}/execute  {owner, command}`    |
//! | simulate | `POST {base}/contracts/{contract}/simulate {owner, command, account}` |
//!
//! Every request carries the agent secret as a bearer token, resolved from
//! the `CredentialSource` at request time.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use permits_contracts::{
    error::{PermitError, PermitResult},
    execution::{ExecutionReceipt, SimulationOutcome},
    permit::Permit,
};
use permits_core::traits::{CredentialSource, Ledger, Simulator};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CommandRequest<'a> {
    owner: &'a Address,
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<&'a Address>,
}

#[derive(Deserialize)]
struct GatewayError {
    error: String,
}

/// HTTP client for the ledger gateway.
#[derive(Clone)]
pub struct HttpLedgerClient {
    client: reqwest::Client,
    base: String,
    contract: Address,
    credentials: Arc<dyn CredentialSource>,
}

impl std::fmt::Debug for HttpLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLedgerClient")
            .field("base", &self.base)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

impl HttpLedgerClient {
    pub fn new(
        base: impl Into<String>,
        contract: Address,
        credentials: Arc<dyn CredentialSource>,
        timeout: Duration,
    ) -> PermitResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PermitError::ConfigError {
                reason: format!("failed to build ledger HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            contract,
            credentials,
        })
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/contracts/{}/{}", self.base, self.contract, tail)
    }

    fn bearer(&self) -> PermitResult<String> {
        Ok(self.credentials.resolve()?.secret)
    }

    fn command_request(&self, owner: &Address, command: &str, account: Option<&Address>) -> PermitResult<reqwest::RequestBuilder> {
        Ok(self
            .client
            .post(self.url(if account.is_some() { "simulate" } else { "execute" }))
            .bearer_auth(self.bearer()?)
            .json(&CommandRequest { owner, command, account }))
    }
}

/// The gateway's `{"error": ..}` message, or the raw body.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<GatewayError>(&body) {
        Ok(e) => e.error,
        Err(_) if body.trim().is_empty() => format!("gateway returned {status}"),
        Err(_) => body,
    }
}

// ── Ledger impl ───────────────────────────────────────────────────────────────

#[async_trait]
impl Ledger for HttpLedgerClient {
    async fn fetch_active_permits(&self, agent: &Address) -> PermitResult<Vec<Permit>> {
        let url = self.url(&format!("agents/{agent}/permits"));
        debug!(%url, "fetching permits");

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.bearer()?)
            .send()
            .await
            .map_err(|e| PermitError::LedgerUnavailable {
                reason: format!("permit read failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            return Err(PermitError::LedgerUnavailable {
                reason: format!("permit read returned {status}: {message}"),
            });
        }

        let permits: Vec<Permit> = response.json().await.map_err(|e| PermitError::LedgerUnavailable {
            reason: format!("invalid permit payload: {e}"),
        })?;

        // The gateway reports what the contract returns; keep only what is flagged active.
        Ok(permits.into_iter().filter(|p| p.active).collect())
    }

    async fn execute(&self, owner: &Address, command_descriptor: &str) -> PermitResult<ExecutionReceipt> {
        let response = self
            .command_request(owner, command_descriptor, None)?
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PermitError::ExecutionTimeout { reason: e.to_string() }
                } else {
                    PermitError::LedgerUnavailable {
                        reason: format!("execute request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            let reason = error_message(response).await;
            warn!(%owner, %status, %reason, "ledger rejected execution");
            return Err(PermitError::ExecutionRejected { reason });
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(PermitError::LedgerUnavailable {
                reason: format!("execute returned {status}: {message}"),
            });
        }

        response.json().await.map_err(|e| PermitError::LedgerUnavailable {
            reason: format!("invalid execution receipt: {e}"),
        })
    }
}

// ── Simulator impl ────────────────────────────────────────────────────────────

#[async_trait]
impl Simulator for HttpLedgerClient {
    async fn simulate(
        &self,
        account: &Address,
        owner: &Address,
        command_descriptor: &str,
    ) -> PermitResult<SimulationOutcome> {
        let response = self
            .command_request(owner, command_descriptor, Some(account))?
            .send()
            .await
            .map_err(|e| PermitError::evaluation(format!("simulation request failed: {e}")))?;

        match response.status() {
            s if s.is_success() => Ok(SimulationOutcome::Accepted),
            s if s.is_client_error() && s != StatusCode::UNAUTHORIZED && s != StatusCode::FORBIDDEN => {
                Ok(SimulationOutcome::Rejected {
                    reason: error_message(response).await,
                })
            }
            s => {
                let message = error_message(response).await;
                Err(PermitError::evaluation(format!("simulation returned {s}: {message}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use permits_core::credential::StaticCredential;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn contract() -> Address {
        Address::repeat_byte(0xc0)
    }

    fn agent() -> Address {
        Address::repeat_byte(0xa9)
    }

    fn owner() -> Address {
        Address::repeat_byte(0x01)
    }

    fn client(server: &MockServer) -> HttpLedgerClient {
        client_with_timeout(server, DEFAULT_TIMEOUT)
    }

    fn client_with_timeout(server: &MockServer, timeout: Duration) -> HttpLedgerClient {
        let credentials = Arc::new(StaticCredential::new(agent(), "agent-secret"));
        HttpLedgerClient::new(server.uri(), contract(), credentials, timeout).unwrap()
    }

    fn permit(active: bool, command: &str) -> Permit {
        Permit {
            active,
            uses_left: 1,
            time_left: 3_600,
            input_token: Address::ZERO,
            output_token: Address::ZERO,
            input_amount: U256::from(5u64),
            is_swap: true,
            command_descriptor: command.to_string(),
            condition: Some("if it rains".to_string()),
            created_at: 1_700_000_000,
            last_used_at: 0,
            owner: owner(),
            agent: agent(),
        }
    }

    fn permits_path() -> String {
        format!("/contracts/{}/agents/{}/permits", contract(), agent())
    }

    // ── fetch ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_fetch_sends_bearer_and_filters_inactive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(permits_path()))
            .and(header("authorization", "Bearer agent-secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(vec![permit(true, "live"), permit(false, "dead")]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let permits = client(&server).fetch_active_permits(&agent()).await.unwrap();

        assert_eq!(permits.len(), 1);
        assert_eq!(permits[0].command_descriptor, "live");
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_ledger_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(permits_path()))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({"error": "rpc node unreachable"})))
            .mount(&server)
            .await;

        match client(&server).fetch_active_permits(&agent()).await {
            Err(PermitError::LedgerUnavailable { reason }) => {
                assert!(reason.contains("502"));
                assert!(reason.contains("rpc node unreachable"));
            }
            other => panic!("expected LedgerUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_malformed_payload_is_ledger_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(permits_path()))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).fetch_active_permits(&agent()).await.unwrap_err();
        assert!(matches!(err, PermitError::LedgerUnavailable { .. }));
    }

    // ── execute ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_execute_returns_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/contracts/{}/execute", contract())))
            .and(header("authorization", "Bearer agent-secret"))
            .and(body_partial_json(json!({"command": "swap 1 ETH"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"txHash": "0xabc"})))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = client(&server).execute(&owner(), "swap 1 ETH").await.unwrap();
        assert_eq!(receipt.tx_hash, "0xabc");
    }

    #[tokio::test]
    async fn test_execute_client_error_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/contracts/{}/execute", contract())))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": "no uses left"})))
            .mount(&server)
            .await;

        match client(&server).execute(&owner(), "swap").await {
            Err(PermitError::ExecutionRejected { reason }) => assert_eq!(reason, "no uses left"),
            other => panic!("expected ExecutionRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_slow_gateway_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/contracts/{}/execute", contract())))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"txHash": "0xlate"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = client_with_timeout(&server, Duration::from_millis(50))
            .execute(&owner(), "swap")
            .await
            .unwrap_err();
        assert!(matches!(err, PermitError::ExecutionTimeout { .. }), "got {:?}", err);
    }

    // ── simulate ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_simulate_maps_status_to_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/contracts/{}/simulate", contract())))
            .and(body_partial_json(json!({"command": "ok"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/contracts/{}/simulate", contract())))
            .and(body_partial_json(json!({"command": "bad"})))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"error": "insufficient balance"})))
            .mount(&server)
            .await;

        let ledger = client(&server);
        assert_eq!(
            ledger.simulate(&agent(), &owner(), "ok").await.unwrap(),
            SimulationOutcome::Accepted
        );
        assert_eq!(
            ledger.simulate(&agent(), &owner(), "bad").await.unwrap(),
            SimulationOutcome::Rejected {
                reason: "insufficient balance".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_simulate_server_error_is_evaluation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/contracts/{}/simulate", contract())))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).simulate(&agent(), &owner(), "x").await.unwrap_err();
        assert!(matches!(err, PermitError::EvaluationError { .. }));
    }

    #[test]
    fn test_debug_omits_credentials() {
        let credentials = Arc::new(StaticCredential::new(agent(), "agent-secret"));
        let client = HttpLedgerClient::new("http://gw/", contract(), credentials, DEFAULT_TIMEOUT).unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("agent-secret"));
        assert!(rendered.contains("http://gw"));
    }
}
