//! Agent configuration: one TOML file plus secrets from the environment.
//!
//! ```toml
//! [agent]
//! address = "0x..."
//! credential_env = "AGENT_PK"
//!
//! [ledger]
//! endpoint = "https://ledger-gateway.example"
//! contract = "0x..."
//!
//! [evaluator]
//! kind = "reasoning-judge"
//! ```
//!
//! Secrets never live in the file. Each section names the environment
//! variable holding its key; the agent credential is re-read on every run.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use serde::Deserialize;
use tracing::info;

use permits_contracts::error::{PermitError, PermitResult};
use permits_core::{
    credential::EnvCredential,
    lease::InMemoryLeaseStore,
    traits::{DataSource, ReasoningOracle, Simulator},
    Orchestrator,
};
use permits_evaluators::{EvaluatorConfig, EvaluatorDeps};
use permits_ledger::HttpLedgerClient;
use permits_oracle::{chat, weather, ChatOracle, RetryConfig, WeatherDataSource};

// ── Sections ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    pub address: Address,
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSection {
    pub endpoint: String,
    pub contract: Address,
    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleSection {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            endpoint: chat::DEFAULT_API_BASE.to_string(),
            model: chat::DEFAULT_MODEL.to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            timeout_secs: chat::DEFAULT_TIMEOUT.as_secs(),
            max_retries: RetryConfig::default().max_retries,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSourceSection {
    pub endpoint: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for DataSourceSection {
    fn default() -> Self {
        Self {
            endpoint: weather::DEFAULT_API_BASE.to_string(),
            api_key_env: "WEATHER_API_KEY".to_string(),
            timeout_secs: weather::DEFAULT_TIMEOUT.as_secs(),
            max_retries: RetryConfig::default().max_retries,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaseSection {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for LeaseSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

fn default_credential_env() -> String {
    "AGENT_PK".to_string()
}

fn default_ledger_timeout() -> u64 {
    30
}

// ── AgentConfig ───────────────────────────────────────────────────────────────

/// The full agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub ledger: LedgerSection,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub oracle: OracleSection,
    #[serde(default)]
    pub data_source: DataSourceSection,
    #[serde(default)]
    pub lease: LeaseSection,
    #[serde(default)]
    pub server: ServerSection,
}

impl AgentConfig {
    pub fn from_toml_str(s: &str) -> PermitResult<Self> {
        toml::from_str(s).map_err(|e| PermitError::ConfigError {
            reason: format!("failed to parse agent config TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> PermitResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PermitError::ConfigError {
            reason: format!("failed to read agent config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Whether the agent credential variable is currently set. Informational:
    /// the credential is resolved again at the start of every run.
    pub fn credential_present(&self) -> bool {
        std::env::var(&self.agent.credential_env).is_ok_and(|v| !v.trim().is_empty())
    }

    /// Wire ledger, evaluator and leases into an `Orchestrator`.
    ///
    /// Fails with `ConfigError` when the selected evaluator needs an API key
    /// whose environment variable is unset. A missing agent credential is
    /// not an error here; it fails each run with `CredentialMissing` instead.
    pub fn build_orchestrator(&self) -> PermitResult<Orchestrator> {
        let credentials = Arc::new(EnvCredential::new(self.agent.address, self.agent.credential_env.clone()));
        let ledger = Arc::new(HttpLedgerClient::new(
            self.ledger.endpoint.clone(),
            self.ledger.contract,
            credentials.clone(),
            Duration::from_secs(self.ledger.timeout_secs),
        )?);

        let kind = self.evaluator.kind;
        let mut deps = EvaluatorDeps::default();

        if kind.needs_oracle() {
            let oracle = ChatOracle::builder()
                .api_key(required_secret(&self.oracle.api_key_env, kind.as_str())?)
                .api_base(self.oracle.endpoint.clone())
                .model(self.oracle.model.clone())
                .timeout(Duration::from_secs(self.oracle.timeout_secs))
                .retry(RetryConfig {
                    max_retries: self.oracle.max_retries,
                    ..RetryConfig::default()
                })
                .build()?;
            deps.oracle = Some(Arc::new(oracle) as Arc<dyn ReasoningOracle>);
        }

        if kind.needs_data_source() {
            let source = WeatherDataSource::new(
                required_secret(&self.data_source.api_key_env, kind.as_str())?,
                Some(self.data_source.endpoint.clone()),
                Duration::from_secs(self.data_source.timeout_secs),
                RetryConfig {
                    max_retries: self.data_source.max_retries,
                    ..RetryConfig::default()
                },
            )?;
            deps.data_source = Some(Arc::new(source) as Arc<dyn DataSource>);
        }

        if kind.needs_simulator() {
            deps.simulator = Some(ledger.clone() as Arc<dyn Simulator>);
        }

        let evaluator = self.evaluator.build(deps)?;
        let mut orchestrator = Orchestrator::new(ledger, evaluator, credentials);
        if self.lease.enabled {
            orchestrator = orchestrator.with_leases(
                Arc::new(InMemoryLeaseStore::new()),
                Duration::from_secs(self.lease.ttl_secs),
            );
        }

        info!(
            agent = %self.agent.address,
            contract = %self.ledger.contract,
            evaluator = %kind,
            leases = self.lease.enabled,
            "orchestrator configured"
        );
        Ok(orchestrator)
    }
}

fn required_secret(env: &str, evaluator: &str) -> PermitResult<String> {
    match std::env::var(env) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PermitError::ConfigError {
            reason: format!("environment variable '{env}' required by evaluator '{evaluator}' is not set"),
        }),
    }
}
