//! Core trait definitions for the permit execution pipeline.
//!
//! These traits are the seams between the orchestrator and everything it
//! talks to:
//!
//! - `Ledger`             — system of record: permit reads and action submission
//! - `Simulator`          — dry-run of a command against ledger state
//! - `ConditionEvaluator` — pluggable decision strategy (may call out to an oracle)
//! - `ReasoningOracle`    — natural-language decision function (text in, text out)
//! - `DataSource`         — keyed real-world data lookup
//! - `CredentialSource`   — resolves the agent identity at the start of each run
//! - `LeaseStore`         — short-lived per-permit exclusion between overlapping runs
//!
//! Every component is constructed once by the hosting process and injected
//! explicitly; nothing here is a global.

use std::fmt;
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;

use permits_contracts::{
    context::EvaluationContext,
    decision::Decision,
    error::PermitResult,
    execution::{ExecutionReceipt, SimulationOutcome},
    permit::{Permit, PermitKey},
};

/// The ledger holding permits for an agent.
///
/// Only the orchestrator calls `execute`. Evaluators never receive a `Ledger`.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Return the permits the ledger currently flags active for `agent`.
    ///
    /// Order is whatever the ledger returns. Fails with `LedgerUnavailable`
    /// on transport or read failure.
    async fn fetch_active_permits(&self, agent: &Address) -> PermitResult<Vec<Permit>>;

    /// Submit `command_descriptor` on behalf of `owner`.
    ///
    /// Fails with `ExecutionRejected` when the ledger refuses or reverts the
    /// action and `ExecutionTimeout` when it does not answer in time. Success
    /// means the submission was accepted, not that it is final.
    async fn execute(&self, owner: &Address, command_descriptor: &str) -> PermitResult<ExecutionReceipt>;
}

/// Dry-run access to ledger state. Never commits anything.
#[async_trait]
pub trait Simulator: Send + Sync {
    /// Simulate `command_descriptor` for `owner` as if submitted by `account`.
    ///
    /// A revert is `Ok(SimulationOutcome::Rejected)`. `Err` is reserved for
    /// failures to run the simulation at all.
    async fn simulate(
        &self,
        account: &Address,
        owner: &Address,
        command_descriptor: &str,
    ) -> PermitResult<SimulationOutcome>;
}

/// A strategy that decides whether a permit's condition currently holds.
///
/// Implementations must be free of ledger side effects. The orchestrator
/// only calls `evaluate` for permits whose condition is present.
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    /// Short name used in log lines (e.g. `"reasoning-judge"`).
    fn name(&self) -> &'static str;

    /// Decide whether `permit` should be executed now.
    ///
    /// Fails with `EvaluationError`; the orchestrator treats that as a skip.
    async fn evaluate(&self, permit: &Permit, ctx: &EvaluationContext) -> PermitResult<Decision>;
}

/// An external reasoning service mapping a prompt to a text reply.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Send one system + user exchange and return the raw reply text.
    async fn complete(&self, system: &str, user: &str) -> PermitResult<String>;
}

/// A keyed lookup of external real-world data.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, key: &str) -> PermitResult<serde_json::Value>;
}

/// The agent identity plus the secret the ledger client authenticates with.
#[derive(Clone)]
pub struct AgentCredential {
    pub address: Address,
    pub secret: String,
}

impl fmt::Debug for AgentCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCredential")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Resolves the agent credential. Called once per run, before any ledger call.
pub trait CredentialSource: Send + Sync {
    /// Fails with `CredentialMissing` when no usable credential is available.
    fn resolve(&self) -> PermitResult<AgentCredential>;
}

/// Proof of holding the exclusive lease on one permit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub key: PermitKey,
    /// Distinguishes this grant from later grants of the same key.
    pub token: u64,
}

/// Per-permit mutual exclusion for overlapping runs in one process.
///
/// A lease is held from evaluation through execution and released when the
/// permit leaves the loop, or lapses after its TTL.
pub trait LeaseStore: Send + Sync {
    /// Acquire the lease for `key`, or `None` if a live lease exists.
    fn try_acquire(&self, key: &PermitKey, ttl: Duration) -> Option<Lease>;

    /// Release `lease`. A lease that already expired and was re-granted is left alone.
    fn release(&self, lease: &Lease);
}
