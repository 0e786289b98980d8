//! In-memory implementation of `Ledger` and `Simulator`.
//!
//! `InMemoryLedger` is the reference ledger. It keeps permits and every
//! execute call in a `Vec` behind an `Arc<Mutex<_>>`, enforces the usage
//! bound the real ledger enforces, and can be told to fail. The demo binary
//! and the scenario tests run against it.

use std::sync::{Arc, Mutex};

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use permits_contracts::{
    error::{PermitError, PermitResult},
    execution::{ExecutionReceipt, SimulationOutcome},
    permit::Permit,
};
use permits_core::traits::{Ledger, Simulator};

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct LedgerState {
    pub(crate) permits: Vec<Permit>,
    /// Every execute call, accepted or not, in call order.
    pub(crate) executions: Vec<ExecutionCall>,
    /// Every simulate call, in call order.
    pub(crate) simulations: Vec<ExecutionCall>,
    /// When set, reads fail with `LedgerUnavailable` carrying this reason.
    pub(crate) outage: Option<String>,
    /// Commands the ledger reverts regardless of permit state.
    pub(crate) reverting: Vec<String>,
    pub(crate) tx_count: u64,
}

/// One recorded `execute` or `simulate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionCall {
    pub owner: Address,
    pub command: String,
}

// ── Public ledger ─────────────────────────────────────────────────────────────

/// An in-memory permits ledger.
///
/// Clones share state, so a test can hand one clone to the orchestrator and
/// inspect another.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    pub(crate) state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new(permits: Vec<Permit>) -> Self {
        let ledger = Self::default();
        ledger.lock().permits = permits;
        ledger
    }

    /// Add a permit.
    pub fn grant(&self, permit: Permit) {
        self.lock().permits.push(permit);
    }

    /// Make subsequent reads fail (`Some`) or succeed again (`None`).
    pub fn set_outage(&self, reason: Option<&str>) {
        self.lock().outage = reason.map(str::to_string);
    }

    /// Revert every future execute or simulate of `command`.
    pub fn revert_command(&self, command: impl Into<String>) {
        self.lock().reverting.push(command.into());
    }

    /// Snapshot of every execute call received so far.
    pub fn executions(&self) -> Vec<ExecutionCall> {
        self.lock().executions.clone()
    }

    /// Snapshot of every simulate call received so far.
    pub fn simulations(&self) -> Vec<ExecutionCall> {
        self.lock().simulations.clone()
    }

    /// Snapshot of all permits, active or not.
    pub fn permits(&self) -> Vec<Permit> {
        self.lock().permits.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LedgerState {
    /// Index of the permit that authorizes `command` for `owner`, or the
    /// reason the ledger would refuse it.
    fn authorizing(&self, owner: &Address, command: &str, caller: Option<&Address>) -> Result<usize, String> {
        if self.reverting.iter().any(|c| c == command) {
            return Err("execution reverted".to_string());
        }
        self.permits
            .iter()
            .position(|p| {
                p.active
                    && p.uses_left > 0
                    && p.owner == *owner
                    && p.command_descriptor == command
                    && caller.map_or(true, |c| p.agent == *c)
            })
            .ok_or_else(|| format!("no active permit from {owner} for this command"))
    }
}

// ── Ledger impl ───────────────────────────────────────────────────────────────

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn fetch_active_permits(&self, agent: &Address) -> PermitResult<Vec<Permit>> {
        let state = self.lock();
        if let Some(reason) = &state.outage {
            return Err(PermitError::LedgerUnavailable { reason: reason.clone() });
        }
        Ok(state
            .permits
            .iter()
            .filter(|p| p.active && p.agent == *agent)
            .cloned()
            .collect())
    }

    /// Consume one use of the matching permit. A permit whose last use is
    /// consumed is deactivated.
    async fn execute(&self, owner: &Address, command_descriptor: &str) -> PermitResult<ExecutionReceipt> {
        let mut state = self.lock();
        state.executions.push(ExecutionCall {
            owner: *owner,
            command: command_descriptor.to_string(),
        });

        let idx = state
            .authorizing(owner, command_descriptor, None)
            .map_err(|reason| PermitError::ExecutionRejected { reason })?;

        let now = Utc::now().timestamp().max(0) as u64;
        let permit = &mut state.permits[idx];
        permit.uses_left -= 1;
        permit.last_used_at = now;
        if permit.uses_left == 0 {
            permit.active = false;
        }
        let uses_left = permit.uses_left;

        state.tx_count += 1;
        let receipt = ExecutionReceipt {
            tx_hash: format!("0x{:064x}", state.tx_count),
        };

        info!(owner = %owner, uses_left, tx_hash = %receipt.tx_hash, "in-memory ledger accepted execution");
        Ok(receipt)
    }
}

#[async_trait]
impl Simulator for InMemoryLedger {
    async fn simulate(
        &self,
        account: &Address,
        owner: &Address,
        command_descriptor: &str,
    ) -> PermitResult<SimulationOutcome> {
        let mut state = self.lock();
        state.simulations.push(ExecutionCall {
            owner: *owner,
            command: command_descriptor.to_string(),
        });
        if let Some(reason) = &state.outage {
            return Err(PermitError::evaluation(format!("simulation unavailable: {reason}")));
        }

        Ok(match state.authorizing(owner, command_descriptor, Some(account)) {
            Ok(_) => SimulationOutcome::Accepted,
            Err(reason) => SimulationOutcome::Rejected { reason },
        })
    }
}
