//! Run-level results and per-permit outcome records.
//!
//! `RunReport` is what the orchestrator returns after a run whose fetch
//! stage succeeded. It carries one `PermitOutcome` per fetched permit, in
//! ledger order, so callers can inspect what happened without scraping logs.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::permit::PermitKey;

/// Unique identifier for one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// What the ledger hands back for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    /// Ledger transaction reference (e.g. a transaction hash).
    pub tx_hash: String,
}

/// The result of dry-running a command against current ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SimulationOutcome {
    /// The command would succeed if submitted now.
    Accepted,
    /// The ledger would refuse or revert the command.
    Rejected { reason: String },
}

/// How a single permit left the per-permit loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    /// The condition held and the ledger accepted the submission.
    Executed { receipt: ExecutionReceipt },
    /// The permit has no condition; no evaluator was consulted.
    SkippedNoCondition,
    /// The evaluator decided the condition does not hold.
    ConditionUnmet,
    /// The evaluator raised an error. Treated as a skip.
    EvaluationFailed { reason: String },
    /// The condition held but the submission failed.
    ExecutionFailed { reason: String },
    /// Another in-flight run holds the lease for this permit.
    LeaseHeld,
}

impl Disposition {
    pub fn is_executed(&self) -> bool {
        matches!(self, Disposition::Executed { .. })
    }

    /// Failed attempts: evaluator errors and rejected/timed-out submissions.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Disposition::EvaluationFailed { .. } | Disposition::ExecutionFailed { .. }
        )
    }
}

/// The record of one permit within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitOutcome {
    /// Position in the batch the ledger returned.
    pub index: usize,
    pub permit_key: PermitKey,
    pub owner: Address,
    /// The condition text as read from the ledger, if any.
    pub condition: Option<String>,
    pub disposition: Disposition,
}

/// The result of one run that got past the fetch stage.
///
/// A run that produced a report succeeded, however many of its permits were
/// skipped or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    /// The agent identity the permits were fetched for.
    pub agent: Address,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per fetched permit, in ledger order.
    pub outcomes: Vec<PermitOutcome>,
}

impl RunReport {
    pub fn executed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.disposition.is_executed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.disposition.is_failure()).count()
    }

    /// Permits that were neither executed nor failed.
    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.executed() - self.failed()
    }
}
