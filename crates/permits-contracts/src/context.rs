//! The evaluation context handed to condition evaluators.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything an evaluator may consult besides the condition text itself.
///
/// Built fresh for every permit on every run and never persisted. Serialized
/// as camelCase JSON when forwarded to the reasoning oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    /// Wall-clock time of the run (UTC).
    pub timestamp: DateTime<Utc>,
    /// Action category flag copied from the permit.
    pub is_swap: bool,
    pub input_token: Address,
    pub output_token: Address,
    /// Decimal rendering of the permit's input amount.
    pub input_amount: String,
    /// The grantor the action would run for.
    pub owner: Address,
    /// The identity that would submit the action.
    pub agent: Address,
}
