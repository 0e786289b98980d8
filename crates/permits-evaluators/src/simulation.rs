//! Dry-run evaluator: execute only what the ledger would accept right now.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use permits_contracts::{
    context::EvaluationContext,
    decision::Decision,
    error::PermitResult,
    execution::SimulationOutcome,
    permit::Permit,
};
use permits_core::traits::{ConditionEvaluator, Simulator};

/// Simulates the permit's command as the agent identity.
///
/// A rejection is a plain `Skip`, not an error. Only a failure to run the
/// simulation at all propagates as `EvaluationError`.
pub struct ExecutionSimulation {
    simulator: Arc<dyn Simulator>,
}

impl ExecutionSimulation {
    pub fn new(simulator: Arc<dyn Simulator>) -> Self {
        Self { simulator }
    }
}

#[async_trait]
impl ConditionEvaluator for ExecutionSimulation {
    fn name(&self) -> &'static str {
        "execution-simulation"
    }

    async fn evaluate(&self, permit: &Permit, ctx: &EvaluationContext) -> PermitResult<Decision> {
        let outcome = self
            .simulator
            .simulate(&ctx.agent, &ctx.owner, &permit.command_descriptor)
            .await?;

        match outcome {
            SimulationOutcome::Accepted => Ok(Decision::Execute),
            SimulationOutcome::Rejected { reason } => {
                debug!(owner = %ctx.owner, %reason, "simulation rejected");
                Ok(Decision::Skip)
            }
        }
    }
}
