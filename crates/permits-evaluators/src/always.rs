//! The trivial evaluator.

use async_trait::async_trait;

use permits_contracts::{context::EvaluationContext, decision::Decision, error::PermitResult, permit::Permit};
use permits_core::traits::ConditionEvaluator;

/// Approves every permit that reaches it.
///
/// Permits without a condition are still skipped by the orchestrator before
/// any evaluator runs, so this never executes an unconditioned permit.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysApprove;

#[async_trait]
impl ConditionEvaluator for AlwaysApprove {
    fn name(&self) -> &'static str {
        "always-approve"
    }

    async fn evaluate(&self, _permit: &Permit, _ctx: &EvaluationContext) -> PermitResult<Decision> {
        Ok(Decision::Execute)
    }
}
