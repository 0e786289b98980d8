//! Natural-language condition judging through a reasoning oracle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use permits_contracts::{
    context::EvaluationContext,
    decision::{Decision, OracleVerdict},
    error::{PermitError, PermitResult},
    permit::Permit,
};
use permits_core::traits::{ConditionEvaluator, ReasoningOracle};

pub const DEFAULT_JUDGE_PROMPT: &str = "You are evaluating execution conditions for DeFi transactions. \
Respond with only 'true' or 'false' based on whether the condition is met given the context.";

/// Asks the oracle whether the condition holds in the given context.
///
/// The reply must be exactly `true` (after trim and lower-case) to execute.
/// An oracle failure is an `EvaluationError`; the orchestrator records it
/// and moves on.
pub struct ReasoningJudge {
    oracle: Arc<dyn ReasoningOracle>,
    system_prompt: String,
}

impl ReasoningJudge {
    pub fn new(oracle: Arc<dyn ReasoningOracle>) -> Self {
        Self {
            oracle,
            system_prompt: DEFAULT_JUDGE_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

/// The user message: quoted condition followed by the context as JSON.
pub(crate) fn judge_message(condition: &str, ctx: &EvaluationContext) -> PermitResult<String> {
    let context = serde_json::to_string_pretty(ctx)
        .map_err(|e| PermitError::evaluation(format!("failed to serialize context: {e}")))?;
    Ok(format!("Condition: \"{condition}\"\nContext: {context}"))
}

#[async_trait]
impl ConditionEvaluator for ReasoningJudge {
    fn name(&self) -> &'static str {
        "reasoning-judge"
    }

    async fn evaluate(&self, permit: &Permit, ctx: &EvaluationContext) -> PermitResult<Decision> {
        let condition = permit
            .condition_text()
            .ok_or_else(|| PermitError::evaluation("permit has no condition to judge"))?;

        let reply = self
            .oracle
            .complete(&self.system_prompt, &judge_message(condition, ctx)?)
            .await?;

        let verdict = OracleVerdict::parse(&reply);
        if verdict == OracleVerdict::Unparseable {
            warn!(owner = %ctx.owner, %condition, reply = %reply.trim(), "oracle reply is not a boolean, treating as false");
        }
        debug!(owner = %ctx.owner, %condition, ?verdict, "condition judged");
        Ok(verdict.into_decision())
    }
}
