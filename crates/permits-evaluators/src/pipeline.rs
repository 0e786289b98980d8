//! Three-stage evaluation against live external data.
//!
//! 1. **Extract** a lookup key from the condition text via the oracle. The
//!    reply must be a single token matching `key_pattern`.
//! 2. **Fetch** external data for that key from the `DataSource`.
//! 3. **Decide** by asking the oracle again with the condition and the data;
//!    the reply is parsed exactly as `ReasoningJudge` parses it.
//!
//! Unlike the other evaluators this one never returns `Err`: a failure in any
//! stage is logged with the stage name and yields `Decision::Skip`.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use permits_contracts::{
    context::EvaluationContext,
    decision::{Decision, OracleVerdict},
    error::{PermitError, PermitResult},
    permit::Permit,
};
use permits_core::traits::{ConditionEvaluator, DataSource, ReasoningOracle};

pub const DEFAULT_EXTRACTION_PROMPT: &str = "Extract the location from the condition and format it for the \
Tomorrow.io weather API. For US cities use CityName,StateCode,USA (for example NewYork,NY,USA). For \
international cities use the city name only. Never include spaces. Respond with ONLY the formatted location string.";

pub const DEFAULT_DECISION_PROMPT: &str = "Based on the weather data and prompt condition, determine if the \
condition is met. Respond with ONLY 'true' or 'false'.";

/// One token: no whitespace, bounded length, letters in any script plus
/// location-style punctuation.
pub const DEFAULT_KEY_PATTERN: &str = r"^[\p{L}\p{N}][\p{L}\p{N},.'-]{0,127}$";

/// Prompts and the extraction contract for a `DerivedContextPipeline`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePrompts {
    pub extraction: String,
    pub decision: String,
    pub key_pattern: String,
}

impl Default for PipelinePrompts {
    fn default() -> Self {
        Self {
            extraction: DEFAULT_EXTRACTION_PROMPT.to_string(),
            decision: DEFAULT_DECISION_PROMPT.to_string(),
            key_pattern: DEFAULT_KEY_PATTERN.to_string(),
        }
    }
}

struct StageFailure {
    stage: &'static str,
    reason: String,
}

impl StageFailure {
    fn at(stage: &'static str) -> impl FnOnce(PermitError) -> StageFailure {
        move |e| StageFailure {
            stage,
            reason: e.to_string(),
        }
    }
}

pub struct DerivedContextPipeline {
    oracle: Arc<dyn ReasoningOracle>,
    source: Arc<dyn DataSource>,
    extraction_prompt: String,
    decision_prompt: String,
    key_pattern: Regex,
}

impl DerivedContextPipeline {
    /// Fails with `ConfigError` if `prompts.key_pattern` is not a valid regex.
    /// The pattern always has to match the whole reply.
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        source: Arc<dyn DataSource>,
        prompts: PipelinePrompts,
    ) -> PermitResult<Self> {
        let key_pattern = Regex::new(&format!("^(?:{})$", prompts.key_pattern)).map_err(|e| PermitError::ConfigError {
            reason: format!("invalid extraction key pattern '{}': {}", prompts.key_pattern, e),
        })?;
        Ok(Self {
            oracle,
            source,
            extraction_prompt: prompts.extraction,
            decision_prompt: prompts.decision,
            key_pattern,
        })
    }

    async fn run_stages(&self, condition: &str) -> Result<Decision, StageFailure> {
        // ── extract ──
        let reply = self
            .oracle
            .complete(&self.extraction_prompt, condition)
            .await
            .map_err(StageFailure::at("extract"))?;
        let key = reply.trim();
        if !self.key_pattern.is_match(key) {
            return Err(StageFailure {
                stage: "extract",
                reason: format!("extracted key {key:?} is not a single well-formed token"),
            });
        }
        debug!(%key, "extracted lookup key");

        // ── fetch ──
        let data = self.source.fetch(key).await.map_err(StageFailure::at("fetch"))?;

        // ── decide ──
        let message = format!("Condition: \"{condition}\"\nCurrent data: {data}");
        let reply = self
            .oracle
            .complete(&self.decision_prompt, &message)
            .await
            .map_err(StageFailure::at("decide"))?;

        match OracleVerdict::parse(&reply) {
            OracleVerdict::Unparseable => Err(StageFailure {
                stage: "decide",
                reason: format!("reply {:?} is not a boolean", reply.trim()),
            }),
            verdict => Ok(verdict.into_decision()),
        }
    }
}

#[async_trait]
impl ConditionEvaluator for DerivedContextPipeline {
    fn name(&self) -> &'static str {
        "derived-context"
    }

    async fn evaluate(&self, permit: &Permit, ctx: &EvaluationContext) -> PermitResult<Decision> {
        let Some(condition) = permit.condition_text() else {
            return Ok(Decision::Skip);
        };

        match self.run_stages(condition).await {
            Ok(decision) => {
                debug!(owner = %ctx.owner, %condition, ?decision, "pipeline decided");
                Ok(decision)
            }
            Err(StageFailure { stage, reason }) => {
                warn!(owner = %ctx.owner, %condition, stage, error = %reason, "pipeline stage failed, treating as false");
                Ok(Decision::Skip)
            }
        }
    }
}
