//! Evaluator selection from TOML.
//!
//! ```toml
//! [evaluator]
//! kind = "derived-context"
//!
//! [evaluator.prompts]
//! decision = "Respond with ONLY 'true' or 'false'."
//! ```
//!
//! `EvaluatorConfig::build` turns the selection into an
//! `Arc<dyn ConditionEvaluator>`, checking that the clients the chosen kind
//! needs were supplied.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use permits_contracts::error::{PermitError, PermitResult};
use permits_core::traits::{ConditionEvaluator, DataSource, ReasoningOracle, Simulator};

use crate::{
    always::AlwaysApprove,
    judge::{ReasoningJudge, DEFAULT_JUDGE_PROMPT},
    pipeline::{
        DerivedContextPipeline, PipelinePrompts, DEFAULT_DECISION_PROMPT, DEFAULT_EXTRACTION_PROMPT,
        DEFAULT_KEY_PATTERN,
    },
    simulation::ExecutionSimulation,
};

/// Which evaluator strategy the agent runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluatorKind {
    AlwaysApprove,
    #[default]
    ReasoningJudge,
    ExecutionSimulation,
    DerivedContext,
}

impl EvaluatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EvaluatorKind::AlwaysApprove => "always-approve",
            EvaluatorKind::ReasoningJudge => "reasoning-judge",
            EvaluatorKind::ExecutionSimulation => "execution-simulation",
            EvaluatorKind::DerivedContext => "derived-context",
        }
    }

    pub fn needs_oracle(self) -> bool {
        matches!(self, EvaluatorKind::ReasoningJudge | EvaluatorKind::DerivedContext)
    }

    pub fn needs_data_source(self) -> bool {
        matches!(self, EvaluatorKind::DerivedContext)
    }

    pub fn needs_simulator(self) -> bool {
        matches!(self, EvaluatorKind::ExecutionSimulation)
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prompt overrides. Anything left out keeps its built-in default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// System prompt for `reasoning-judge`.
    pub judge: String,
    /// Key extraction prompt for `derived-context`.
    pub extraction: String,
    /// Final decision prompt for `derived-context`.
    pub decision: String,
    /// Regex the extracted key must match in full.
    pub key_pattern: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            judge: DEFAULT_JUDGE_PROMPT.to_string(),
            extraction: DEFAULT_EXTRACTION_PROMPT.to_string(),
            decision: DEFAULT_DECISION_PROMPT.to_string(),
            key_pattern: DEFAULT_KEY_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default)]
    pub kind: EvaluatorKind,
    #[serde(default)]
    pub prompts: PromptConfig,
}

/// External clients an evaluator may be wired to.
#[derive(Default, Clone)]
pub struct EvaluatorDeps {
    pub oracle: Option<Arc<dyn ReasoningOracle>>,
    pub simulator: Option<Arc<dyn Simulator>>,
    pub data_source: Option<Arc<dyn DataSource>>,
}

fn missing(kind: EvaluatorKind, what: &str) -> PermitError {
    PermitError::ConfigError {
        reason: format!("evaluator '{kind}' requires a {what}, but none is configured"),
    }
}

impl EvaluatorConfig {
    /// Parse an `EvaluatorConfig` document (the body of an `[evaluator]` table).
    pub fn from_toml_str(s: &str) -> PermitResult<Self> {
        toml::from_str(s).map_err(|e| PermitError::ConfigError {
            reason: format!("failed to parse evaluator TOML: {}", e),
        })
    }

    /// Construct the configured evaluator.
    ///
    /// Fails with `ConfigError` when a client the kind needs is absent or the
    /// key pattern does not compile.
    pub fn build(&self, deps: EvaluatorDeps) -> PermitResult<Arc<dyn ConditionEvaluator>> {
        let kind = self.kind;
        let evaluator: Arc<dyn ConditionEvaluator> = match kind {
            EvaluatorKind::AlwaysApprove => Arc::new(AlwaysApprove),
            EvaluatorKind::ReasoningJudge => {
                let oracle = deps.oracle.ok_or_else(|| missing(kind, "reasoning oracle"))?;
                Arc::new(ReasoningJudge::new(oracle).with_system_prompt(self.prompts.judge.clone()))
            }
            EvaluatorKind::ExecutionSimulation => {
                let simulator = deps.simulator.ok_or_else(|| missing(kind, "simulator"))?;
                Arc::new(ExecutionSimulation::new(simulator))
            }
            EvaluatorKind::DerivedContext => {
                let oracle = deps.oracle.ok_or_else(|| missing(kind, "reasoning oracle"))?;
                let source = deps.data_source.ok_or_else(|| missing(kind, "data source"))?;
                Arc::new(DerivedContextPipeline::new(
                    oracle,
                    source,
                    PipelinePrompts {
                        extraction: self.prompts.extraction.clone(),
                        decision: self.prompts.decision.clone(),
                        key_pattern: self.prompts.key_pattern.clone(),
                    },
                )?)
            }
        };
        Ok(evaluator)
    }
}
