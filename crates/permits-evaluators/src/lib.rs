//! # permits-evaluators
//!
//! The `ConditionEvaluator` strategies an agent can run:
//!
//! | kind                   | decides by                                                    |
//! |------------------------|---------------------------------------------------------------|
//! | `always-approve`       | nothing; every conditioned permit executes                    |
//! | `reasoning-judge`      | one oracle call over the condition and the evaluation context |
//! | `execution-simulation` | dry-running the command on the ledger as the agent            |
//! | `derived-context`      | extract key → fetch external data → oracle decision           |
//!
//! The kind is chosen at configuration time through [`EvaluatorConfig`].
//! All oracle replies go through `OracleVerdict::parse`, which only accepts
//! an exact `true`.

pub mod always;
pub mod config;
pub mod judge;
pub mod pipeline;
pub mod simulation;

pub use always::AlwaysApprove;
pub use config::{EvaluatorConfig, EvaluatorDeps, EvaluatorKind, PromptConfig};
pub use judge::ReasoningJudge;
pub use pipeline::{DerivedContextPipeline, PipelinePrompts};
pub use simulation::ExecutionSimulation;

// ── Tests ─────────────────────────────────────────────────────────────────────
