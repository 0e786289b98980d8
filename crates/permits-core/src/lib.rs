//! # permits-core
//!
//! The permit evaluation and conditional execution runtime.
//!
//! This crate provides:
//! - The seam traits (`Ledger`, `Simulator`, `ConditionEvaluator`,
//!   `ReasoningOracle`, `DataSource`, `CredentialSource`, `LeaseStore`)
//! - The context builder
//! - The `Orchestrator` that drives one run over an agent's active permits
//! - `InMemoryLeaseStore` and the credential sources
//!
//! ## Usage
//!
//! ```rust,ignore
//! use permits_core::{Orchestrator, credential::EnvCredential};
//!
//! let orchestrator = Orchestrator::new(ledger, evaluator, Arc::new(EnvCredential::new(agent, "AGENT_PK")));
//! let report = orchestrator.run().await?;
//! ```

pub mod context;
pub mod credential;
pub mod lease;
pub mod orchestrator;
pub mod traits;

pub use context::build_context;
pub use orchestrator::Orchestrator;
