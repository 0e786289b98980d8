//! # permits-contracts
//!
//! Shared types for the permits agent runtime: permits as read from the
//! ledger, the per-permit evaluation context, evaluator decisions, run
//! reports and the unified error type.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and the oracle-verdict parsing rule.

pub mod context;
pub mod decision;
pub mod error;
pub mod execution;
pub mod permit;
