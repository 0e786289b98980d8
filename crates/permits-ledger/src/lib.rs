//! Ledger adapters.
//!
//! - `InMemoryLedger` — reference ledger with real usage bookkeeping
//! - `HttpLedgerClient` — JSON gateway client for the deployed permits contract
//!
//! Both implement `Ledger` and `Simulator` from `permits-core`.

pub mod http;
pub mod memory;

pub use http::HttpLedgerClient;
pub use memory::{ExecutionCall, InMemoryLedger};
