//! Permit types as read from the ledger.
//!
//! A `Permit` is a bounded delegation of execution authority from an owner to
//! an agent. The runtime never mutates one; usage and time limits are
//! enforced by the ledger, which is the only source of truth for them.

use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One delegated authorization, exactly as the ledger reports it.
///
/// Field names on the wire follow the ledger's `PermissionDetails` struct
/// (`commandString`, `prompt`, camelCase elsewhere).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit {
    /// Ledger-side validity flag.
    pub active: bool,
    /// Remaining authorized executions.
    pub uses_left: u32,
    /// Remaining validity window in seconds.
    pub time_left: u64,
    /// Asset spent by the action, if any.
    pub input_token: Address,
    /// Asset received by the action, if any.
    pub output_token: Address,
    /// Magnitude of the authorized action.
    pub input_amount: U256,
    /// Whether the action is a swap.
    pub is_swap: bool,
    /// The exact action to submit if the condition holds. Opaque to the runtime.
    #[serde(rename = "commandString")]
    pub command_descriptor: String,
    /// Human-readable gating condition. Absent or blank means "never auto-execute".
    #[serde(rename = "prompt", default)]
    pub condition: Option<String>,
    /// Ledger timestamp (unix seconds) of creation.
    pub created_at: u64,
    /// Ledger timestamp (unix seconds) of the last successful execution.
    pub last_used_at: u64,
    /// The grantor.
    pub owner: Address,
    /// The grantee allowed to execute on the owner's behalf.
    pub agent: Address,
}

impl Permit {
    /// The condition text, trimmed, or `None` when it is absent or blank.
    ///
    /// A permit without a condition carries no automated decision authority
    /// and must never reach an evaluator.
    pub fn condition_text(&self) -> Option<&str> {
        self.condition
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Stable identity for this permit, derived from fields the ledger never
    /// changes after creation.
    pub fn key(&self) -> PermitKey {
        PermitKey::derive(
            &self.owner,
            &self.agent,
            self.created_at,
            &self.command_descriptor,
        )
    }
}

/// SHA-256 (lowercase hex) identity of a permit.
///
/// The ledger read does not return permit IDs, so the runtime derives one
/// from `(owner, agent, created_at, command_descriptor)`. Used for leases and
/// run reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermitKey(pub String);

impl PermitKey {
    /// Hash input layout: owner (20 bytes), agent (20 bytes),
    /// created_at (8 bytes little-endian), command descriptor as UTF-8.
    pub fn derive(owner: &Address, agent: &Address, created_at: u64, command: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(owner.as_slice());
        hasher.update(agent.as_slice());
        hasher.update(created_at.to_le_bytes());
        hasher.update(command.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for PermitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
