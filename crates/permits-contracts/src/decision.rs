//! Evaluator decisions and the typed reasoning-oracle verdict.
//!
//! The oracle answers in free text. `OracleVerdict::parse` is the only place
//! that text is interpreted: exact match on `"true"` after trimming and
//! lower-casing. Everything else, including `"True."`, `"yes"` and empty
//! replies, fails closed.

use serde::{Deserialize, Serialize};

/// The outcome of evaluating one permit's condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The condition holds; the orchestrator submits the permit's command.
    Execute,
    /// The condition does not hold (or could not be established).
    Skip,
}

impl Decision {
    pub fn is_execute(self) -> bool {
        matches!(self, Decision::Execute)
    }
}

impl From<bool> for Decision {
    fn from(met: bool) -> Self {
        if met {
            Decision::Execute
        } else {
            Decision::Skip
        }
    }
}

impl From<Decision> for bool {
    fn from(decision: Decision) -> Self {
        decision.is_execute()
    }
}

/// A reasoning-oracle reply constrained to three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleVerdict {
    True,
    False,
    /// Anything that is not exactly `true` or `false`.
    Unparseable,
}

impl OracleVerdict {
    /// Interpret a raw oracle reply.
    pub fn parse(reply: &str) -> Self {
        match reply.trim().to_lowercase().as_str() {
            "true" => OracleVerdict::True,
            "false" => OracleVerdict::False,
            _ => OracleVerdict::Unparseable,
        }
    }

    /// Collapse to a decision. Only `True` executes.
    pub fn into_decision(self) -> Decision {
        match self {
            OracleVerdict::True => Decision::Execute,
            OracleVerdict::False | OracleVerdict::Unparseable => Decision::Skip,
        }
    }
}
