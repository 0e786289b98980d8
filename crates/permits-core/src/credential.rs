//! `CredentialSource` implementations.

use alloy_primitives::Address;

use permits_contracts::error::{PermitError, PermitResult};

use crate::traits::{AgentCredential, CredentialSource};

/// Reads the agent secret from an environment variable on every run.
///
/// Re-reading per run means a rotated or removed credential takes effect on
/// the next trigger without a restart.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    address: Address,
    secret_env: String,
}

impl EnvCredential {
    pub fn new(address: Address, secret_env: impl Into<String>) -> Self {
        Self {
            address,
            secret_env: secret_env.into(),
        }
    }
}

impl CredentialSource for EnvCredential {
    fn resolve(&self) -> PermitResult<AgentCredential> {
        match std::env::var(&self.secret_env) {
            Ok(secret) if !secret.trim().is_empty() => Ok(AgentCredential {
                address: self.address,
                secret,
            }),
            _ => Err(PermitError::CredentialMissing {
                reason: format!("environment variable '{}' is not set", self.secret_env),
            }),
        }
    }
}

/// A fixed credential, for tests and embedded use.
#[derive(Debug, Clone)]
pub struct StaticCredential(pub AgentCredential);

impl StaticCredential {
    pub fn new(address: Address, secret: impl Into<String>) -> Self {
        Self(AgentCredential {
            address,
            secret: secret.into(),
        })
    }
}

impl CredentialSource for StaticCredential {
    fn resolve(&self) -> PermitResult<AgentCredential> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_credential_missing_variable() {
        let source = EnvCredential::new(Address::ZERO, "PERMITS_TEST_SURELY_UNSET_VAR");
        match source.resolve() {
            Err(PermitError::CredentialMissing { reason }) => {
                assert!(reason.contains("PERMITS_TEST_SURELY_UNSET_VAR"));
            }
            other => panic!("expected CredentialMissing, got {:?}", other),
        }
    }

    #[test]
    fn credential_debug_redacts_secret() {
        let cred = StaticCredential::new(Address::repeat_byte(0x11), "super-secret-key")
            .resolve()
            .unwrap();
        let rendered = format!("{:?}", cred);
        assert!(!rendered.contains("super-secret-key"));
        assert!(rendered.contains("REDACTED"));
    }
}
