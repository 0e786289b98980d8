//! In-memory implementation of `LeaseStore`.
//!
//! Leases only exclude runs that share this store, i.e. overlapping triggers
//! in one process. Two processes pointed at the same ledger can still both
//! execute a permit before the ledger's `uses_left` bookkeeping catches up.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use permits_contracts::permit::PermitKey;

use crate::traits::{Lease, LeaseStore};

struct Grant {
    token: u64,
    expires_at: Instant,
}

#[derive(Default)]
struct LeaseState {
    grants: HashMap<PermitKey, Grant>,
    next_token: u64,
}

/// A process-local lease table with TTL expiry.
#[derive(Default)]
pub struct InMemoryLeaseStore {
    state: Mutex<LeaseState>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leases that have not yet expired.
    pub fn live_count(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.grants.values().filter(|g| g.expires_at > now).count()
    }
}

impl LeaseStore for InMemoryLeaseStore {
    fn try_acquire(&self, key: &PermitKey, ttl: Duration) -> Option<Lease> {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(grant) = state.grants.get(key) {
            if grant.expires_at > now {
                debug!(permit = %key.short(), "lease already held");
                return None;
            }
        }

        let token = state.next_token;
        state.next_token += 1;
        state.grants.insert(
            key.clone(),
            Grant {
                token,
                expires_at: now + ttl,
            },
        );

        Some(Lease {
            key: key.clone(),
            token,
        })
    }

    fn release(&self, lease: &Lease) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.grants.get(&lease.key).is_some_and(|g| g.token == lease.token) {
            state.grants.remove(&lease.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PermitKey {
        PermitKey(s.to_string())
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let store = InMemoryLeaseStore::new();
        let ttl = Duration::from_secs(60);

        let lease = store.try_acquire(&key("a"), ttl).expect("first acquire");
        assert!(store.try_acquire(&key("a"), ttl).is_none());
        // Other permits are unaffected.
        assert!(store.try_acquire(&key("b"), ttl).is_some());

        store.release(&lease);
        assert!(store.try_acquire(&key("a"), ttl).is_some());
    }

    #[test]
    fn expired_lease_can_be_reacquired() {
        let store = InMemoryLeaseStore::new();

        let stale = store.try_acquire(&key("a"), Duration::ZERO).unwrap();
        let fresh = store
            .try_acquire(&key("a"), Duration::from_secs(60))
            .expect("expired lease must not block");
        assert_ne!(stale.token, fresh.token);

        // Releasing the stale lease must not drop the fresh holder's grant.
        store.release(&stale);
        assert!(store.try_acquire(&key("a"), Duration::from_secs(60)).is_none());
        assert_eq!(store.live_count(), 1);

        store.release(&fresh);
        assert_eq!(store.live_count(), 0);
    }
}
