//! The orchestrator: one run over the active permits of one agent.
//!
//! Per run:
//!
//!   Credential → Fetch → for each permit: [Lease] → Context → Evaluate → Decide → Execute | Skip
//!
//! Only the first two stages are fatal. Once the permit list is in hand,
//! every failure is caught at the per-permit boundary, recorded in the
//! `RunReport`, and the loop moves on. `Ledger::execute` has exactly one call
//! site, reachable only after the evaluator returned `Decision::Execute`.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use permits_contracts::{
    error::PermitResult,
    execution::{Disposition, PermitOutcome, RunId, RunReport},
    permit::Permit,
};

use crate::context::build_context;
use crate::traits::{ConditionEvaluator, CredentialSource, Lease, Ledger, LeaseStore};

/// Releases its lease when dropped, including when the run future is
/// cancelled partway through a permit.
struct LeaseGuard {
    store: Arc<dyn LeaseStore>,
    lease: Lease,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.store.release(&self.lease);
    }
}

/// Drives runs for one agent with one evaluation strategy.
///
/// Holds no state between runs. The same orchestrator may be shared across
/// concurrent triggers; configure a `LeaseStore` to keep overlapping runs in
/// this process from double-submitting the same permit.
pub struct Orchestrator {
    ledger: Arc<dyn Ledger>,
    evaluator: Arc<dyn ConditionEvaluator>,
    credentials: Arc<dyn CredentialSource>,
    leases: Option<(Arc<dyn LeaseStore>, Duration)>,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        evaluator: Arc<dyn ConditionEvaluator>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            ledger,
            evaluator,
            credentials,
            leases: None,
        }
    }

    /// Hold a per-permit lease from evaluation through execution.
    pub fn with_leases(mut self, store: Arc<dyn LeaseStore>, ttl: Duration) -> Self {
        self.leases = Some((store, ttl));
        self
    }

    /// Name of the configured evaluation strategy.
    pub fn evaluator_name(&self) -> &'static str {
        self.evaluator.name()
    }

    /// Execute one run.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when the credential cannot be resolved
    /// (`CredentialMissing`) or the permit fetch fails (`LedgerUnavailable`).
    /// In both cases no permit has been evaluated or executed. Per-permit
    /// failures are reported through `RunReport::outcomes`.
    pub async fn run(&self) -> PermitResult<RunReport> {
        let run_id = RunId::new();
        let started_at = Utc::now();

        // ── Credential ───────────────────────────────────────────────────────
        let credential = self.credentials.resolve().inspect_err(|e| {
            error!(run_id = %run_id.0, error = %e, "cannot resolve agent credential, aborting run");
        })?;
        let agent = credential.address;

        // ── Fetch ────────────────────────────────────────────────────────────
        let permits = self
            .ledger
            .fetch_active_permits(&agent)
            .await
            .inspect_err(|e| {
                error!(run_id = %run_id.0, agent = %agent, error = %e, "failed to fetch active permits, aborting run");
            })?;

        info!(
            run_id = %run_id.0,
            agent = %agent,
            evaluator = self.evaluator.name(),
            count = permits.len(),
            "fetched active permits"
        );

        // ── Per-permit loop ──────────────────────────────────────────────────
        //
        // Strictly sequential: the next permit is not touched until the
        // current one has fully resolved.
        let mut outcomes = Vec::with_capacity(permits.len());
        for (index, permit) in permits.iter().enumerate() {
            let disposition = self.process(&run_id, &agent, index, permit).await;
            outcomes.push(PermitOutcome {
                index,
                permit_key: permit.key(),
                owner: permit.owner,
                condition: permit.condition.clone(),
                disposition,
            });
        }

        let report = RunReport {
            run_id,
            agent,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };

        info!(
            run_id = %report.run_id.0,
            executed = report.executed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "run complete"
        );

        Ok(report)
    }

    /// Take one permit through lease, evaluation and execution. Never fails.
    async fn process(&self, run_id: &RunId, agent: &Address, index: usize, permit: &Permit) -> Disposition {
        let key = permit.key();

        let Some(condition) = permit.condition_text() else {
            info!(
                run_id = %run_id.0,
                index,
                permit = %key.short(),
                owner = %permit.owner,
                "skipping permit without condition"
            );
            return Disposition::SkippedNoCondition;
        };

        let _lease = match &self.leases {
            Some((store, ttl)) => match store.try_acquire(&key, *ttl) {
                Some(lease) => Some(LeaseGuard {
                    store: Arc::clone(store),
                    lease,
                }),
                None => {
                    warn!(
                        run_id = %run_id.0,
                        index,
                        permit = %key.short(),
                        owner = %permit.owner,
                        "permit is leased by another run, skipping"
                    );
                    return Disposition::LeaseHeld;
                }
            },
            None => None,
        };

        self.evaluate_and_execute(run_id, agent, index, permit, condition).await
    }

    async fn evaluate_and_execute(
        &self,
        run_id: &RunId,
        agent: &Address,
        index: usize,
        permit: &Permit,
        condition: &str,
    ) -> Disposition {
        // ── Evaluating ───────────────────────────────────────────────────────
        let mut ctx = build_context(permit, Utc::now());
        if ctx.agent != *agent {
            warn!(
                run_id = %run_id.0,
                index,
                permit_agent = %ctx.agent,
                agent = %agent,
                "permit names a different agent, evaluating as the resolved identity"
            );
            // Dry runs must use the identity that will submit.
            ctx.agent = *agent;
        }

        debug!(
            run_id = %run_id.0,
            index,
            evaluator = self.evaluator.name(),
            condition = %condition,
            "evaluating condition"
        );

        let decision = match self.evaluator.evaluate(permit, &ctx).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    run_id = %run_id.0,
                    index,
                    owner = %permit.owner,
                    condition = %condition,
                    error = %e,
                    "condition evaluation failed, skipping permit"
                );
                return Disposition::EvaluationFailed { reason: e.to_string() };
            }
        };

        // ── Deciding ─────────────────────────────────────────────────────────
        if !decision.is_execute() {
            info!(
                run_id = %run_id.0,
                index,
                owner = %permit.owner,
                condition = %condition,
                "condition not met, skipping execution"
            );
            return Disposition::ConditionUnmet;
        }

        // ── Executing ────────────────────────────────────────────────────────
        //
        // The owner and descriptor go to the ledger exactly as read.
        info!(
            run_id = %run_id.0,
            index,
            owner = %permit.owner,
            command = %permit.command_descriptor,
            "executing permit"
        );

        match self
            .ledger
            .execute(&permit.owner, &permit.command_descriptor)
            .await
        {
            Ok(receipt) => {
                info!(
                    run_id = %run_id.0,
                    index,
                    owner = %permit.owner,
                    tx_hash = %receipt.tx_hash,
                    "permit execution submitted"
                );
                Disposition::Executed { receipt }
            }
            Err(e) => {
                warn!(
                    run_id = %run_id.0,
                    index,
                    owner = %permit.owner,
                    condition = %condition,
                    error = %e,
                    "permit execution failed"
                );
                Disposition::ExecutionFailed { reason: e.to_string() }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
