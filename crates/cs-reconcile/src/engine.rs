// engine.rs: ReconciliationEngine, one pass over every community.
//
// A run:
//   1. takes the run lease (refuses to start if another run holds it)
//   2. lists communities
//   3. spawns one task per community; each task evaluates, computes the new
//      streak and commits its batch, catching its own errors
//   4. joins every task, whatever its siblings did
//   5. releases the lease and returns the RunSummary
//
// Tasks share nothing but the store handle. Only a failed listing or a held
// lease fails the run as a whole; per-community errors land in the summary.

use std::sync::Arc;

use chrono::{Duration, Utc};
use cs_store::{Community, Document, DocumentStore};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::committer;
use crate::enumerator;
use crate::error::ReconcileError;
use crate::evaluator::{self, Evaluation};
use crate::outcome::{CommunityOutcome, CommunityRun, CommunityState, RunSummary};
use crate::streak::next_streak;

/// Lease key shared by every run against the same store.
pub const DEFAULT_LEASE_KEY: &str = "reconcile";

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub lease_key: String,
    /// How long a lease stays valid if its run never releases it.
    pub lease_ttl: Duration,
    /// Prefix of the per-run lease holder name.
    pub holder: String,
    /// Upper bound on in-flight community tasks. `None` means unbounded.
    pub max_concurrency: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            lease_key: DEFAULT_LEASE_KEY.to_string(),
            lease_ttl: Duration::hours(1),
            holder: "cs-reconcile".to_string(),
            max_concurrency: None,
        }
    }
}

pub struct ReconciliationEngine {
    store: Arc<dyn DocumentStore>,
    options: EngineOptions,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn DocumentStore>, options: EngineOptions) -> Self {
        Self { store, options }
    }

    /// Run one reconciliation pass.
    pub async fn run(&self) -> Result<RunSummary, ReconcileError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let holder = format!("{}-{}", self.options.holder, run_id);
        let key = self.options.lease_key.as_str();

        tracing::info!(%run_id, "starting streak reconciliation run");

        let lease = self
            .store
            .try_acquire_lease(key, &holder, self.options.lease_ttl)
            .await
            .map_err(|source| ReconcileError::Lease {
                key: key.to_string(),
                source,
            })?;
        let Some(lease) = lease else {
            tracing::warn!(%run_id, lease = key, "another run holds the lease, skipping");
            return Err(ReconcileError::LeaseHeld {
                key: key.to_string(),
            });
        };
        tracing::debug!(%run_id, expires_at = %lease.expires_at, "lease acquired");

        let result = self.run_leased(run_id, started_at).await;

        match self.store.release_lease(key, &holder).await {
            Ok(true) => tracing::debug!(%run_id, "lease released"),
            Ok(false) => tracing::warn!(%run_id, "lease expired or taken over before release"),
            Err(e) => tracing::warn!(%run_id, "failed to release lease: {}", e),
        }

        match &result {
            Ok(summary) if summary.is_success() => tracing::info!(
                %run_id,
                committed = summary.committed.len(),
                skipped = summary.skipped.len(),
                "reconciliation run completed successfully"
            ),
            Ok(summary) => tracing::error!(
                %run_id,
                committed = summary.committed.len(),
                skipped = summary.skipped.len(),
                failed = summary.failed.len(),
                "reconciliation run finished with failures"
            ),
            Err(e) => tracing::error!(%run_id, "reconciliation run failed: {}", e),
        }
        result
    }

    async fn run_leased(
        &self,
        run_id: Uuid,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<RunSummary, ReconcileError> {
        let communities = enumerator::list_communities(self.store.as_ref()).await?;
        if communities.is_empty() {
            tracing::info!(%run_id, "no communities found");
            return Ok(RunSummary::from_outcomes(run_id, started_at, Vec::new()));
        }

        let limiter = self
            .options
            .max_concurrency
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));

        let handles: Vec<(String, JoinHandle<CommunityOutcome>)> = communities
            .into_iter()
            .map(|doc| {
                let id = doc.id.clone();
                let store = Arc::clone(&self.store);
                let limiter = limiter.clone();
                let handle = tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(sem) => sem.acquire_owned().await.ok(),
                        None => None,
                    };
                    reconcile_community(store.as_ref(), doc).await
                });
                (id, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (community_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let err = ReconcileError::TaskPanicked {
                        community_id: community_id.clone(),
                        message: e.to_string(),
                    };
                    tracing::error!(community_id = %community_id, "{}", err);
                    CommunityOutcome::failed(community_id, err.to_string())
                }
            };
            outcomes.push(outcome);
        }

        Ok(RunSummary::from_outcomes(run_id, started_at, outcomes))
    }
}

/// Drive one community to a terminal state. Never returns an error; any
/// failure is recorded on the outcome.
pub async fn reconcile_community(store: &dyn DocumentStore, doc: Document) -> CommunityOutcome {
    let mut run = CommunityRun::new(doc.id.clone());
    if let Err(e) = advance(store, &doc, &mut run).await {
        tracing::warn!(
            community_id = %run.community_id(),
            state = %run.state(),
            "community reconciliation failed: {}",
            e
        );
        run.fail(e.to_string());
    }
    run.finish()
}

async fn advance(
    store: &dyn DocumentStore,
    doc: &Document,
    run: &mut CommunityRun,
) -> Result<(), ReconcileError> {
    let community = Community::from_document(doc)?;

    let (goals, all_complete) = match evaluator::evaluate(store, &community.id).await? {
        Evaluation::Skipped => {
            tracing::debug!(community_id = %community.id, "no goals found, skipping");
            return run.transition(CommunityState::Skipped);
        }
        Evaluation::Evaluated {
            goals,
            all_complete,
        } => (goals, all_complete),
    };

    let new_streak = next_streak(community.streak, all_complete);
    run.transition(CommunityState::Evaluated {
        all_complete,
        prior_streak: community.streak,
        new_streak,
    })?;

    committer::commit(store, &community.id, new_streak, &goals).await?;
    run.transition(CommunityState::Committed {
        streak: new_streak,
        goals_reset: goals.len(),
    })?;

    tracing::info!(
        community_id = %community.id,
        prior_streak = community.streak,
        streak = new_streak,
        goals = goals.len(),
        all_complete,
        "updated streak and reset goals"
    );
    Ok(())
}
