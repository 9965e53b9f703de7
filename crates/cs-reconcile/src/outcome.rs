// outcome.rs: Per-community state machine and the run summary.
//
// Every community starts a run in Pending and must end in a terminal state:
//   Pending → Evaluated → Committed
//   Pending → Skipped                 (no goals)
//   Pending | Evaluated → Failed      (query, validation or write error)
//
// The engine folds the terminal states of all communities into one
// RunSummary, which is what the daemon logs and the CLI prints.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReconcileError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CommunityState {
    /// Dispatched, nothing read yet.
    Pending,

    /// Goals loaded and a verdict reached; the batch has not landed yet.
    Evaluated {
        all_complete: bool,
        prior_streak: u64,
        new_streak: u64,
    },

    /// The streak update and goal resets were committed.
    Committed { streak: u64, goals_reset: usize },

    /// The community has no goals; nothing was written.
    Skipped,

    Failed { reason: String },
}

impl fmt::Display for CommunityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommunityState::Pending => write!(f, "pending"),
            CommunityState::Evaluated { .. } => write!(f, "evaluated"),
            CommunityState::Committed { .. } => write!(f, "committed"),
            CommunityState::Skipped => write!(f, "skipped"),
            CommunityState::Failed { .. } => write!(f, "failed"),
        }
    }
}

impl CommunityState {
    pub fn can_transition_to(&self, next: &CommunityState) -> bool {
        matches!(
            (self, next),
            (CommunityState::Pending, CommunityState::Evaluated { .. })
                | (CommunityState::Pending, CommunityState::Skipped)
                | (CommunityState::Pending, CommunityState::Failed { .. })
                | (CommunityState::Evaluated { .. }, CommunityState::Committed { .. })
                | (CommunityState::Evaluated { .. }, CommunityState::Failed { .. })
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommunityState::Committed { .. }
                | CommunityState::Skipped
                | CommunityState::Failed { .. }
        )
    }
}

/// Tracks one community through a run.
#[derive(Debug, Clone)]
pub struct CommunityRun {
    community_id: String,
    state: CommunityState,
}

impl CommunityRun {
    pub fn new(community_id: impl Into<String>) -> Self {
        Self {
            community_id: community_id.into(),
            state: CommunityState::Pending,
        }
    }

    pub fn community_id(&self) -> &str {
        &self.community_id
    }

    pub fn state(&self) -> &CommunityState {
        &self.state
    }

    pub fn transition(&mut self, next: CommunityState) -> Result<(), ReconcileError> {
        if !self.state.can_transition_to(&next) {
            return Err(ReconcileError::InvalidTransition {
                community_id: self.community_id.clone(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Record a failure. Failing an already-terminal community is a no-op.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = CommunityState::Failed {
                reason: reason.into(),
            };
        }
    }

    pub fn finish(self) -> CommunityOutcome {
        CommunityOutcome {
            community_id: self.community_id,
            state: self.state,
        }
    }
}

/// Terminal state of one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityOutcome {
    pub community_id: String,
    #[serde(flatten)]
    pub state: CommunityState,
}

impl CommunityOutcome {
    pub fn failed(community_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            community_id: community_id.into(),
            state: CommunityState::Failed {
                reason: reason.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCommunity {
    pub community_id: String,
    pub reason: String,
}

/// Aggregate result of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub committed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedCommunity>,
    pub outcomes: Vec<CommunityOutcome>,
}

impl RunSummary {
    /// Fold terminal outcomes into a summary. Outcomes are sorted by
    /// community ID so summaries are stable across runs.
    pub fn from_outcomes(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        mut outcomes: Vec<CommunityOutcome>,
    ) -> Self {
        outcomes.sort_by(|a, b| a.community_id.cmp(&b.community_id));

        let mut committed = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        for outcome in &outcomes {
            match &outcome.state {
                CommunityState::Committed { .. } => committed.push(outcome.community_id.clone()),
                CommunityState::Skipped => skipped.push(outcome.community_id.clone()),
                CommunityState::Failed { reason } => failed.push(FailedCommunity {
                    community_id: outcome.community_id.clone(),
                    reason: reason.clone(),
                }),
                // A non-terminal state here means the task returned early.
                other => failed.push(FailedCommunity {
                    community_id: outcome.community_id.clone(),
                    reason: format!("ended in non-terminal state {}", other),
                }),
            }
        }

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            committed,
            skipped,
            failed,
            outcomes,
        }
    }

    /// True when no community failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn outcome(&self, community_id: &str) -> Option<&CommunityOutcome> {
        self.outcomes.iter().find(|o| o.community_id == community_id)
    }
}
