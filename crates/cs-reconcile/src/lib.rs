//! # cs-reconcile
//!
//! The weekly reconciliation pass for Community Streaks.
//!
//! Each run walks every community, checks whether all of its goals were
//! completed this cycle, moves the community's streak forward (or back to
//! zero), and resets goal progress for the next cycle. The streak update and
//! the goal resets for one community are committed as a single atomic batch.
//!
//! ## Key components
//!
//! - [`list_community_ids`]: community enumeration
//! - [`evaluate`]: loads a community's goals and computes the completion verdict
//! - [`next_streak`]: the streak transition rule
//! - [`commit`]: builds and applies the per-community atomic batch
//! - [`ReconciliationEngine`]: runs one concurrent task per community under a
//!   run lease and folds the results into a [`RunSummary`]

pub mod committer;
pub mod engine;
pub mod enumerator;
pub mod error;
pub mod evaluator;
pub mod outcome;
pub mod streak;

pub use committer::{build_batch, commit};
pub use engine::{EngineOptions, ReconciliationEngine};
pub use enumerator::{list_communities, list_community_ids};
pub use error::ReconcileError;
pub use evaluator::{all_complete, evaluate, Evaluation};
pub use outcome::{CommunityOutcome, CommunityRun, CommunityState, FailedCommunity, RunSummary};
pub use streak::next_streak;
