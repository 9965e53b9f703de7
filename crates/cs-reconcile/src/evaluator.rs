// evaluator.rs: Loads a community's goals and decides whether they were all met.

use cs_store::{fields, Collection, DocumentStore, Goal};
use serde_json::Value;

use crate::error::ReconcileError;

/// Result of evaluating one community.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// The community has no goals; nothing to verdict and nothing to write.
    Skipped,
    Evaluated { goals: Vec<Goal>, all_complete: bool },
}

/// True iff every goal has `steps_completed == steps`.
///
/// Callers must not pass an empty slice; an empty community is skipped
/// before a verdict is computed.
pub fn all_complete(goals: &[Goal]) -> bool {
    goals.iter().all(Goal::is_complete)
}

/// Query the goals of `community_id` and compute the verdict.
///
/// Any goal that fails validation fails the whole community, so no
/// partial reset is ever computed from untrusted data.
pub async fn evaluate(
    store: &dyn DocumentStore,
    community_id: &str,
) -> Result<Evaluation, ReconcileError> {
    let docs = store
        .query_eq(
            Collection::Goals,
            fields::COMMUNITY_ID,
            &Value::from(community_id),
        )
        .await
        .map_err(|source| ReconcileError::StoreQuery {
            what: format!("goals of community {}", community_id),
            source,
        })?;

    if docs.is_empty() {
        return Ok(Evaluation::Skipped);
    }

    let goals = docs
        .iter()
        .map(Goal::from_document)
        .collect::<Result<Vec<_>, _>>()?;
    let all_complete = all_complete(&goals);

    Ok(Evaluation::Evaluated {
        goals,
        all_complete,
    })
}
