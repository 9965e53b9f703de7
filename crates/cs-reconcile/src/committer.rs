// committer.rs: Builds and commits the per-community atomic batch.
//
// One batch per community:
//   communities/<id>.streak           = new streak
//   goals/<goal_id>.stepsCompleted    = 0   (for every goal of the community)

use cs_store::{fields, Collection, DocRef, DocumentStore, Goal, WriteBatch};

use crate::error::ReconcileError;

pub fn build_batch(community_id: &str, new_streak: u64, goals: &[Goal]) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.update(
        DocRef::new(Collection::Communities, community_id),
        fields::STREAK,
        new_streak,
    );
    for goal in goals {
        batch.update(
            DocRef::new(Collection::Goals, &goal.id),
            fields::STEPS_COMPLETED,
            0,
        );
    }
    batch
}

/// Commit the streak update and goal resets as one unit. No retry.
pub async fn commit(
    store: &dyn DocumentStore,
    community_id: &str,
    new_streak: u64,
    goals: &[Goal],
) -> Result<(), ReconcileError> {
    let batch = build_batch(community_id, new_streak, goals);
    store
        .commit(batch)
        .await
        .map_err(|source| ReconcileError::StoreWrite {
            community_id: community_id.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_store::{Community, MemoryStore};
    use serde_json::json;

    #[test]
    fn batch_covers_community_and_every_goal() {
        let goals = vec![Goal::new("g1", "c", 5, 5), Goal::new("g2", "c", 5, 3)];
        let batch = build_batch("c", 4, &goals);

        assert_eq!(batch.len(), 3);
        let first = &batch.updates()[0];
        assert_eq!(first.doc, DocRef::new(Collection::Communities, "c"));
        assert_eq!(first.field, "streak");
        assert_eq!(first.value, json!(4));
        for (update, goal) in batch.updates()[1..].iter().zip(&goals) {
            assert_eq!(update.doc, DocRef::new(Collection::Goals, &goal.id));
            assert_eq!(update.field, "stepsCompleted");
            assert_eq!(update.value, json!(0));
        }
    }

    #[tokio::test]
    async fn failed_commit_is_a_write_error() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Communities, Community::new("c", 1).to_document())
            .await;
        store.fail_commits_for("c");

        let err = commit(&store, "c", 2, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::StoreWrite { ref community_id, .. } if community_id == "c"
        ));
    }
}
