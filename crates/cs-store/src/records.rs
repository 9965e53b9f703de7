// records.rs: Typed Community and Goal records.
//
// Stored documents are untrusted. `from_document` checks every field the
// reconciliation job relies on and refuses documents that break the
// invariants:
//   communities: streak >= 0
//   goals:       steps > 0, 0 <= stepsCompleted <= steps

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Collection, Document};
use crate::error::RecordError;

/// Stored field names.
pub mod fields {
    pub const STREAK: &str = "streak";
    pub const COMMUNITY_ID: &str = "communityID";
    pub const STEPS: &str = "steps";
    pub const STEPS_COMPLETED: &str = "stepsCompleted";
}

/// A community and its streak counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub streak: u64,
}

impl Community {
    pub fn new(id: impl Into<String>, streak: u64) -> Self {
        Self {
            id: id.into(),
            streak,
        }
    }

    pub fn from_document(doc: &Document) -> Result<Self, RecordError> {
        let streak = require_u64(doc, Collection::Communities, fields::STREAK)?;
        Ok(Self {
            id: doc.id.clone(),
            streak,
        })
    }

    pub fn to_document(&self) -> Document {
        Document::new(&self.id).with_field(fields::STREAK, self.streak)
    }
}

/// A progress target belonging to exactly one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub community_id: String,
    pub steps: u64,
    pub steps_completed: u64,
}

impl Goal {
    pub fn new(
        id: impl Into<String>,
        community_id: impl Into<String>,
        steps: u64,
        steps_completed: u64,
    ) -> Self {
        Self {
            id: id.into(),
            community_id: community_id.into(),
            steps,
            steps_completed,
        }
    }

    /// A goal is complete when every step has been done.
    pub fn is_complete(&self) -> bool {
        self.steps_completed == self.steps
    }

    pub fn from_document(doc: &Document) -> Result<Self, RecordError> {
        let community_id = match doc.get(fields::COMMUNITY_ID) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(invalid(
                    doc,
                    Collection::Goals,
                    fields::COMMUNITY_ID,
                    format!("expected a string, found {}", other),
                ))
            }
            None => return Err(missing(doc, Collection::Goals, fields::COMMUNITY_ID)),
        };

        let steps = require_u64(doc, Collection::Goals, fields::STEPS)?;
        if steps == 0 {
            return Err(invalid(
                doc,
                Collection::Goals,
                fields::STEPS,
                "must be positive".to_string(),
            ));
        }

        let steps_completed = require_u64(doc, Collection::Goals, fields::STEPS_COMPLETED)?;
        if steps_completed > steps {
            return Err(invalid(
                doc,
                Collection::Goals,
                fields::STEPS_COMPLETED,
                format!("{} exceeds steps ({})", steps_completed, steps),
            ));
        }

        Ok(Self {
            id: doc.id.clone(),
            community_id,
            steps,
            steps_completed,
        })
    }

    pub fn to_document(&self) -> Document {
        Document::new(&self.id)
            .with_field(fields::COMMUNITY_ID, self.community_id.as_str())
            .with_field(fields::STEPS, self.steps)
            .with_field(fields::STEPS_COMPLETED, self.steps_completed)
    }
}

/// Read a non-negative integer field.
fn require_u64(
    doc: &Document,
    collection: Collection,
    field: &'static str,
) -> Result<u64, RecordError> {
    let value = doc
        .get(field)
        .ok_or_else(|| missing(doc, collection, field))?;

    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let reason = match value.as_i64() {
        Some(n) => format!("{} is negative", n),
        None => format!("expected a non-negative integer, found {}", value),
    };
    Err(invalid(doc, collection, field, reason))
}

fn missing(doc: &Document, collection: Collection, field: &'static str) -> RecordError {
    RecordError::MissingField {
        collection,
        id: doc.id.clone(),
        field,
    }
}

fn invalid(
    doc: &Document,
    collection: Collection,
    field: &'static str,
    reason: String,
) -> RecordError {
    RecordError::InvalidField {
        collection,
        id: doc.id.clone(),
        field,
        reason,
    }
}
