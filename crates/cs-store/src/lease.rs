// lease.rs: Expiring lease record used as a run marker.
//
// A reconciliation pass holds the lease for its whole duration. A second
// trigger firing that finds a live lease held by someone else must not run,
// otherwise streaks would be incremented twice for the same tick.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLease {
    pub key: String,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RunLease {
    pub fn new(
        key: impl Into<String>,
        holder: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            holder: holder.into(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_expires_after_ttl() {
        let now = Utc::now();
        let lease = RunLease::new("reconcile", "run-1", now, Duration::seconds(60));
        assert!(!lease.is_expired_at(now));
        assert!(!lease.is_expired_at(now + Duration::seconds(59)));
        assert!(lease.is_expired_at(now + Duration::seconds(60)));
    }
}
