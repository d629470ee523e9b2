use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keyloom_common::{query_fingerprint, SourceTag};

/// What happened on one gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    CacheHit,
    Success,
    /// A retryable failure that the backoff loop will try again.
    Retry { attempt: u32 },
    Failure { kind: String },
}

/// One immutable line of the audit trail. Queries appear only as
/// fingerprints so sensitive seed terms never leak into logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub source: SourceTag,
    pub query_fingerprint: String,
    pub outcome: CallOutcome,
    pub duration: Duration,
    pub quota_delta: u64,
    pub at: DateTime<Utc>,
}

/// Append-only audit trail for a gateway instance.
#[derive(Default)]
pub struct AuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &self,
        source: SourceTag,
        query: &str,
        outcome: CallOutcome,
        duration: Duration,
        quota_delta: u64,
    ) {
        let record = AuditRecord {
            source,
            query_fingerprint: query_fingerprint(query),
            outcome,
            duration,
            quota_delta,
            at: Utc::now(),
        };
        self.records.lock().expect("audit lock poisoned").push(record);
    }

    /// Snapshot of the trail so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("audit lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_carry_fingerprints_not_queries() {
        let log = AuditLog::new();
        log.append(
            SourceTag::Serp,
            "secret product keyword",
            CallOutcome::Success,
            Duration::from_millis(120),
            1,
        );

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].query_fingerprint.contains("secret"));
        assert_eq!(records[0].quota_delta, 1);
    }

    #[test]
    fn append_preserves_order() {
        let log = AuditLog::new();
        log.append(SourceTag::Serp, "a", CallOutcome::CacheHit, Duration::ZERO, 0);
        log.append(
            SourceTag::Serp,
            "a",
            CallOutcome::Retry { attempt: 1 },
            Duration::from_millis(5),
            1,
        );
        log.append(SourceTag::Serp, "a", CallOutcome::Success, Duration::from_millis(9), 1);

        let outcomes: Vec<_> = log.records().into_iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                CallOutcome::CacheHit,
                CallOutcome::Retry { attempt: 1 },
                CallOutcome::Success,
            ]
        );
    }
}
