use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use keyloom_common::SourceTag;

use crate::error::FetchError;

/// Rolling window length for the recent-request counter.
const WINDOW: Duration = Duration::from_secs(60);

struct SourceCounters {
    requests: AtomicU64,
    consumed: AtomicU64,
    hard_limit: Option<u64>,
    /// Timestamps of recent requests, pruned to the window on read.
    window: Mutex<VecDeque<Instant>>,
}

/// Per-source request accounting with a hard per-run ceiling.
///
/// Thread-safe: reservation is a compare-exchange so `consumed` can never
/// pass `hard_limit`, even with concurrent workers. Held per project run —
/// never a process-wide singleton.
pub struct QuotaLedger {
    sources: HashMap<SourceTag, SourceCounters>,
}

impl QuotaLedger {
    /// `limits` maps each source to its hard ceiling; `None` = unlimited.
    pub fn new(limits: HashMap<SourceTag, Option<u64>>) -> Self {
        let sources = SourceTag::ALL
            .into_iter()
            .map(|tag| {
                (
                    tag,
                    SourceCounters {
                        requests: AtomicU64::new(0),
                        consumed: AtomicU64::new(0),
                        hard_limit: limits.get(&tag).copied().flatten(),
                        window: Mutex::new(VecDeque::new()),
                    },
                )
            })
            .collect();
        Self { sources }
    }

    /// Reserve `cost` units ahead of a network attempt. Fails fast with
    /// `QuotaExceeded` when the ceiling would be crossed; nothing is
    /// consumed in that case.
    pub fn try_consume(&self, source: SourceTag, cost: u64) -> Result<(), FetchError> {
        let counters = &self.sources[&source];

        if let Some(limit) = counters.hard_limit {
            let reserved = counters
                .consumed
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                    (current + cost <= limit).then_some(current + cost)
                });
            if reserved.is_err() {
                warn!(source = %source, limit, "Quota exhausted");
                return Err(FetchError::QuotaExceeded { source });
            }
        } else {
            counters.consumed.fetch_add(cost, Ordering::SeqCst);
        }

        counters.requests.fetch_add(1, Ordering::SeqCst);
        let mut window = counters.window.lock().expect("quota window poisoned");
        window.push_back(Instant::now());
        Ok(())
    }

    pub fn consumed(&self, source: SourceTag) -> u64 {
        self.sources[&source].consumed.load(Ordering::SeqCst)
    }

    pub fn requests(&self, source: SourceTag) -> u64 {
        self.sources[&source].requests.load(Ordering::SeqCst)
    }

    /// Remaining units under the ceiling; `u64::MAX` when unlimited.
    pub fn remaining(&self, source: SourceTag) -> u64 {
        let counters = &self.sources[&source];
        match counters.hard_limit {
            Some(limit) => limit.saturating_sub(counters.consumed.load(Ordering::SeqCst)),
            None => u64::MAX,
        }
    }

    /// Requests issued to this source within the last minute.
    pub fn recent_requests(&self, source: SourceTag) -> usize {
        let counters = &self.sources[&source];
        let mut window = counters.window.lock().expect("quota window poisoned");
        let now = Instant::now();
        while window.front().is_some_and(|t| now.duration_since(*t) > WINDOW) {
            window.pop_front();
        }
        window.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn ledger_with(source: SourceTag, limit: Option<u64>) -> QuotaLedger {
        let mut limits = HashMap::new();
        limits.insert(source, limit);
        QuotaLedger::new(limits)
    }

    #[tokio::test]
    async fn unlimited_source_never_fails() {
        let ledger = ledger_with(SourceTag::Trends, None);
        for _ in 0..1_000 {
            ledger.try_consume(SourceTag::Trends, 1).unwrap();
        }
        assert_eq!(ledger.consumed(SourceTag::Trends), 1_000);
        assert_eq!(ledger.remaining(SourceTag::Trends), u64::MAX);
    }

    #[tokio::test]
    async fn ceiling_is_never_crossed() {
        let ledger = ledger_with(SourceTag::Serp, Some(10));
        let mut granted = 0;
        for _ in 0..15 {
            if ledger.try_consume(SourceTag::Serp, 1).is_ok() {
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
        assert_eq!(ledger.consumed(SourceTag::Serp), 10);
        assert_eq!(ledger.remaining(SourceTag::Serp), 0);
    }

    #[tokio::test]
    async fn failed_reservation_consumes_nothing() {
        let ledger = ledger_with(SourceTag::Serp, Some(5));
        ledger.try_consume(SourceTag::Serp, 5).unwrap();
        let err = ledger.try_consume(SourceTag::Serp, 1).unwrap_err();
        assert!(matches!(err, FetchError::QuotaExceeded { .. }));
        assert_eq!(ledger.consumed(SourceTag::Serp), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_workers_respect_the_ceiling() {
        let ledger = Arc::new(ledger_with(SourceTag::Serp, Some(50)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                let mut granted = 0u64;
                for _ in 0..20 {
                    if ledger.try_consume(SourceTag::Serp, 1).is_ok() {
                        granted += 1;
                    }
                }
                granted
            }));
        }
        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, 50);
        assert_eq!(ledger.consumed(SourceTag::Serp), 50);
    }
}
