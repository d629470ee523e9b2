use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use keyloom_common::config::{RetryConfig, SourceConfig};
use keyloom_common::SourceTag;

use crate::audit::{AuditLog, CallOutcome};
use crate::cache::{CacheKey, ResponseCache};
use crate::error::FetchError;
use crate::quota::QuotaLedger;
use crate::rate_limit::TokenBucket;
use crate::source::{CallParams, SourceClient, SourcePayload};

/// Resilient front door to external data sources: cache-aside lookup,
/// per-source token bucket, quota ceiling, bounded retry with jittered
/// backoff, and an audit record per call.
///
/// One gateway per project run (its ledger and buckets are run-scoped);
/// the response cache may be shared across runs since provider data is not
/// project-specific.
pub struct AccessGateway {
    clients: HashMap<SourceTag, Arc<dyn SourceClient>>,
    buckets: HashMap<SourceTag, TokenBucket>,
    ttls: HashMap<SourceTag, Duration>,
    ledger: QuotaLedger,
    cache: Arc<ResponseCache>,
    audit: AuditLog,
    retry: RetryConfig,
    /// Sources shut down for the rest of the run, with why.
    disabled: Mutex<HashMap<SourceTag, DisabledReason>>,
}

/// Why a source was shut down; later calls fail fast with a matching error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisabledReason {
    Auth,
    Quota,
}

impl AccessGateway {
    pub fn new(sources: &SourceConfig, retry: RetryConfig, cache: Arc<ResponseCache>) -> Self {
        let mut buckets = HashMap::new();
        let mut ttls = HashMap::new();
        let mut quotas = HashMap::new();
        for tag in SourceTag::ALL {
            let limits = sources.limits_for(tag);
            buckets.insert(tag, TokenBucket::new(limits.rpm));
            ttls.insert(tag, limits.cache_ttl);
            quotas.insert(tag, limits.quota);
        }
        Self {
            clients: HashMap::new(),
            buckets,
            ttls,
            ledger: QuotaLedger::new(quotas),
            cache,
            audit: AuditLog::new(),
            retry,
            disabled: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_client(mut self, source: SourceTag, client: Arc<dyn SourceClient>) -> Self {
        self.clients.insert(source, client);
        self
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn is_disabled(&self, source: SourceTag) -> bool {
        self.disabled.lock().expect("disabled lock poisoned").contains_key(&source)
    }

    fn disable(&self, source: SourceTag, reason: DisabledReason) {
        self.disabled
            .lock()
            .expect("disabled lock poisoned")
            .entry(source)
            .or_insert(reason);
    }

    fn disabled_error(&self, source: SourceTag) -> Option<FetchError> {
        let disabled = self.disabled.lock().expect("disabled lock poisoned");
        disabled.get(&source).map(|reason| match reason {
            DisabledReason::Auth => FetchError::Auth {
                source,
                message: "source disabled for the remainder of the run".to_string(),
            },
            DisabledReason::Quota => FetchError::QuotaExceeded { source },
        })
    }

    /// Fetch a payload from a source, consulting the cache first. Blocking
    /// points: the token bucket wait and retry backoff sleeps.
    pub async fn fetch(
        &self,
        source: SourceTag,
        query: &str,
        params: &CallParams,
    ) -> Result<SourcePayload, FetchError> {
        let started = Instant::now();

        if let Some(err) = self.disabled_error(source) {
            self.audit.append(
                source,
                query,
                CallOutcome::Failure {
                    kind: error_kind(&err).to_string(),
                },
                started.elapsed(),
                0,
            );
            return Err(err);
        }

        let key = CacheKey::new(source, query, params);
        if let Some(hit) = self.cache.get(&key) {
            debug!(source = %source, "Cache hit");
            self.audit
                .append(source, query, CallOutcome::CacheHit, started.elapsed(), 0);
            return Ok(hit);
        }

        let client = self.clients.get(&source).ok_or_else(|| FetchError::Client {
            source,
            message: "no client registered for source".to_string(),
        })?;

        // Explicit bounded retry loop: attempt count and backoff duration
        // stay observable. Timeouts get one retry; rate-limit and server
        // errors get the configured ceiling.
        let mut attempt: u32 = 0;
        let mut timeout_retries: u32 = 0;
        loop {
            if let Err(err) = self.ledger.try_consume(source, 1) {
                self.disable(source, DisabledReason::Quota);
                self.audit.append(
                    source,
                    query,
                    CallOutcome::Failure {
                        kind: "quota_exceeded".to_string(),
                    },
                    started.elapsed(),
                    0,
                );
                return Err(err);
            }

            self.buckets[&source].acquire().await;

            let attempt_started = Instant::now();
            let result = match tokio::time::timeout(
                self.retry.call_deadline,
                client.call(query, params),
            )
            .await
            {
                Ok(inner) => inner,
                Err(_) => Err(FetchError::Timeout { source }),
            };

            match result {
                Ok(payload) => {
                    self.cache.insert(key, payload.clone(), self.ttls[&source]);
                    self.audit
                        .append(source, query, CallOutcome::Success, started.elapsed(), 1);
                    info!(source = %source, attempts = attempt + 1, "Fetch succeeded");
                    return Ok(payload);
                }
                Err(err) => {
                    if let FetchError::Auth { .. } = err {
                        warn!(source = %source, "Auth failure, disabling source for this run");
                        self.disable(source, DisabledReason::Auth);
                    }

                    let may_retry = match &err {
                        FetchError::Timeout { .. } => timeout_retries < 1,
                        e if e.is_retryable() => attempt + 1 < self.retry.max_attempts,
                        _ => false,
                    };

                    if !may_retry {
                        self.audit.append(
                            source,
                            query,
                            CallOutcome::Failure {
                                kind: error_kind(&err).to_string(),
                            },
                            attempt_started.elapsed(),
                            1,
                        );
                        return Err(err);
                    }

                    if matches!(err, FetchError::Timeout { .. }) {
                        timeout_retries += 1;
                    }
                    self.audit.append(
                        source,
                        query,
                        CallOutcome::Retry { attempt: attempt + 1 },
                        attempt_started.elapsed(),
                        1,
                    );

                    let backoff = self.retry.base_delay * 2u32.saturating_pow(attempt);
                    let jitter_ms = self.retry.base_delay.as_millis().max(1) as u64;
                    let jitter = Duration::from_millis(rand::rng().random_range(0..jitter_ms));
                    warn!(
                        source = %source,
                        attempt = attempt + 1,
                        backoff_ms = (backoff + jitter).as_millis() as u64,
                        error = %err,
                        "Retryable fetch failure, backing off"
                    );
                    tokio::time::sleep(backoff + jitter).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn error_kind(err: &FetchError) -> &'static str {
    match err {
        FetchError::Auth { .. } => "auth",
        FetchError::Client { .. } => "client",
        FetchError::RateLimited { .. } => "rate_limited",
        FetchError::Server { .. } => "server",
        FetchError::Timeout { .. } => "timeout",
        FetchError::QuotaExceeded { .. } => "quota_exceeded",
    }
}

#[cfg(test)]
mod tests {
    use keyloom_common::config::SourceLimits;
    use keyloom_common::VolumeMetrics;

    use super::*;
    use crate::testing::ScriptedClient;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            call_deadline: Duration::from_secs(5),
        }
    }

    fn gateway_with(client: ScriptedClient) -> AccessGateway {
        let sources = SourceConfig::default();
        AccessGateway::new(&sources, fast_retry(), Arc::new(ResponseCache::new()))
            .with_client(SourceTag::Ads, Arc::new(client))
    }

    fn ads(volume: u64) -> SourcePayload {
        SourcePayload::Ads(VolumeMetrics { volume, cpc: 0.5 })
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_skips_quota_and_rate_limit() {
        let client = ScriptedClient::new().respond(ads(100));
        let gateway = gateway_with(client);
        let params = CallParams::default();

        gateway.fetch(SourceTag::Ads, "seo tools", &params).await.unwrap();
        gateway.fetch(SourceTag::Ads, "seo tools", &params).await.unwrap();

        // Second call never reached the ledger.
        assert_eq!(gateway.ledger().consumed(SourceTag::Ads), 1);
        let outcomes: Vec<_> = gateway.audit().records().into_iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec![CallOutcome::Success, CallOutcome::CacheHit]);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_then_succeed() {
        let client = ScriptedClient::new()
            .fail_times(FetchError::Server {
                source: SourceTag::Ads,
                message: "500".into(),
            }, 2)
            .respond(ads(7));
        let gateway = gateway_with(client);

        let payload = gateway
            .fetch(SourceTag::Ads, "seo tools", &CallParams::default())
            .await
            .unwrap();
        assert_eq!(payload.as_ads().unwrap().volume, 7);

        // Three attempts hit the ledger; audit shows two retries.
        assert_eq!(gateway.ledger().consumed(SourceTag::Ads), 3);
        let retries = gateway
            .audit()
            .records()
            .iter()
            .filter(|r| matches!(r.outcome, CallOutcome::Retry { .. }))
            .count();
        assert_eq!(retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_ceiling_exhausts_to_error() {
        let client = ScriptedClient::new().always_fail(FetchError::RateLimited {
            source: SourceTag::Ads,
        });
        let gateway = gateway_with(client);

        let err = gateway
            .fetch(SourceTag::Ads, "seo tools", &CallParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { .. }));
        assert_eq!(gateway.ledger().consumed(SourceTag::Ads), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_disables_the_source() {
        let client = ScriptedClient::new().always_fail(FetchError::Auth {
            source: SourceTag::Ads,
            message: "bad key".into(),
        });
        let gateway = gateway_with(client);

        let err = gateway
            .fetch(SourceTag::Ads, "seo tools", &CallParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Auth { .. }));
        assert!(gateway.is_disabled(SourceTag::Ads));

        // Subsequent calls fail fast without touching the ledger again.
        let before = gateway.ledger().consumed(SourceTag::Ads);
        let err = gateway
            .fetch(SourceTag::Ads, "other", &CallParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Auth { .. }));
        assert_eq!(gateway.ledger().consumed(SourceTag::Ads), before);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_never_retry() {
        let client = ScriptedClient::new().always_fail(FetchError::Client {
            source: SourceTag::Ads,
            message: "unsupported query".into(),
        });
        let gateway = gateway_with(client);

        let err = gateway
            .fetch(SourceTag::Ads, "!!!", &CallParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Client { .. }));
        assert_eq!(gateway.ledger().consumed(SourceTag::Ads), 1);
        assert!(!gateway.is_disabled(SourceTag::Ads));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_ceiling_fails_fast_and_disables() {
        let mut sources = SourceConfig::default();
        sources.limits.insert(
            SourceTag::Ads,
            SourceLimits {
                rpm: 600,
                cache_ttl: Duration::from_secs(60),
                quota: Some(2),
            },
        );
        let gateway = AccessGateway::new(&sources, fast_retry(), Arc::new(ResponseCache::new()))
            .with_client(SourceTag::Ads, Arc::new(ScriptedClient::new().respond(ads(1))));

        gateway.fetch(SourceTag::Ads, "a", &CallParams::default()).await.unwrap();
        gateway.fetch(SourceTag::Ads, "b", &CallParams::default()).await.unwrap();
        let err = gateway
            .fetch(SourceTag::Ads, "c", &CallParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::QuotaExceeded { .. }));
        assert_eq!(gateway.ledger().consumed(SourceTag::Ads), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shared_cache_serves_a_second_gateway() {
        let cache = Arc::new(ResponseCache::new());
        let sources = SourceConfig::default();
        let first = AccessGateway::new(&sources, fast_retry(), cache.clone())
            .with_client(SourceTag::Ads, Arc::new(ScriptedClient::new().respond(ads(11))));
        let second = AccessGateway::new(&sources, fast_retry(), cache)
            .with_client(SourceTag::Ads, Arc::new(ScriptedClient::new().respond(ads(99))));

        first.fetch(SourceTag::Ads, "q", &CallParams::default()).await.unwrap();
        let hit = second.fetch(SourceTag::Ads, "q", &CallParams::default()).await.unwrap();

        // Served from the shared cache, not the second client.
        assert_eq!(hit.as_ads().unwrap().volume, 11);
        assert_eq!(second.ledger().consumed(SourceTag::Ads), 0);
    }
}
