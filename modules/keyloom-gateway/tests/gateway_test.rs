// End-to-end gateway behavior: burst spacing through the full fetch path
// and TTL expiry against the shared cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use keyloom_common::config::{RetryConfig, SourceConfig, SourceLimits};
use keyloom_common::SourceTag;
use keyloom_gateway::testing::{ads_metrics, ScriptedClient};
use keyloom_gateway::{AccessGateway, CallParams, ResponseCache};

fn sources_with(rpm: u32, ttl: Duration) -> SourceConfig {
    let mut limits = HashMap::new();
    limits.insert(
        SourceTag::Ads,
        SourceLimits {
            rpm,
            cache_ttl: ttl,
            quota: None,
        },
    );
    SourceConfig { limits }
}

#[tokio::test(start_paused = true)]
async fn burst_of_fifteen_respects_the_refill_rate() {
    let sources = sources_with(10, Duration::from_secs(3600));
    let gateway = AccessGateway::new(
        &sources,
        RetryConfig::default(),
        Arc::new(ResponseCache::new()),
    )
    .with_client(SourceTag::Ads, Arc::new(ScriptedClient::new().respond(ads_metrics(100, 1.0))));

    let params = CallParams::default();
    let start = Instant::now();
    let mut finished = Vec::new();
    for i in 0..15 {
        // Distinct queries so the cache never short-circuits the bucket.
        gateway
            .fetch(SourceTag::Ads, &format!("keyword {i}"), &params)
            .await
            .unwrap();
        finished.push(start.elapsed());
    }

    // Exactly 10 immediate calls; the 5 delayed ones each wait for the
    // 6-second refill tick, never firing before their eligible time.
    for e in &finished[..10] {
        assert_eq!(*e, Duration::ZERO, "burst call delayed: {e:?}");
    }
    for (i, e) in finished[10..].iter().enumerate() {
        let eligible = Duration::from_secs(6 * (i as u64 + 1));
        assert!(
            *e >= eligible - Duration::from_millis(100),
            "delayed call {} fired at {e:?}, eligible at {eligible:?}",
            i + 11
        );
    }
}

#[tokio::test(start_paused = true)]
async fn expired_cache_entry_triggers_a_fresh_call() {
    let sources = sources_with(600, Duration::from_secs(60));
    let client = Arc::new(ScriptedClient::new().respond(ads_metrics(42, 0.8)));
    let gateway = AccessGateway::new(
        &sources,
        RetryConfig::default(),
        Arc::new(ResponseCache::new()),
    )
    .with_client(SourceTag::Ads, client.clone());

    let params = CallParams::default();
    gateway.fetch(SourceTag::Ads, "seo tools", &params).await.unwrap();
    assert_eq!(client.calls(), 1);

    // Within TTL: served from cache.
    tokio::time::advance(Duration::from_secs(30)).await;
    gateway.fetch(SourceTag::Ads, "seo tools", &params).await.unwrap();
    assert_eq!(client.calls(), 1);

    // Past TTL: the stale entry is a miss and the provider is called again.
    tokio::time::advance(Duration::from_secs(31)).await;
    gateway.fetch(SourceTag::Ads, "seo tools", &params).await.unwrap();
    assert_eq!(client.calls(), 2);
}
