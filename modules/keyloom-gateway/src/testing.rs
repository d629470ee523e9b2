// Test mocks for the gateway and anything driving it.
//
// ScriptedClient implements SourceClient with a queue of outcomes: queued
// failures drain first, then the standing response (or per-query override)
// answers every remaining call. Builder pattern: `.respond()`,
// `.respond_to()`, `.fail_times()`, `.always_fail()`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use keyloom_common::{SerpFeatures, SerpResult, VolumeMetrics};

use crate::error::FetchError;
use crate::source::{CallParams, SerpCapture, SourceClient, SourcePayload};

pub struct ScriptedClient {
    /// Scripted outcomes consumed in order before the standing behavior.
    queued: Mutex<Vec<Result<SourcePayload, FetchError>>>,
    /// Standing failure: every call fails with this once the queue drains.
    standing_failure: Option<FetchError>,
    /// Per-query responses, checked before the standing response.
    by_query: HashMap<String, SourcePayload>,
    standing_response: Option<SourcePayload>,
    calls: AtomicU32,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(Vec::new()),
            standing_failure: None,
            by_query: HashMap::new(),
            standing_response: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Answer every call with this payload once the queue drains.
    pub fn respond(mut self, payload: SourcePayload) -> Self {
        self.standing_response = Some(payload);
        self
    }

    /// Answer a specific query with this payload.
    pub fn respond_to(mut self, query: &str, payload: SourcePayload) -> Self {
        self.by_query.insert(query.to_string(), payload);
        self
    }

    /// Queue `n` successes ahead of the standing behavior.
    pub fn ok_times(self, payload: SourcePayload, n: usize) -> Self {
        {
            let mut queue = self.queued.lock().expect("script lock poisoned");
            for _ in 0..n {
                queue.push(Ok(payload.clone()));
            }
        }
        self
    }

    /// Queue `n` failures ahead of the standing behavior.
    pub fn fail_times(self, err: FetchError, n: usize) -> Self {
        {
            let mut queue = self.queued.lock().expect("script lock poisoned");
            for _ in 0..n {
                queue.push(Err(err.clone()));
            }
        }
        self
    }

    /// Fail every call once the queue drains.
    pub fn always_fail(mut self, err: FetchError) -> Self {
        self.standing_failure = Some(err);
        self
    }

    /// Network attempts made against this client.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceClient for ScriptedClient {
    async fn call(&self, query: &str, _params: &CallParams) -> Result<SourcePayload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut queue = self.queued.lock().expect("script lock poisoned");
            if !queue.is_empty() {
                return queue.remove(0);
            }
        }
        if let Some(err) = &self.standing_failure {
            return Err(err.clone());
        }
        if let Some(payload) = self.by_query.get(query) {
            return Ok(payload.clone());
        }
        self.standing_response.clone().ok_or(FetchError::Client {
            source: keyloom_common::SourceTag::Serp,
            message: format!("ScriptedClient: no response registered for {query:?}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

/// A SERP capture with `n` interchangeable weak results and no features.
pub fn plain_serp(n: usize) -> SourcePayload {
    SourcePayload::Serp(SerpCapture {
        results: (0..n)
            .map(|i| SerpResult {
                domain: format!("site{i}.example.com"),
                title_match: false,
                is_homepage: false,
                snippet_chars: 140,
            })
            .collect(),
        features: SerpFeatures::default(),
    })
}

pub fn ads_metrics(volume: u64, cpc: f64) -> SourcePayload {
    SourcePayload::Ads(VolumeMetrics { volume, cpc })
}
