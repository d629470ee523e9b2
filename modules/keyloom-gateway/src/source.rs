use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use keyloom_common::{SerpFeatures, SerpResult, TrendSummary, VolumeMetrics};

use crate::error::FetchError;

/// Geo/language scoping for a provider call. Part of the cache identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallParams {
    pub geo: String,
    pub language: String,
}

impl CallParams {
    pub fn new(geo: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            geo: geo.into(),
            language: language.into(),
        }
    }
}

impl Default for CallParams {
    fn default() -> Self {
        Self::new("US", "en")
    }
}

/// SERP capture as the provider returns it, before it is bound to a
/// keyword id. The gateway caches this form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpCapture {
    pub results: Vec<SerpResult>,
    pub features: SerpFeatures,
}

/// Typed union of everything a source can return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "data")]
pub enum SourcePayload {
    Serp(SerpCapture),
    Trend(TrendSummary),
    Ads(VolumeMetrics),
}

impl SourcePayload {
    pub fn as_serp(&self) -> Option<&SerpCapture> {
        match self {
            SourcePayload::Serp(capture) => Some(capture),
            _ => None,
        }
    }

    pub fn as_trend(&self) -> Option<&TrendSummary> {
        match self {
            SourcePayload::Trend(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn as_ads(&self) -> Option<&VolumeMetrics> {
        match self {
            SourcePayload::Ads(metrics) => Some(metrics),
            _ => None,
        }
    }
}

/// One external data source. Implementations live in provider client
/// crates; the gateway only sees this capability.
///
/// A call here is a single network attempt — rate limiting, caching,
/// retries, and quota all happen in the gateway wrapping it.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn call(&self, query: &str, params: &CallParams) -> Result<SourcePayload, FetchError>;
}
