use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Intent, SourceTag};

/// Static configuration for one pipeline run. Supplied by the hosting
/// application at run start; the core never mutates it.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub sources: SourceConfig,
    pub retry: RetryConfig,
    pub scoring: ScoringConfig,
    pub clustering: ClusterConfig,
    pub engine: EngineConfig,
}

/// Per-source rate limits, cache TTLs, and run quotas.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub limits: HashMap<SourceTag, SourceLimits>,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceLimits {
    /// Token bucket capacity and refill, requests per minute.
    pub rpm: u32,
    pub cache_ttl: Duration,
    /// Hard per-run request ceiling. `None` = unlimited.
    pub quota: Option<u64>,
}

impl SourceConfig {
    pub fn limits_for(&self, source: SourceTag) -> SourceLimits {
        self.limits.get(&source).copied().unwrap_or(SourceLimits {
            rpm: 60,
            cache_ttl: Duration::from_secs(24 * 3600),
            quota: None,
        })
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert(
            SourceTag::Serp,
            SourceLimits {
                rpm: 30,
                cache_ttl: Duration::from_secs(24 * 3600),
                quota: Some(5_000),
            },
        );
        limits.insert(
            SourceTag::Trends,
            SourceLimits {
                rpm: 30,
                cache_ttl: Duration::from_secs(7 * 24 * 3600),
                quota: None,
            },
        );
        limits.insert(
            SourceTag::Ads,
            SourceLimits {
                rpm: 60,
                cache_ttl: Duration::from_secs(7 * 24 * 3600),
                quota: None,
            },
        );
        Self { limits }
    }
}

/// Retry policy for transient provider failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Backoff is `base * 2^attempt` plus jitter bounded by `base`.
    pub base_delay: Duration,
    /// Deadline applied to each network attempt.
    pub call_deadline: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            call_deadline: Duration::from_secs(30),
        }
    }
}

/// Weights and tables for the scoring engine.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Rank the CTR estimate targets (1-based).
    pub target_rank: usize,
    /// Composite difficulty used when no snapshot exists, in [0,100].
    pub default_difficulty: f64,
    /// Multiplier applied when a keyword's intent matches the project's
    /// content focus.
    pub intent_fit_boost: f64,
    /// Per-intent CTR adjustment relative to the informational baseline.
    pub intent_adjust: HashMap<Intent, f64>,
    pub ctr_table: CtrTable,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut intent_adjust = HashMap::new();
        // Commercial layouts concentrate clicks on ads; organic CTR at the
        // default target rank runs ~0.6x the informational baseline.
        intent_adjust.insert(Intent::Commercial, 0.6);
        intent_adjust.insert(Intent::Transactional, 0.6);
        Self {
            target_rank: 3,
            default_difficulty: 50.0,
            intent_fit_boost: 1.5,
            intent_adjust,
            ctr_table: CtrTable::default(),
        }
    }
}

/// Which feature flags shape the click curve. The signature is the lookup
/// key; distance between signatures is the count of differing flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSignature {
    pub featured_snippet: bool,
    pub local_pack: bool,
}

impl FeatureSignature {
    pub fn feature_count(&self) -> u32 {
        self.featured_snippet as u32 + self.local_pack as u32
    }

    pub fn distance(&self, other: &FeatureSignature) -> u32 {
        (self.featured_snippet != other.featured_snippet) as u32
            + (self.local_pack != other.local_pack) as u32
    }
}

/// One click-through curve: CTR percent by organic rank, index 0 = rank 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtrCurve {
    pub signature: FeatureSignature,
    pub by_rank: Vec<f64>,
}

impl CtrCurve {
    /// CTR percent at a 1-based rank. Ranks past the curve get the
    /// deep-position floor.
    pub fn at_rank(&self, rank: usize) -> f64 {
        const DEEP_POSITION_CTR: f64 = 2.0;
        if rank == 0 {
            return DEEP_POSITION_CTR;
        }
        self.by_rank.get(rank - 1).copied().unwrap_or(DEEP_POSITION_CTR)
    }
}

/// Curve table indexed by feature signature. On a miss, the closest curve
/// by flag distance wins; ties break by table order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtrTable {
    pub curves: Vec<CtrCurve>,
}

impl CtrTable {
    pub fn curve_for(&self, signature: FeatureSignature) -> Option<&CtrCurve> {
        if let Some(exact) = self.curves.iter().find(|c| c.signature == signature) {
            return Some(exact);
        }
        self.curves
            .iter()
            .min_by_key(|c| c.signature.distance(&signature))
    }
}

impl Default for CtrTable {
    fn default() -> Self {
        Self {
            curves: vec![
                // Clean organic layout.
                CtrCurve {
                    signature: FeatureSignature::default(),
                    by_rank: vec![31.7, 24.7, 18.7, 13.6, 9.5, 6.9, 5.1, 3.8, 2.8, 2.2],
                },
                // Featured snippet absorbs clicks above the organic list.
                CtrCurve {
                    signature: FeatureSignature {
                        featured_snippet: true,
                        local_pack: false,
                    },
                    by_rank: vec![19.6, 15.3, 11.3, 8.1, 5.8, 4.3, 3.2, 2.4, 1.8, 1.4],
                },
                // Map pack pushes organic results down the page.
                CtrCurve {
                    signature: FeatureSignature {
                        featured_snippet: false,
                        local_pack: true,
                    },
                    by_rank: vec![12.0, 9.0, 6.5, 4.8, 3.5, 2.6, 1.9, 1.4, 1.0, 0.8],
                },
            ],
        }
    }
}

/// Thresholds and weights for the two clustering passes.
#[derive(Debug, Clone, Copy)]
pub struct ClusterConfig {
    /// Similarity floor for topic membership; distance threshold is 1 - this.
    pub topic_threshold: f64,
    /// Tighter floor for page groups within a topic.
    pub page_threshold: f64,
    /// Hub-to-hub similarity floor for sibling links.
    pub sibling_threshold: f64,
    /// Semantic weight in the topic-pass hybrid metric (1.0 = embeddings only).
    pub topic_semantic_weight: f64,
    /// Semantic weight in the page-pass hybrid metric.
    pub page_semantic_weight: f64,
    /// Batches above this size are pre-bucketed by leading token before the
    /// topic pass.
    pub blocking_limit: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            topic_threshold: 0.78,
            page_threshold: 0.88,
            sibling_threshold: 0.90,
            topic_semantic_weight: 1.0,
            page_semantic_weight: 0.5,
            blocking_limit: 2_000,
        }
    }
}

/// Orchestrator knobs.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Worker-pool width for the metrics stage. Independent of rate limits.
    pub metrics_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            metrics_concurrency: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_cover_all_sources() {
        let config = SourceConfig::default();
        for source in SourceTag::ALL {
            assert!(config.limits.contains_key(&source), "missing {source}");
        }
    }

    #[test]
    fn ctr_table_exact_match_wins() {
        let table = CtrTable::default();
        let sig = FeatureSignature {
            featured_snippet: true,
            local_pack: false,
        };
        let curve = table.curve_for(sig).unwrap();
        assert_eq!(curve.signature, sig);
    }

    #[test]
    fn ctr_table_falls_back_to_closest() {
        let table = CtrTable::default();
        // No curve for both flags; both single-flag curves are distance 1,
        // table order picks the featured-snippet curve.
        let sig = FeatureSignature {
            featured_snippet: true,
            local_pack: true,
        };
        let curve = table.curve_for(sig).unwrap();
        assert!(curve.signature.featured_snippet);
        assert!(!curve.signature.local_pack);
    }

    #[test]
    fn deep_ranks_get_the_floor() {
        let table = CtrTable::default();
        let curve = table.curve_for(FeatureSignature::default()).unwrap();
        assert_eq!(curve.at_rank(25), 2.0);
        assert_eq!(curve.at_rank(3), 18.7);
    }
}
