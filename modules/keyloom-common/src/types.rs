use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

/// Search intent category for a keyword. Classification is done by the
/// external annotator; scoring consumes the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Informational,
    Commercial,
    Transactional,
    Navigational,
    Local,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Informational => write!(f, "informational"),
            Intent::Commercial => write!(f, "commercial"),
            Intent::Transactional => write!(f, "transactional"),
            Intent::Navigational => write!(f, "navigational"),
            Intent::Local => write!(f, "local"),
        }
    }
}

/// Where a keyword candidate came from during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordSource {
    Seed,
    Autosuggest,
    Paa,
    Related,
    Competitor,
}

/// External data source behind the access gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// SERP provider (organic results, features, PAA).
    Serp,
    /// Interest-over-time trends provider.
    Trends,
    /// Keyword volume / CPC metrics provider.
    Ads,
}

impl SourceTag {
    pub const ALL: [SourceTag; 3] = [SourceTag::Serp, SourceTag::Trends, SourceTag::Ads];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Serp => "serp",
            SourceTag::Trends => "trends",
            SourceTag::Ads => "ads",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a keyword was skipped during enrichment. A flagged keyword stays in
/// the run; downstream stages see it without metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipFlag {
    Auth,
    Client,
    RateLimited,
    Transient,
    QuotaExhausted,
}

// --- Keyword Record ---

/// One keyword moving through the pipeline. Created at expansion, enriched
/// by the metrics stage, scored by the scoring stage. Never deleted mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub id: Uuid,
    /// Raw text as the expansion source produced it.
    pub text: String,
    /// Canonical form from the external normalizer. Opaque to the core;
    /// used as the dedup and clustering identity.
    pub normalized: String,
    pub source: KeywordSource,
    pub intent: Option<Intent>,

    // Enrichment (metrics stage)
    pub volume: Option<u64>,
    pub cpc: Option<f64>,
    pub trend_delta: Option<f64>,
    pub serp_features: Option<SerpFeatures>,

    /// Semantic vector from the external embedder, filled before clustering.
    pub embedding: Option<Vec<f32>>,

    // Scoring outputs
    pub difficulty: Option<DifficultyComponents>,
    pub traffic_potential: Option<f64>,
    pub opportunity: Option<f64>,

    /// Set when enrichment gave up on this keyword. `None` means fully enriched
    /// or not yet attempted.
    pub flag: Option<SkipFlag>,
}

impl KeywordRecord {
    pub fn new(text: impl Into<String>, normalized: impl Into<String>, source: KeywordSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            normalized: normalized.into(),
            source,
            intent: None,
            volume: None,
            cpc: None,
            trend_delta: None,
            serp_features: None,
            embedding: None,
            difficulty: None,
            traffic_potential: None,
            opportunity: None,
            flag: None,
        }
    }

    /// A record is enriched once it carries SERP features. Idempotency hinges
    /// on this: the metrics stage skips records where it returns true.
    pub fn is_enriched(&self) -> bool {
        self.serp_features.is_some()
    }
}

// --- SERP Snapshot ---

/// One organic result within a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpResult {
    pub domain: String,
    /// Title contains the query as an exact phrase.
    pub title_match: bool,
    pub is_homepage: bool,
    /// Snippet length, the content-depth proxy.
    pub snippet_chars: u32,
}

/// Feature flags observed on a results page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SerpFeatures {
    pub ads_count: u32,
    pub has_featured_snippet: bool,
    pub has_local_pack: bool,
    pub has_knowledge_graph: bool,
    pub paa_question_count: u32,
}

impl SerpFeatures {
    /// How many of the boolean feature slots are present (PAA counts as one
    /// slot when any questions exist).
    pub fn flags_present(&self) -> u32 {
        self.has_featured_snippet as u32
            + self.has_local_pack as u32
            + self.has_knowledge_graph as u32
            + (self.paa_question_count > 0) as u32
    }

    /// Total boolean feature slots, the denominator for crowding.
    pub const FLAG_SLOTS: u32 = 4;
}

/// Immutable capture of a results page for one keyword. One latest snapshot
/// per keyword per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpSnapshot {
    pub keyword_id: Uuid,
    pub query: String,
    pub results: Vec<SerpResult>,
    pub features: SerpFeatures,
    pub captured_at: DateTime<Utc>,
}

// --- Provider Payloads ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Stable,
    Declining,
}

/// Aggregated interest-over-time summary for one keyword.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Relative change, recent window vs prior window. 0.2 = +20%.
    pub delta: f64,
    pub direction: TrendDirection,
    /// Peak interest well above the mean suggests seasonality.
    pub is_seasonal: bool,
}

impl TrendSummary {
    /// Classify a delta into a direction. Bands: rising above +20%,
    /// declining below -20%, stable between.
    pub fn from_delta(delta: f64, is_seasonal: bool) -> Self {
        let direction = if delta > 0.2 {
            TrendDirection::Rising
        } else if delta < -0.2 {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };
        Self { delta, direction, is_seasonal }
    }
}

/// Monthly volume and cost-per-click for one keyword.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeMetrics {
    pub volume: u64,
    pub cpc: f64,
}

// --- Scoring Outputs ---

/// Difficulty sub-scores, each in [0,1], plus the weighted composite in
/// [0,100]. `estimated` marks values derived from the configured default
/// instead of a snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DifficultyComponents {
    pub serp_strength: f64,
    pub competition: f64,
    pub crowding: f64,
    pub content_depth: f64,
    pub composite: f64,
    pub estimated: bool,
}

// --- Clusters ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterLevel {
    Topic,
    Page,
}

/// A group of keyword records at one level of the hierarchy. Read-only
/// after creation within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: Uuid,
    pub level: ClusterLevel,
    /// Hub keyword text, used as the cluster label.
    pub label: String,
    pub hub_id: Uuid,
    pub member_ids: Vec<Uuid>,
    pub opportunity_sum: f64,
    pub total_volume: u64,
    pub avg_difficulty: f64,
}

/// A topic node together with the page nodes it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCluster {
    pub topic: ClusterNode,
    pub pages: Vec<ClusterNode>,
}

/// Sibling edge between two page nodes whose hubs are close enough to
/// cross-link. Undirected; stored once with ids in sorted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingLink {
    pub a: Uuid,
    pub b: Uuid,
}

/// Full clustering result for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSet {
    pub topics: Vec<TopicCluster>,
    pub sibling_links: Vec<SiblingLink>,
}

impl ClusterSet {
    pub fn page_count(&self) -> usize {
        self.topics.iter().map(|t| t.pages.len()).sum()
    }
}

// --- Pipeline State ---

/// Fixed, totally ordered stage sequence. Transitions are one-directional;
/// `Ord` follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Created,
    Expansion,
    Metrics,
    Processing,
    Scoring,
    Clustering,
    Briefs,
    Completed,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Created,
        Stage::Expansion,
        Stage::Metrics,
        Stage::Processing,
        Stage::Scoring,
        Stage::Clustering,
        Stage::Briefs,
        Stage::Completed,
    ];

    /// The stage after this one, or `None` at `Completed`.
    pub fn next(&self) -> Option<Stage> {
        let idx = Stage::ALL.iter().position(|s| s == self)?;
        Stage::ALL.get(idx + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Created => "created",
            Stage::Expansion => "expansion",
            Stage::Metrics => "metrics",
            Stage::Processing => "processing",
            Stage::Scoring => "scoring",
            Stage::Clustering => "clustering",
            Stage::Briefs => "briefs",
            Stage::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of the last completed stage for a project. The payload is
/// stage-specific resume data, opaque to the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub project_id: Uuid,
    pub stage: Stage,
    pub saved_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Project settings handed to the orchestrator at run start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub id: Uuid,
    pub name: String,
    pub seeds: Vec<String>,
    pub geo: String,
    pub language: String,
    /// The intent the content plan is built around; drives intent fit.
    pub content_focus: Intent,
}
