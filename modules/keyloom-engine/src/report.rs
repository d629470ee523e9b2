use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keyloom_common::{ClusterSet, KeywordRecord, SkipFlag, SourceTag};

use crate::stats::RunStats;

/// A keyword the metrics stage gave up on, surfaced instead of silently
/// dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedKeyword {
    pub id: Uuid,
    pub text: String,
    pub flag: SkipFlag,
}

/// Degradation summary for a run: what was skipped and which sources shut
/// down early.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub flagged: Vec<FlaggedKeyword>,
    pub degraded_sources: Vec<SourceTag>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.flagged.is_empty() && self.degraded_sources.is_empty()
    }
}

/// Immutable final result of a run, handed read-only to brief/export
/// collaborators at the briefs stage boundary.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub project_id: Uuid,
    pub records: Vec<KeywordRecord>,
    pub clusters: ClusterSet,
    pub report: RunReport,
    pub stats: RunStats,
}
