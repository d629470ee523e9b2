// Trait abstractions for the orchestrator's collaborators.
//
// Expansion, normalization, annotation, embedding, persistence, and brief
// generation all live outside the core; each boundary is one trait here.
// Mocks for all of them live in `testing`, so the full pipeline runs in
// tests with no network and no database.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use keyloom_common::{
    Checkpoint, ClusterSet, Intent, KeywordRecord, KeywordSource, ProjectSpec, Stage,
};

use crate::report::PipelineOutcome;

/// A keyword candidate produced by expansion, not yet a record.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    pub source: KeywordSource,
}

/// Turns seed terms into a candidate keyword set. Called once per run at
/// the start of the expansion stage.
#[async_trait]
pub trait KeywordExpander: Send + Sync {
    async fn expand(&self, spec: &ProjectSpec) -> Result<Vec<Candidate>>;
}

/// Produces the canonical form of a keyword. The core treats the output as
/// an opaque string: dedup identity and clustering token source.
pub trait KeywordNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

/// Per-keyword classification from the processing stage.
#[derive(Debug, Clone, Copy)]
pub struct Annotation {
    pub intent: Intent,
}

/// Classifies keywords (intent, and whatever else the implementation
/// extracts). Must be idempotent: annotating twice gives the same result.
#[async_trait]
pub trait KeywordAnnotator: Send + Sync {
    async fn annotate(&self, record: &KeywordRecord) -> Result<Annotation>;
}

/// Supplies semantic vectors for clustering. The core never generates
/// embeddings itself.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Minimal read/write contract the orchestrator needs from persistence.
/// Called at stage boundaries, plus per-record upserts inside the metrics
/// stage so partial work survives a crash.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn load_checkpoint(&self, project_id: Uuid) -> Result<Option<Checkpoint>>;
    async fn save_checkpoint(
        &self,
        project_id: Uuid,
        stage: Stage,
        payload: serde_json::Value,
    ) -> Result<()>;
    async fn upsert_keywords(&self, project_id: Uuid, records: &[KeywordRecord]) -> Result<()>;
    async fn load_keywords(&self, project_id: Uuid) -> Result<Vec<KeywordRecord>>;
    async fn upsert_clusters(&self, project_id: Uuid, clusters: &ClusterSet) -> Result<()>;
    async fn load_clusters(&self, project_id: Uuid) -> Result<ClusterSet>;
}

/// Consumes the final result read-only at the briefs stage boundary.
#[async_trait]
pub trait BriefConsumer: Send + Sync {
    async fn consume(&self, outcome: &PipelineOutcome) -> Result<()>;
}
