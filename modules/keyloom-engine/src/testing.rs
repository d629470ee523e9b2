// Test mocks for the orchestrator's collaborator boundaries.
//
// One mock per trait:
// - StaticExpander (KeywordExpander) — fixed candidate list
// - LowercaseNormalizer (KeywordNormalizer) — lowercase + whitespace collapse
// - FixedAnnotator / RuleAnnotator (KeywordAnnotator)
// - HashEmbedder (TextEmbedder) — deterministic token-hash vectors
// - MemoryStore (PipelineStore) — in-memory, with failure injection
// - CollectSink (BriefConsumer) — captures the outcome
//
// The full pipeline runs against these with no network and no database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use keyloom_common::{
    Checkpoint, ClusterSet, Intent, KeywordRecord, KeywordSource, ProjectSpec, Stage,
};

use crate::checkpoint::checkpoint_now;
use crate::report::PipelineOutcome;
use crate::traits::{
    Annotation, BriefConsumer, Candidate, KeywordAnnotator, KeywordExpander, KeywordNormalizer,
    PipelineStore, TextEmbedder,
};

/// Dimension of HashEmbedder vectors.
pub const TEST_EMBEDDING_DIM: usize = 32;

// ---------------------------------------------------------------------------
// StaticExpander
// ---------------------------------------------------------------------------

/// Returns a fixed candidate list regardless of seeds.
pub struct StaticExpander {
    candidates: Vec<Candidate>,
}

impl StaticExpander {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            candidates: texts
                .iter()
                .map(|t| Candidate {
                    text: t.to_string(),
                    source: KeywordSource::Autosuggest,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl KeywordExpander for StaticExpander {
    async fn expand(&self, _spec: &ProjectSpec) -> Result<Vec<Candidate>> {
        Ok(self.candidates.clone())
    }
}

// ---------------------------------------------------------------------------
// LowercaseNormalizer
// ---------------------------------------------------------------------------

/// Lowercases and collapses whitespace. Stands in for the real
/// lemmatizing normalizer.
pub struct LowercaseNormalizer;

impl KeywordNormalizer for LowercaseNormalizer {
    fn normalize(&self, text: &str) -> String {
        text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

// ---------------------------------------------------------------------------
// Annotators
// ---------------------------------------------------------------------------

/// Every keyword gets the same intent.
pub struct FixedAnnotator(pub Intent);

#[async_trait]
impl KeywordAnnotator for FixedAnnotator {
    async fn annotate(&self, _record: &KeywordRecord) -> Result<Annotation> {
        Ok(Annotation { intent: self.0 })
    }
}

/// Crude keyword-trigger classifier, enough to exercise intent-dependent
/// scoring paths.
pub struct RuleAnnotator;

#[async_trait]
impl KeywordAnnotator for RuleAnnotator {
    async fn annotate(&self, record: &KeywordRecord) -> Result<Annotation> {
        let text = &record.normalized;
        let intent = if text.contains("buy") || text.contains("price") {
            Intent::Transactional
        } else if text.contains("near me") {
            Intent::Local
        } else if text.contains("best") || text.contains("review") || text.contains(" vs ") {
            Intent::Commercial
        } else {
            Intent::Informational
        };
        Ok(Annotation { intent })
    }
}

// ---------------------------------------------------------------------------
// HashEmbedder
// ---------------------------------------------------------------------------

/// Deterministic embeddings: each token lights one dimension picked by its
/// hash, so keywords sharing tokens get similar vectors. No model, no
/// network, stable across runs.
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn embed_one(text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        let mut vector = vec![0.0f32; TEST_EMBEDDING_DIM];
        for token in text.split_whitespace() {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            token.hash(&mut hasher);
            vector[(hasher.finish() % TEST_EMBEDDING_DIM as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory persistence with upsert-by-id semantics and optional failure
/// injection for crash tests.
#[derive(Default)]
pub struct MemoryStore {
    checkpoints: Mutex<HashMap<Uuid, Checkpoint>>,
    checkpoint_log: Mutex<Vec<Stage>>,
    keywords: Mutex<HashMap<Uuid, Vec<KeywordRecord>>>,
    clusters: Mutex<HashMap<Uuid, ClusterSet>>,
    /// When set, the next save_checkpoint for this stage fails once.
    fail_checkpoint_at: Mutex<Option<Stage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next checkpoint write for `stage` fail, simulating a crash
    /// at the end of that stage (durable stage work already written).
    pub fn fail_checkpoint_at(&self, stage: Stage) {
        *self.fail_checkpoint_at.lock().unwrap() = Some(stage);
    }

    /// Stages checkpointed so far, in write order.
    pub fn checkpoint_log(&self) -> Vec<Stage> {
        self.checkpoint_log.lock().unwrap().clone()
    }

    pub fn last_checkpoint(&self, project_id: Uuid) -> Option<Stage> {
        self.checkpoints.lock().unwrap().get(&project_id).map(|c| c.stage)
    }

    /// Overwrite the stored checkpoint, for corruption tests.
    pub fn set_checkpoint(&self, project_id: Uuid, stage: Stage, payload: serde_json::Value) {
        self.checkpoints
            .lock()
            .unwrap()
            .insert(project_id, checkpoint_now(project_id, stage, payload));
    }

    pub fn stored_keywords(&self, project_id: Uuid) -> Vec<KeywordRecord> {
        self.keywords
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn load_checkpoint(&self, project_id: Uuid) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.lock().unwrap().get(&project_id).cloned())
    }

    async fn save_checkpoint(
        &self,
        project_id: Uuid,
        stage: Stage,
        payload: serde_json::Value,
    ) -> Result<()> {
        {
            let mut fail_at = self.fail_checkpoint_at.lock().unwrap();
            if *fail_at == Some(stage) {
                *fail_at = None;
                bail!("injected checkpoint write failure at {stage}");
            }
        }
        self.checkpoints
            .lock()
            .unwrap()
            .insert(project_id, checkpoint_now(project_id, stage, payload));
        self.checkpoint_log.lock().unwrap().push(stage);
        Ok(())
    }

    async fn upsert_keywords(&self, project_id: Uuid, records: &[KeywordRecord]) -> Result<()> {
        let mut keywords = self.keywords.lock().unwrap();
        let stored = keywords.entry(project_id).or_default();
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(slot) => *slot = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn load_keywords(&self, project_id: Uuid) -> Result<Vec<KeywordRecord>> {
        Ok(self.stored_keywords(project_id))
    }

    async fn upsert_clusters(&self, project_id: Uuid, clusters: &ClusterSet) -> Result<()> {
        self.clusters.lock().unwrap().insert(project_id, clusters.clone());
        Ok(())
    }

    async fn load_clusters(&self, project_id: Uuid) -> Result<ClusterSet> {
        Ok(self
            .clusters
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// CollectSink
// ---------------------------------------------------------------------------

/// Captures the final outcome handed to the briefs boundary.
#[derive(Default)]
pub struct CollectSink {
    outcome: Mutex<Option<PipelineOutcome>>,
    calls: AtomicU32,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn outcome(&self) -> Option<PipelineOutcome> {
        self.outcome.lock().unwrap().clone()
    }
}

#[async_trait]
impl BriefConsumer for CollectSink {
    async fn consume(&self, outcome: &PipelineOutcome) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.outcome.lock().unwrap() = Some(outcome.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Project helper
// ---------------------------------------------------------------------------

pub fn test_project(seeds: &[&str]) -> ProjectSpec {
    ProjectSpec {
        id: Uuid::new_v4(),
        name: "test-project".to_string(),
        seeds: seeds.iter().map(|s| s.to_string()).collect(),
        geo: "US".to_string(),
        language: "en".to_string(),
        content_focus: Intent::Informational,
    }
}
