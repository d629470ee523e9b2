use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use keyloom_cluster::ClusterEngine;
use keyloom_common::{
    ClusterSet, KeywordRecord, KeywordSource, PipelineConfig, ProjectSpec, SerpSnapshot, SkipFlag,
    SourceTag, Stage,
};
use keyloom_gateway::{CallParams, FetchError};
use keyloom_scoring::score_batch;

use crate::cancel::CancelFlag;
use crate::checkpoint::{
    resume_point, ClusteringPayload, ExpansionPayload, MetricsPayload, ProcessingPayload,
    ScoringPayload,
};
use crate::deps::EngineDeps;
use crate::error::PipelineError;
use crate::report::{FlaggedKeyword, PipelineOutcome, RunReport};
use crate::stats::RunStats;

/// Orchestrates one project through the fixed stage sequence, writing a
/// checkpoint after each completed stage.
///
/// Stage bodies are idempotent against partially-applied state: enriched
/// records are skipped, annotated records are not re-annotated, and
/// expansion dedups against whatever is already stored. A crash mid-stage
/// therefore resumes cleanly — committed work stays, the unwritten
/// checkpoint sends the run back into the same stage.
pub struct Pipeline {
    deps: EngineDeps,
    config: PipelineConfig,
    cancel: CancelFlag,
}

/// Stages the run loop executes, in order. `Created` is written at run
/// start and `Completed` after the briefs hand-off.
const EXECUTION_ORDER: [Stage; 6] = [
    Stage::Expansion,
    Stage::Metrics,
    Stage::Processing,
    Stage::Scoring,
    Stage::Clustering,
    Stage::Briefs,
];

impl Pipeline {
    pub fn new(deps: EngineDeps, config: PipelineConfig) -> Self {
        Self {
            deps,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for cancelling this pipeline from another task.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Execute a fresh run from the first stage.
    pub async fn run(&self, spec: &ProjectSpec) -> Result<PipelineOutcome, PipelineError> {
        info!(project = %spec.name, seeds = spec.seeds.len(), "Pipeline starting");
        self.save_checkpoint(spec, Stage::Created, serde_json::Value::Null)
            .await?;
        self.execute_from(spec, Stage::Expansion).await
    }

    /// Resume an interrupted run at the stage after its checkpoint.
    /// Without a checkpoint this falls back to a fresh run.
    pub async fn resume(&self, spec: &ProjectSpec) -> Result<PipelineOutcome, PipelineError> {
        let checkpoint = self
            .deps
            .store
            .load_checkpoint(spec.id)
            .await
            .map_err(|e| stage_err(Stage::Created, e))?;

        match checkpoint {
            None => {
                info!(project = %spec.name, "No checkpoint found, starting fresh");
                self.run(spec).await
            }
            Some(checkpoint) => {
                let start = resume_point(&checkpoint)?;
                info!(
                    project = %spec.name,
                    checkpointed = %checkpoint.stage,
                    resuming_at = %start,
                    "Resuming pipeline"
                );
                self.execute_from(spec, start).await
            }
        }
    }

    async fn execute_from(
        &self,
        spec: &ProjectSpec,
        start: Stage,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut stats = RunStats::default();
        let mut records = self
            .deps
            .store
            .load_keywords(spec.id)
            .await
            .map_err(|e| stage_err(start, e))?;
        let mut snapshots: HashMap<Uuid, SerpSnapshot> = HashMap::new();
        let mut clusters = if start > Stage::Clustering {
            self.deps
                .store
                .load_clusters(spec.id)
                .await
                .map_err(|e| stage_err(start, e))?
        } else {
            ClusterSet::default()
        };

        let params = CallParams::new(spec.geo.clone(), spec.language.clone());

        for stage in EXECUTION_ORDER {
            if stage < start {
                continue;
            }
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled { stage });
            }

            let started = Instant::now();
            info!(stage = %stage, project = %spec.name, "Stage starting");

            let payload = match stage {
                Stage::Expansion => {
                    let payload = self.expansion_stage(spec, &mut records, &mut stats).await?;
                    to_value(payload)
                }
                Stage::Metrics => {
                    let payload = self
                        .metrics_stage(spec, &mut records, &mut snapshots, &params, &mut stats)
                        .await?;
                    to_value(payload)
                }
                Stage::Processing => to_value(self.processing_stage(spec, &mut records).await?),
                Stage::Scoring => {
                    let payload = self
                        .scoring_stage(spec, &mut records, &mut snapshots, &params, &mut stats)
                        .await?;
                    to_value(payload)
                }
                Stage::Clustering => {
                    let (set, payload) = self.clustering_stage(spec, &mut records, &mut stats).await?;
                    clusters = set;
                    to_value(payload)
                }
                Stage::Briefs => serde_json::Value::Null,
                // Created/Completed are written outside this loop.
                Stage::Created | Stage::Completed => unreachable!("not an executable stage"),
            };

            if stage == Stage::Briefs {
                stats.record_stage(stage, started.elapsed());
                let outcome = self
                    .briefs_stage(spec, records, clusters, stats)
                    .await?;
                self.save_checkpoint(spec, Stage::Briefs, serde_json::Value::Null)
                    .await?;
                self.save_checkpoint(spec, Stage::Completed, serde_json::Value::Null)
                    .await?;
                info!(project = %spec.name, "Pipeline complete");
                return Ok(outcome);
            }

            self.save_checkpoint(spec, stage, payload).await?;
            stats.record_stage(stage, started.elapsed());
        }

        unreachable!("briefs stage always returns")
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Seeds plus expander candidates, normalized and deduplicated. Re-entry
    /// keeps previously stored records and only appends unseen forms.
    async fn expansion_stage(
        &self,
        spec: &ProjectSpec,
        records: &mut Vec<KeywordRecord>,
        stats: &mut RunStats,
    ) -> Result<ExpansionPayload, PipelineError> {
        let candidates = self
            .deps
            .expander
            .expand(spec)
            .await
            .map_err(|e| stage_err(Stage::Expansion, e))?;

        let mut seen: HashSet<String> = records.iter().map(|r| r.normalized.clone()).collect();
        let mut dropped = 0u32;

        let seeds = spec
            .seeds
            .iter()
            .map(|s| (s.clone(), KeywordSource::Seed));
        let expanded = candidates.into_iter().map(|c| (c.text, c.source));

        for (text, source) in seeds.chain(expanded) {
            let normalized = self.deps.normalizer.normalize(&text);
            if normalized.is_empty() || !seen.insert(normalized.clone()) {
                dropped += 1;
                continue;
            }
            records.push(KeywordRecord::new(text, normalized, source));
        }

        stats.keywords_expanded = records.len() as u32;
        stats.keywords_deduplicated = dropped;
        info!(
            keywords = records.len(),
            deduplicated = dropped,
            "Expansion complete"
        );

        self.deps
            .store
            .upsert_keywords(spec.id, records)
            .await
            .map_err(|e| stage_err(Stage::Expansion, e))?;

        Ok(ExpansionPayload {
            keyword_count: records.len(),
        })
    }

    /// Enrich every unflagged record through the gateway with a bounded
    /// worker pool. Per-keyword failures flag and skip; auth or quota
    /// exhaustion degrades that source for the rest of the run without
    /// failing the stage. Each enriched record is written durably as soon
    /// as its task finishes.
    async fn metrics_stage(
        &self,
        spec: &ProjectSpec,
        records: &mut Vec<KeywordRecord>,
        snapshots: &mut HashMap<Uuid, SerpSnapshot>,
        params: &CallParams,
        stats: &mut RunStats,
    ) -> Result<MetricsPayload, PipelineError> {
        let concurrency = self.config.engine.metrics_concurrency.max(1);
        let work: Vec<KeywordRecord> = records.iter().filter(|r| r.flag.is_none()).cloned().collect();

        let outcomes: Vec<Result<EnrichOutcome>> = stream::iter(work.into_iter().map(|record| {
            let params = params.clone();
            async move {
                if self.cancel.is_cancelled() {
                    return Ok(EnrichOutcome {
                        record,
                        snapshot: None,
                        started: false,
                    });
                }
                self.enrich_one(spec.id, record, &params).await
            }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

        let mut not_started = 0usize;
        for outcome in outcomes {
            let outcome = outcome.map_err(|e| stage_err(Stage::Metrics, e))?;
            if !outcome.started {
                not_started += 1;
            }
            if let Some(snapshot) = outcome.snapshot {
                snapshots.insert(outcome.record.id, snapshot);
            }
            if let Some(slot) = records.iter_mut().find(|r| r.id == outcome.record.id) {
                *slot = outcome.record;
            }
        }

        if self.cancel.is_cancelled() {
            warn!(not_started, "Metrics stage cancelled, in-flight work committed");
            return Err(PipelineError::Cancelled {
                stage: Stage::Metrics,
            });
        }

        let enriched = records
            .iter()
            .filter(|r| r.is_enriched() && r.flag.is_none())
            .count();
        let flagged = records.iter().filter(|r| r.flag.is_some()).count();
        stats.keywords_enriched = enriched as u32;
        stats.keywords_flagged = flagged as u32;
        info!(enriched, flagged, "Metrics collection complete");

        Ok(MetricsPayload { enriched, flagged })
    }

    /// One keyword's enrichment: SERP snapshot, volume/CPC, trend delta.
    /// Already-present fields are left alone so re-entry is a no-op apart
    /// from the cache-backed snapshot rebuild.
    async fn enrich_one(
        &self,
        project_id: Uuid,
        mut record: KeywordRecord,
        params: &CallParams,
    ) -> Result<EnrichOutcome> {
        let gateway = &self.deps.gateway;
        let was_enriched = record.is_enriched();

        let snapshot = match gateway.fetch(SourceTag::Serp, &record.normalized, params).await {
            Ok(payload) => payload.as_serp().map(|capture| SerpSnapshot {
                keyword_id: record.id,
                query: record.normalized.clone(),
                results: capture.results.clone(),
                features: capture.features,
                captured_at: Utc::now(),
            }),
            Err(err) => {
                warn!(keyword = %record.text, error = %err, "SERP fetch failed, flagging keyword");
                record.flag = Some(flag_for(&err));
                None
            }
        };
        if record.serp_features.is_none() {
            record.serp_features = snapshot.as_ref().map(|s| s.features);
        }

        if record.flag.is_none() && record.volume.is_none() {
            match gateway.fetch(SourceTag::Ads, &record.normalized, params).await {
                Ok(payload) => {
                    if let Some(metrics) = payload.as_ads() {
                        record.volume = Some(metrics.volume);
                        record.cpc = Some(metrics.cpc);
                    }
                }
                Err(err) => {
                    warn!(keyword = %record.text, error = %err, "Volume fetch failed, flagging keyword");
                    record.flag = Some(flag_for(&err));
                }
            }
        }

        // Trend data enriches but never gates: a failure here costs the
        // delta, not the keyword.
        if record.flag.is_none() && record.trend_delta.is_none() {
            match gateway.fetch(SourceTag::Trends, &record.normalized, params).await {
                Ok(payload) => {
                    record.trend_delta = payload.as_trend().map(|t| t.delta);
                }
                Err(err) => {
                    warn!(keyword = %record.text, error = %err, "Trend fetch failed, continuing without");
                }
            }
        }

        if !was_enriched || record.flag.is_some() {
            self.deps
                .store
                .upsert_keywords(project_id, std::slice::from_ref(&record))
                .await?;
        }

        Ok(EnrichOutcome {
            record,
            snapshot,
            started: true,
        })
    }

    /// Intent classification via the external annotator. Records that
    /// already carry an intent are untouched.
    async fn processing_stage(
        &self,
        spec: &ProjectSpec,
        records: &mut [KeywordRecord],
    ) -> Result<ProcessingPayload, PipelineError> {
        let mut annotated = 0usize;
        for record in records.iter_mut() {
            if record.intent.is_some() {
                continue;
            }
            let annotation = self
                .deps
                .annotator
                .annotate(record)
                .await
                .map_err(|e| stage_err(Stage::Processing, e))?;
            record.intent = Some(annotation.intent);
            annotated += 1;
        }

        info!(annotated, "Processing complete");
        self.deps
            .store
            .upsert_keywords(spec.id, records)
            .await
            .map_err(|e| stage_err(Stage::Processing, e))?;

        Ok(ProcessingPayload { annotated })
    }

    /// Difficulty, traffic potential, and batch-normalized opportunity.
    async fn scoring_stage(
        &self,
        spec: &ProjectSpec,
        records: &mut Vec<KeywordRecord>,
        snapshots: &mut HashMap<Uuid, SerpSnapshot>,
        params: &CallParams,
        stats: &mut RunStats,
    ) -> Result<ScoringPayload, PipelineError> {
        self.ensure_snapshots(records, snapshots, params).await;

        score_batch(records, snapshots, spec.content_focus, &self.config.scoring);

        stats.keywords_scored = records.len() as u32;
        stats.estimated_difficulty = records
            .iter()
            .filter(|r| r.difficulty.is_some_and(|d| d.estimated))
            .count() as u32;

        self.deps
            .store
            .upsert_keywords(spec.id, records)
            .await
            .map_err(|e| stage_err(Stage::Scoring, e))?;

        Ok(ScoringPayload {
            scored: records.len(),
        })
    }

    /// Rebuild snapshots missing from memory (fresh process after resume).
    /// Served from the gateway cache when warm, so a continuous run never
    /// refetches; a keyword whose snapshot cannot be rebuilt just scores
    /// with estimated difficulty.
    async fn ensure_snapshots(
        &self,
        records: &[KeywordRecord],
        snapshots: &mut HashMap<Uuid, SerpSnapshot>,
        params: &CallParams,
    ) {
        for record in records {
            if record.flag.is_some() || !record.is_enriched() || snapshots.contains_key(&record.id) {
                continue;
            }
            match self
                .deps
                .gateway
                .fetch(SourceTag::Serp, &record.normalized, params)
                .await
            {
                Ok(payload) => {
                    if let Some(capture) = payload.as_serp() {
                        snapshots.insert(
                            record.id,
                            SerpSnapshot {
                                keyword_id: record.id,
                                query: record.normalized.clone(),
                                results: capture.results.clone(),
                                features: capture.features,
                                captured_at: Utc::now(),
                            },
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        keyword = %record.text,
                        error = %err,
                        "Snapshot rebuild failed, difficulty will be estimated"
                    );
                }
            }
        }
    }

    /// Embeddings for any record lacking one, then the two-pass clustering.
    async fn clustering_stage(
        &self,
        spec: &ProjectSpec,
        records: &mut Vec<KeywordRecord>,
        stats: &mut RunStats,
    ) -> Result<(ClusterSet, ClusteringPayload), PipelineError> {
        let missing: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|&i| records[i].normalized.clone()).collect();
            let vectors = self
                .deps
                .embedder
                .embed_batch(texts)
                .await
                .map_err(|e| stage_err(Stage::Clustering, e))?;
            if vectors.len() != missing.len() {
                return Err(stage_err(
                    Stage::Clustering,
                    anyhow::anyhow!(
                        "embedder returned {} vectors for {} texts",
                        vectors.len(),
                        missing.len()
                    ),
                ));
            }
            for (&idx, vector) in missing.iter().zip(vectors) {
                records[idx].embedding = Some(vector);
            }
        }

        let set = ClusterEngine::new(self.config.clustering).cluster(records);
        stats.topics = set.topics.len() as u32;
        stats.pages = set.page_count() as u32;
        stats.sibling_links = set.sibling_links.len() as u32;

        self.deps
            .store
            .upsert_keywords(spec.id, records)
            .await
            .map_err(|e| stage_err(Stage::Clustering, e))?;
        self.deps
            .store
            .upsert_clusters(spec.id, &set)
            .await
            .map_err(|e| stage_err(Stage::Clustering, e))?;

        let payload = ClusteringPayload {
            topics: set.topics.len(),
            pages: set.page_count(),
        };
        Ok((set, payload))
    }

    /// Assemble the immutable result and hand it to the brief consumer.
    async fn briefs_stage(
        &self,
        spec: &ProjectSpec,
        records: Vec<KeywordRecord>,
        clusters: ClusterSet,
        stats: RunStats,
    ) -> Result<PipelineOutcome, PipelineError> {
        let flagged: Vec<FlaggedKeyword> = records
            .iter()
            .filter_map(|r| {
                r.flag.map(|flag| FlaggedKeyword {
                    id: r.id,
                    text: r.text.clone(),
                    flag,
                })
            })
            .collect();
        let degraded_sources: Vec<SourceTag> = SourceTag::ALL
            .into_iter()
            .filter(|&s| self.deps.gateway.is_disabled(s))
            .collect();

        if !flagged.is_empty() || !degraded_sources.is_empty() {
            warn!(
                flagged = flagged.len(),
                degraded = ?degraded_sources,
                "Run completed degraded"
            );
        }

        let outcome = PipelineOutcome {
            project_id: spec.id,
            records,
            clusters,
            report: RunReport {
                flagged,
                degraded_sources,
            },
            stats,
        };

        self.deps
            .briefs
            .consume(&outcome)
            .await
            .map_err(|e| stage_err(Stage::Briefs, e))?;
        Ok(outcome)
    }

    async fn save_checkpoint(
        &self,
        spec: &ProjectSpec,
        stage: Stage,
        payload: serde_json::Value,
    ) -> Result<(), PipelineError> {
        self.deps
            .store
            .save_checkpoint(spec.id, stage, payload)
            .await
            .map_err(|e| stage_err(stage, e))
    }
}

struct EnrichOutcome {
    record: KeywordRecord,
    snapshot: Option<SerpSnapshot>,
    /// False when cancellation skipped the task before any call was issued.
    started: bool,
}

fn flag_for(err: &FetchError) -> SkipFlag {
    match err {
        FetchError::Auth { .. } => SkipFlag::Auth,
        FetchError::Client { .. } => SkipFlag::Client,
        FetchError::RateLimited { .. } => SkipFlag::RateLimited,
        FetchError::Server { .. } | FetchError::Timeout { .. } => SkipFlag::Transient,
        FetchError::QuotaExceeded { .. } => SkipFlag::QuotaExhausted,
    }
}

fn stage_err(stage: Stage, source: anyhow::Error) -> PipelineError {
    PipelineError::Stage { stage, source }
}

fn to_value<T: serde::Serialize>(payload: T) -> serde_json::Value {
    serde_json::to_value(payload).unwrap_or_default()
}
