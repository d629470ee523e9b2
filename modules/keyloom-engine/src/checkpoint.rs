//! Checkpoint payload schemas and resume-point validation.
//!
//! The stage order itself lives on [`Stage`]; this module owns what goes
//! into each stage's resume payload and how a loaded checkpoint is turned
//! into a safe place to resume from.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keyloom_common::{Checkpoint, Stage};

use crate::error::PipelineError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpansionPayload {
    pub keyword_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub enriched: usize,
    pub flagged: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingPayload {
    pub annotated: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringPayload {
    pub scored: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusteringPayload {
    pub topics: usize,
    pub pages: usize,
}

/// Validate a loaded checkpoint and return the stage to resume at: the
/// stage strictly after the checkpointed one.
///
/// A payload that does not deserialize against its stage's schema means
/// the stored state cannot be trusted; that is fatal for the resume path.
pub fn resume_point(checkpoint: &Checkpoint) -> Result<Stage, PipelineError> {
    validate_payload(checkpoint)?;

    match checkpoint.stage {
        Stage::Completed => Err(PipelineError::AlreadyCompleted {
            project_id: checkpoint.project_id,
        }),
        stage => stage.next().ok_or(PipelineError::AlreadyCompleted {
            project_id: checkpoint.project_id,
        }),
    }
}

fn validate_payload(checkpoint: &Checkpoint) -> Result<(), PipelineError> {
    let corrupt = |reason: String| PipelineError::CheckpointCorruption {
        project_id: checkpoint.project_id,
        reason,
    };
    let payload = checkpoint.payload.clone();

    let result = match checkpoint.stage {
        Stage::Created | Stage::Briefs | Stage::Completed => Ok(()),
        Stage::Expansion => check::<ExpansionPayload>(payload),
        Stage::Metrics => check::<MetricsPayload>(payload),
        Stage::Processing => check::<ProcessingPayload>(payload),
        Stage::Scoring => check::<ScoringPayload>(payload),
        Stage::Clustering => check::<ClusteringPayload>(payload),
    };
    result.map_err(|e| corrupt(format!("{} payload: {e}", checkpoint.stage)))
}

fn check<T: for<'de> Deserialize<'de>>(payload: serde_json::Value) -> Result<(), serde_json::Error> {
    serde_json::from_value::<T>(payload).map(|_| ())
}

/// Convenience constructor used by the orchestrator's checkpoint writes.
pub fn checkpoint_now(project_id: Uuid, stage: Stage, payload: serde_json::Value) -> Checkpoint {
    Checkpoint {
        project_id,
        stage,
        saved_at: chrono::Utc::now(),
        payload,
    }
}
