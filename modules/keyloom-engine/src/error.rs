use thiserror::Error;
use uuid::Uuid;

use keyloom_common::Stage;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The resume payload failed validation. Fatal for the run; the caller
    /// should restart without resuming so state is rebuilt from scratch.
    #[error(
        "Checkpoint for project {project_id} is corrupt ({reason}); \
         restart the run without resume to rebuild pipeline state"
    )]
    CheckpointCorruption { project_id: Uuid, reason: String },

    #[error("Project {project_id} already ran to completion")]
    AlreadyCompleted { project_id: Uuid },

    /// Cooperative cancellation between stages or worker tasks. Durable
    /// work already written stays committed; resume picks up from there.
    #[error("Run cancelled during {stage} stage")]
    Cancelled { stage: Stage },

    /// A collaborator failed in a way the stage cannot degrade around.
    #[error("{stage} stage failed")]
    Stage {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}
