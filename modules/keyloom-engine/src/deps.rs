use std::sync::Arc;

use typed_builder::TypedBuilder;

use keyloom_gateway::AccessGateway;

use crate::traits::{
    BriefConsumer, KeywordAnnotator, KeywordExpander, KeywordNormalizer, PipelineStore,
    TextEmbedder,
};

/// Dependency container for the orchestrator: the gateway plus every
/// external collaborator, all long-lived and cloneable.
#[derive(Clone, TypedBuilder)]
pub struct EngineDeps {
    pub gateway: Arc<AccessGateway>,
    pub expander: Arc<dyn KeywordExpander>,
    pub normalizer: Arc<dyn KeywordNormalizer>,
    pub annotator: Arc<dyn KeywordAnnotator>,
    pub embedder: Arc<dyn TextEmbedder>,
    pub store: Arc<dyn PipelineStore>,
    pub briefs: Arc<dyn BriefConsumer>,
}
