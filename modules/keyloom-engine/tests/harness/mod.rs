// Shared wiring for pipeline integration tests: scripted gateway clients
// plus in-memory collaborators, so a full run needs no network and no
// database.
#![allow(dead_code)] // each test binary uses a different slice of this

use std::sync::Arc;

use keyloom_common::{Intent, PipelineConfig, ProjectSpec, SourceTag, TrendSummary};
use keyloom_engine::testing::{
    test_project, CollectSink, FixedAnnotator, HashEmbedder, LowercaseNormalizer, MemoryStore,
    StaticExpander,
};
use keyloom_engine::traits::KeywordExpander;
use keyloom_engine::{EngineDeps, Pipeline, PipelineOutcome};
use keyloom_gateway::testing::ScriptedClient;
use keyloom_gateway::{AccessGateway, ResponseCache, SourcePayload};

pub struct Harness {
    pub deps: EngineDeps,
    pub config: PipelineConfig,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<CollectSink>,
}

impl Harness {
    /// A fresh pipeline over the same collaborators, as a restarted
    /// process would construct one.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.deps.clone(), self.config.clone())
    }
}

pub struct HarnessBuilder {
    candidates: Vec<String>,
    serp: ScriptedClient,
    ads: ScriptedClient,
    trends: ScriptedClient,
    config: PipelineConfig,
    expander: Option<Arc<dyn KeywordExpander>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
            serp: ScriptedClient::new(),
            ads: ScriptedClient::new(),
            trends: ScriptedClient::new()
                .respond(SourcePayload::Trend(TrendSummary::from_delta(0.1, false))),
            config: PipelineConfig::default(),
            expander: None,
        }
    }

    pub fn candidates(mut self, texts: &[&str]) -> Self {
        self.candidates = texts.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn serp(mut self, client: ScriptedClient) -> Self {
        self.serp = client;
        self
    }

    pub fn ads(mut self, client: ScriptedClient) -> Self {
        self.ads = client;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn expander(mut self, expander: Arc<dyn KeywordExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn build(self) -> Harness {
        keyloom_common::init_tracing();
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(CollectSink::new());

        let gateway = Arc::new(
            AccessGateway::new(
                &self.config.sources,
                self.config.retry,
                Arc::new(ResponseCache::new()),
            )
            .with_client(SourceTag::Serp, Arc::new(self.serp))
            .with_client(SourceTag::Ads, Arc::new(self.ads))
            .with_client(SourceTag::Trends, Arc::new(self.trends)),
        );

        let expander: Arc<dyn KeywordExpander> = self.expander.unwrap_or_else(|| {
            let refs: Vec<&str> = self.candidates.iter().map(String::as_str).collect();
            Arc::new(StaticExpander::new(&refs))
        });

        let deps = EngineDeps::builder()
            .gateway(gateway)
            .expander(expander)
            .normalizer(Arc::new(LowercaseNormalizer))
            .annotator(Arc::new(FixedAnnotator(Intent::Informational)))
            .embedder(Arc::new(HashEmbedder))
            .store(store.clone())
            .briefs(sink.clone())
            .build();

        Harness {
            deps,
            config: self.config,
            store,
            sink,
        }
    }
}

pub fn project(seeds: &[&str]) -> ProjectSpec {
    test_project(seeds)
}

/// Comparable summary of an outcome: per-keyword metrics plus cluster
/// membership and hubs, all keyed by normalized text so record ids and
/// ordering stay out of the comparison.
pub fn fingerprint(outcome: &PipelineOutcome) -> Fingerprint {
    let mut keywords: Vec<(String, Option<u64>, Option<u64>, Option<u64>)> = outcome
        .records
        .iter()
        .map(|r| {
            (
                r.normalized.clone(),
                r.volume,
                r.traffic_potential.map(|t| (t * 1000.0).round() as u64),
                r.opportunity.map(|o| (o * 1000.0).round() as u64),
            )
        })
        .collect();
    keywords.sort();

    let text_of = |id: &uuid::Uuid| -> String {
        outcome
            .records
            .iter()
            .find(|r| r.id == *id)
            .map(|r| r.normalized.clone())
            .unwrap_or_default()
    };

    let mut topics: Vec<(Vec<String>, String)> = outcome
        .clusters
        .topics
        .iter()
        .map(|t| {
            let mut members: Vec<String> = t.topic.member_ids.iter().map(|id| text_of(id)).collect();
            members.sort();
            (members, text_of(&t.topic.hub_id))
        })
        .collect();
    topics.sort();

    Fingerprint { keywords, topics }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub keywords: Vec<(String, Option<u64>, Option<u64>, Option<u64>)>,
    pub topics: Vec<(Vec<String>, String)>,
}
