use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use keyloom_common::config::ScoringConfig;
use keyloom_common::{Intent, KeywordRecord, SerpSnapshot};

use crate::ctr::traffic_potential;
use crate::difficulty::difficulty;
use crate::opportunity::{normalize_batch, raw_opportunity};

/// Score a batch of enriched records in place: difficulty, traffic
/// potential, and batch-normalized opportunity.
///
/// Records without a snapshot get estimated difficulty; records without
/// volume score zero traffic and zero opportunity. Opportunity values are
/// comparable only within this batch.
pub fn score_batch(
    records: &mut [KeywordRecord],
    snapshots: &HashMap<Uuid, SerpSnapshot>,
    content_focus: Intent,
    config: &ScoringConfig,
) {
    let mut raws = Vec::with_capacity(records.len());

    for record in records.iter_mut() {
        let snapshot = snapshots.get(&record.id);
        let d = difficulty(snapshot, config);

        let features = record.serp_features.unwrap_or_default();
        let volume = record.volume.unwrap_or(0);
        let traffic = traffic_potential(volume, record.intent, &features, config);

        let raw = raw_opportunity(
            traffic,
            d.composite,
            record.cpc.unwrap_or(0.0),
            record.intent,
            content_focus,
            &features,
            config,
        );

        record.difficulty = Some(d);
        record.traffic_potential = Some(traffic);
        raws.push(raw);
    }

    let normalized = normalize_batch(&raws);
    for (record, score) in records.iter_mut().zip(normalized) {
        record.opportunity = Some(score);
    }

    let estimated = records
        .iter()
        .filter(|r| r.difficulty.is_some_and(|d| d.estimated))
        .count();
    info!(
        scored = records.len(),
        estimated_difficulty = estimated,
        "Scoring pass complete"
    );
}
