use keyloom_common::config::ScoringConfig;
use keyloom_common::{Intent, SerpFeatures};

/// Knowledge-graph presence adds this to the difficulty denominator: a
/// branded panel means the query is owned before the organic list starts.
const BRAND_CROWDING_PENALTY: f64 = 10.0;

/// Unnormalized opportunity:
/// `log1p(traffic · cpc_weight · intent_fit) / (difficulty + brand_crowding)`.
///
/// The denominator is floored at 1 so even trivially easy keywords divide
/// by something. Zero traffic gives exactly zero.
pub fn raw_opportunity(
    traffic_potential: f64,
    difficulty_composite: f64,
    cpc: f64,
    intent: Option<Intent>,
    content_focus: Intent,
    features: &SerpFeatures,
    config: &ScoringConfig,
) -> f64 {
    if traffic_potential <= 0.0 {
        return 0.0;
    }

    // Commercial value amplifies up to 3x; non-commercial intents ignore CPC.
    let cpc_weight = match intent {
        Some(Intent::Commercial) | Some(Intent::Transactional) => 1.0 + (cpc / 10.0).min(2.0),
        _ => 1.0,
    };

    let intent_fit = match intent {
        Some(i) if i == content_focus => config.intent_fit_boost,
        _ => 1.0,
    };

    let brand_crowding = if features.has_knowledge_graph {
        BRAND_CROWDING_PENALTY
    } else {
        0.0
    };

    let numerator = (traffic_potential * cpc_weight * intent_fit).ln_1p();
    numerator / (difficulty_composite + brand_crowding).max(1.0)
}

/// Min-max normalize raw opportunities across one batch to [0,100].
///
/// Batch-relative by design: resulting scores are only comparable within
/// this batch. Zero raws stay zero; a batch with no spread maps every
/// nonzero raw to the top of the range.
pub fn normalize_batch(raws: &[f64]) -> Vec<f64> {
    let min = raws.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raws.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    raws.iter()
        .map(|&raw| {
            if raw <= 0.0 {
                0.0
            } else if max - min < f64::EPSILON {
                100.0
            } else {
                ((raw - min) / (max - min) * 100.0).clamp(0.0, 100.0)
            }
        })
        .collect()
}
