use keyloom_common::config::{FeatureSignature, ScoringConfig};
use keyloom_common::{Intent, SerpFeatures};

/// Fallback CTR percent when the table carries no curves at all.
const FLOOR_CTR: f64 = 2.0;

/// Estimated monthly clicks at the configured target rank.
///
/// The curve is picked by the feature signature of the results page (exact
/// match, else closest by flag distance), then the CTR is adjusted by the
/// keyword's intent category. Zero volume yields zero, never NaN.
pub fn traffic_potential(
    volume: u64,
    intent: Option<Intent>,
    features: &SerpFeatures,
    config: &ScoringConfig,
) -> f64 {
    if volume == 0 {
        return 0.0;
    }

    let signature = FeatureSignature {
        featured_snippet: features.has_featured_snippet,
        local_pack: features.has_local_pack,
    };
    let ctr_percent = config
        .ctr_table
        .curve_for(signature)
        .map(|curve| curve.at_rank(config.target_rank))
        .unwrap_or(FLOOR_CTR);

    let adjust = intent
        .and_then(|i| config.intent_adjust.get(&i).copied())
        .unwrap_or(1.0);

    volume as f64 * (ctr_percent / 100.0) * adjust
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_volume_is_zero() {
        let config = ScoringConfig::default();
        let t = traffic_potential(0, Some(Intent::Commercial), &SerpFeatures::default(), &config);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn clean_serp_uses_the_baseline_curve() {
        // Rank 3 on the clean curve is 18.7%: 1000 * 0.187 = 187 clicks.
        let config = ScoringConfig::default();
        let t = traffic_potential(1000, Some(Intent::Informational), &SerpFeatures::default(), &config);
        assert!((t - 187.0).abs() < 0.01, "traffic: {t}");
    }

    #[test]
    fn featured_snippet_suppresses_clicks() {
        let config = ScoringConfig::default();
        let clean = traffic_potential(1000, None, &SerpFeatures::default(), &config);
        let snippet = traffic_potential(
            1000,
            None,
            &SerpFeatures {
                has_featured_snippet: true,
                ..Default::default()
            },
            &config,
        );
        assert!(snippet < clean);
    }

    #[test]
    fn commercial_intent_dampens_the_estimate() {
        let config = ScoringConfig::default();
        let info = traffic_potential(1000, Some(Intent::Informational), &SerpFeatures::default(), &config);
        let commercial = traffic_potential(1000, Some(Intent::Commercial), &SerpFeatures::default(), &config);
        assert!((commercial - info * 0.6).abs() < 0.01);
    }

    #[test]
    fn traffic_is_never_negative() {
        let config = ScoringConfig::default();
        for volume in [0u64, 1, 10, 100_000] {
            for intent in [None, Some(Intent::Local), Some(Intent::Transactional)] {
                let t = traffic_potential(volume, intent, &SerpFeatures::default(), &config);
                assert!(t >= 0.0);
            }
        }
    }
}
