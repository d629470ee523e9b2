use keyloom_common::config::ScoringConfig;
use keyloom_common::{DifficultyComponents, SerpFeatures, SerpResult, SerpSnapshot};

/// Domains strong enough that outranking them is a different game.
const BIG_BRANDS: [&str; 15] = [
    "wikipedia",
    "youtube",
    "amazon",
    "facebook",
    "twitter",
    "linkedin",
    "reddit",
    "instagram",
    "tiktok",
    "forbes",
    "nytimes",
    "cnn",
    "bbc",
    "medium",
    "quora",
];

/// Weights of the four sub-scores in the composite.
const W_SERP_STRENGTH: f64 = 0.4;
const W_COMPETITION: f64 = 0.3;
const W_CROWDING: f64 = 0.2;
const W_CONTENT_DEPTH: f64 = 0.1;

/// Snippet length at which competing content counts as deep.
const DEEP_SNIPPET_CHARS: f64 = 200.0;

/// Ad count at which the page counts as fully crowded.
const ADS_SATURATION: f64 = 4.0;

/// Compute difficulty for one keyword. Sub-scores are each normalized to
/// [0,1] before weighting; the composite lands in [0,100].
///
/// Without a snapshot the configured default composite is used, components
/// sit at the midpoint, and the result is marked estimated.
pub fn difficulty(snapshot: Option<&SerpSnapshot>, config: &ScoringConfig) -> DifficultyComponents {
    let Some(snapshot) = snapshot else {
        return DifficultyComponents {
            serp_strength: 0.5,
            competition: 0.5,
            crowding: 0.5,
            content_depth: 0.5,
            composite: config.default_difficulty.clamp(0.0, 100.0),
            estimated: true,
        };
    };

    let serp_strength = serp_strength(&snapshot.results, &snapshot.features);
    let competition = competition(&snapshot.results);
    let crowding = crowding(&snapshot.features);
    let content_depth = content_depth(&snapshot.results);

    let composite = (serp_strength * W_SERP_STRENGTH
        + competition * W_COMPETITION
        + crowding * W_CROWDING
        + content_depth * W_CONTENT_DEPTH)
        * 100.0;

    DifficultyComponents {
        serp_strength,
        competition,
        crowding,
        content_depth,
        composite: composite.clamp(0.0, 100.0),
        estimated: false,
    }
}

/// Authority of the ranking pages: homepage share and brand share of the
/// top 5, plus knowledge-graph and featured-snippet presence.
fn serp_strength(results: &[SerpResult], features: &SerpFeatures) -> f64 {
    if results.is_empty() {
        return 0.5;
    }
    let top = &results[..results.len().min(5)];
    let homepage_ratio = top.iter().filter(|r| r.is_homepage).count() as f64 / top.len() as f64;
    let brand_ratio = top.iter().filter(|r| is_big_brand(&r.domain)).count() as f64 / top.len() as f64;

    let mut score = homepage_ratio * 0.3 + brand_ratio * 0.4;
    if features.has_knowledge_graph {
        score += 0.15;
    }
    if features.has_featured_snippet {
        score += 0.15;
    }
    score.min(1.0)
}

/// Share of the top 10 whose title carries the query as an exact phrase.
fn competition(results: &[SerpResult]) -> f64 {
    if results.is_empty() {
        return 0.5;
    }
    let top = &results[..results.len().min(10)];
    top.iter().filter(|r| r.title_match).count() as f64 / top.len() as f64
}

/// Ads plus feature flags squeezing the organic results.
fn crowding(features: &SerpFeatures) -> f64 {
    let ads = (features.ads_count as f64 / ADS_SATURATION).min(1.0);
    let flags = features.flags_present() as f64 / SerpFeatures::FLAG_SLOTS as f64;
    ads * 0.5 + flags * 0.5
}

/// Snippet length of the top 5 as a proxy for how deep competing content runs.
fn content_depth(results: &[SerpResult]) -> f64 {
    if results.is_empty() {
        return 0.5;
    }
    let top = &results[..results.len().min(5)];
    let avg = top.iter().map(|r| r.snippet_chars as f64).sum::<f64>() / top.len() as f64;
    (avg / DEEP_SNIPPET_CHARS).min(1.0)
}

fn is_big_brand(domain: &str) -> bool {
    let domain = domain.to_lowercase();
    BIG_BRANDS.iter().any(|brand| domain.contains(brand))
}
