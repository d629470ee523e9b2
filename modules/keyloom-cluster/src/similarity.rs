use std::collections::HashSet;

use keyloom_common::cosine_similarity;

/// Jaccard overlap of whitespace tokens. Callers pass normalized forms,
/// so casing is already settled.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

/// Blend of semantic and lexical similarity. `semantic_weight` 1.0 means
/// embeddings only; 0.0 means token overlap only. A missing embedding on
/// either side zeroes the semantic term, so the lexical share still holds.
pub fn hybrid_similarity(
    text_a: &str,
    text_b: &str,
    embedding_a: Option<&[f32]>,
    embedding_b: Option<&[f32]>,
    semantic_weight: f64,
) -> f64 {
    let semantic = match (embedding_a, embedding_b) {
        (Some(a), Some(b)) => cosine_similarity(a, b),
        _ => 0.0,
    };
    let lexical = jaccard_similarity(text_a, text_b);
    semantic_weight * semantic + (1.0 - semantic_weight) * lexical
}

/// Distance form of the hybrid metric, for the merge loop.
pub fn hybrid_distance(
    text_a: &str,
    text_b: &str,
    embedding_a: Option<&[f32]>,
    embedding_b: Option<&[f32]>,
    semantic_weight: f64,
) -> f64 {
    1.0 - hybrid_similarity(text_a, text_b, embedding_a, embedding_b, semantic_weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_of_identical_is_one() {
        assert_eq!(jaccard_similarity("seo tools", "seo tools"), 1.0);
    }

    #[test]
    fn jaccard_of_disjoint_is_zero() {
        assert_eq!(jaccard_similarity("seo tools", "pizza recipes"), 0.0);
    }

    #[test]
    fn jaccard_partial_overlap() {
        // {best, seo, tools} vs {seo, tools, free}: 2 shared of 4 total.
        let sim = jaccard_similarity("best seo tools", "seo tools free");
        assert!((sim - 0.5).abs() < 1e-9);
    }

    #[test]
    fn hybrid_weight_blends_the_terms() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0];
        // Semantic 1.0, lexical 0.0: half weight gives 0.5.
        let sim = hybrid_similarity("alpha", "beta", Some(&a), Some(&b), 0.5);
        assert!((sim - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_embeddings_fall_back_to_lexical_share() {
        let sim = hybrid_similarity("seo tools", "seo tools", None, None, 0.5);
        assert!((sim - 0.5).abs() < 1e-9);
    }

    #[test]
    fn distance_complements_similarity() {
        let a = vec![1.0, 0.0];
        let d = hybrid_distance("x y", "x y", Some(&a), Some(&a), 0.5);
        assert!(d.abs() < 1e-9);
    }
}
