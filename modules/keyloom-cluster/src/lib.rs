//! Two-pass hierarchical keyword clustering: coarse topic groups, then
//! tight page groups within each topic, with deterministic hub selection
//! and a sibling link graph between page hubs.
//!
//! Deterministic by construction: records are sorted on entry, the merge
//! loop breaks distance ties by index order, and hub ties fall back to
//! traffic then lexicographic order. No randomness anywhere.

pub mod agglomerative;
pub mod engine;
pub mod similarity;

pub use engine::ClusterEngine;
pub use similarity::hybrid_similarity;
