use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for binaries and long tests.
/// `RUST_LOG` overrides; defaults to info for this workspace.
pub fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("keyloom=info".parse().expect("valid directive"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Fast fingerprint for audit records. Not cryptographic; exists so raw
/// queries never land in the audit trail.
pub fn query_fingerprint(query: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    query.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Cosine similarity for f32 embedding vectors. Returns 0.0 for zero-norm
/// or mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}
