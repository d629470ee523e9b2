pub mod config;
pub mod error;
pub mod types;
pub mod util;

pub use config::PipelineConfig;
pub use error::CoreError;
pub use types::*;
pub use util::{cosine_similarity, init_tracing, query_fingerprint};
