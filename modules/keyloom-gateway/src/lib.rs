pub mod audit;
pub mod cache;
pub mod error;
pub mod gateway;
pub mod quota;
pub mod rate_limit;
pub mod source;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use audit::{AuditLog, AuditRecord, CallOutcome};
pub use cache::{CacheKey, ResponseCache};
pub use error::FetchError;
pub use gateway::AccessGateway;
pub use quota::QuotaLedger;
pub use rate_limit::TokenBucket;
pub use source::{CallParams, SourceClient, SourcePayload};
