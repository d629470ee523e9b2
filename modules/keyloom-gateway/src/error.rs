use keyloom_common::SourceTag;

/// Failure taxonomy for gateway calls. Retryability drives the backoff
/// loop; fatality scope (keyword vs source vs run) is decided upstream.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Invalid credentials or permissions. Fatal for the source this run.
    Auth { source: SourceTag, message: String },

    /// Malformed request or unsupported query. Never retried.
    Client { source: SourceTag, message: String },

    /// Provider said slow down. Retried with backoff.
    RateLimited { source: SourceTag },

    /// Transient provider failure. Retried with backoff.
    Server { source: SourceTag, message: String },

    /// Call deadline exceeded. Eligible for a single retry.
    Timeout { source: SourceTag },

    /// Hard per-run quota would be exceeded. Fatal for the source this run;
    /// the call was never attempted.
    QuotaExceeded { source: SourceTag },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Auth { source, message } => {
                write!(f, "Auth failure for {source}: {message}")
            }
            FetchError::Client { source, message } => {
                write!(f, "Client error for {source}: {message}")
            }
            FetchError::RateLimited { source } => write!(f, "Rate limited by {source}"),
            FetchError::Server { source, message } => {
                write!(f, "Server error from {source}: {message}")
            }
            FetchError::Timeout { source } => write!(f, "Timeout calling {source}"),
            FetchError::QuotaExceeded { source } => write!(f, "Quota exhausted for {source}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Whether the backoff loop may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. } | FetchError::Server { .. } | FetchError::Timeout { .. }
        )
    }

    /// Errors that end the source for the remainder of the run.
    pub fn is_source_fatal(&self) -> bool {
        matches!(self, FetchError::Auth { .. } | FetchError::QuotaExceeded { .. })
    }

    pub fn source(&self) -> SourceTag {
        match self {
            FetchError::Auth { source, .. }
            | FetchError::Client { source, .. }
            | FetchError::RateLimited { source }
            | FetchError::Server { source, .. }
            | FetchError::Timeout { source }
            | FetchError::QuotaExceeded { source } => *source,
        }
    }
}
