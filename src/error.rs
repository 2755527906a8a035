use thiserror::Error;

/// Errors that fail a whole run. Job-level failures never end up here;
/// they are recorded as [`ProcessingError`](crate::job::ProcessingError) values.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Invalid configuration: `{field}` {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Unsupported job file format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BatchError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        BatchError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Typed failures an analyzer can return. The classifier recognises these
/// anywhere in an `anyhow` error chain.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("attempt exceeded deadline of {limit_ms}ms")]
    DeadlineExceeded { limit_ms: u64 },

    #[error("attempt was cancelled")]
    Cancelled,

    #[error("failed to parse analysis output: {0}")]
    Parse(String),

    #[error("invalid input data: {0}")]
    InvalidData(String),

    #[error("insufficient content: {words} words, at least {required} required")]
    InsufficientContent { words: usize, required: usize },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}
