use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Closed failure taxonomy. Retryability is a property of the category,
/// never of an individual error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    Network,
    Timeout,
    RateLimit,
    ServiceUnavailable,
    QuotaExceeded,
    InvalidData,
    ParsingError,
    InsufficientContent,
    UnsupportedLanguage,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 10] = [
        ErrorCategory::Network,
        ErrorCategory::Timeout,
        ErrorCategory::RateLimit,
        ErrorCategory::ServiceUnavailable,
        ErrorCategory::QuotaExceeded,
        ErrorCategory::InvalidData,
        ErrorCategory::ParsingError,
        ErrorCategory::InsufficientContent,
        ErrorCategory::UnsupportedLanguage,
        ErrorCategory::Unknown,
    ];

    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::RateLimit
                | ErrorCategory::ServiceUnavailable
                | ErrorCategory::QuotaExceeded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::RateLimit => "rateLimit",
            ErrorCategory::ServiceUnavailable => "serviceUnavailable",
            ErrorCategory::QuotaExceeded => "quotaExceeded",
            ErrorCategory::InvalidData => "invalidData",
            ErrorCategory::ParsingError => "parsingError",
            ErrorCategory::InsufficientContent => "insufficientContent",
            ErrorCategory::UnsupportedLanguage => "unsupportedLanguage",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps arbitrary failures onto [`ErrorCategory`].
pub struct ErrorClassifier;

/// Message fragments checked against the lowercased error chain when no
/// typed cause is found. Earlier rows take precedence.
const MESSAGE_RULES: &[(&str, ErrorCategory)] = &[
    ("timed out", ErrorCategory::Timeout),
    ("timeout", ErrorCategory::Timeout),
    ("deadline", ErrorCategory::Timeout),
    ("aborted", ErrorCategory::Timeout),
    ("cancelled", ErrorCategory::Timeout),
    ("too many requests", ErrorCategory::RateLimit),
    ("rate limit", ErrorCategory::RateLimit),
    ("rate-limit", ErrorCategory::RateLimit),
    ("429", ErrorCategory::RateLimit),
    ("service unavailable", ErrorCategory::ServiceUnavailable),
    ("overloaded", ErrorCategory::ServiceUnavailable),
    ("503", ErrorCategory::ServiceUnavailable),
    ("502", ErrorCategory::ServiceUnavailable),
    ("quota", ErrorCategory::QuotaExceeded),
    ("insufficient credits", ErrorCategory::QuotaExceeded),
    ("billing", ErrorCategory::QuotaExceeded),
    ("econnreset", ErrorCategory::Network),
    ("econnrefused", ErrorCategory::Network),
    ("connection", ErrorCategory::Network),
    ("network", ErrorCategory::Network),
    ("dns", ErrorCategory::Network),
    ("unsupported language", ErrorCategory::UnsupportedLanguage),
    ("insufficient content", ErrorCategory::InsufficientContent),
    ("too short", ErrorCategory::InsufficientContent),
    ("unexpected token", ErrorCategory::ParsingError),
    ("json", ErrorCategory::ParsingError),
    ("parse", ErrorCategory::ParsingError),
    ("invalid", ErrorCategory::InvalidData),
    ("malformed", ErrorCategory::InvalidData),
];

impl ErrorClassifier {
    /// Classify a failure. Typed causes anywhere in the chain win over
    /// message matching; anything unrecognised is `Unknown`.
    pub fn classify(err: &anyhow::Error) -> ErrorCategory {
        for cause in err.chain() {
            if let Some(category) = Self::classify_typed(cause) {
                return category;
            }
        }
        Self::classify_message(&format!("{err:#}"))
    }

    fn classify_typed(cause: &(dyn std::error::Error + 'static)) -> Option<ErrorCategory> {
        if let Some(e) = cause.downcast_ref::<AnalysisError>() {
            return Some(Self::from_analysis_error(e));
        }
        if cause.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
            return Some(ErrorCategory::Timeout);
        }
        if let Some(e) = cause.downcast_ref::<serde_json::Error>() {
            return Some(if e.is_io() {
                ErrorCategory::Network
            } else {
                ErrorCategory::ParsingError
            });
        }
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            return Self::from_io_kind(e.kind());
        }
        None
    }

    fn from_analysis_error(err: &AnalysisError) -> ErrorCategory {
        match err {
            AnalysisError::Network(_) => ErrorCategory::Network,
            AnalysisError::Http { status, .. } => Self::from_status(*status),
            AnalysisError::RateLimited { .. } => ErrorCategory::RateLimit,
            AnalysisError::QuotaExceeded(_) => ErrorCategory::QuotaExceeded,
            AnalysisError::DeadlineExceeded { .. } | AnalysisError::Cancelled => {
                ErrorCategory::Timeout
            }
            AnalysisError::Parse(_) => ErrorCategory::ParsingError,
            AnalysisError::InvalidData(_) => ErrorCategory::InvalidData,
            AnalysisError::InsufficientContent { .. } => ErrorCategory::InsufficientContent,
            AnalysisError::UnsupportedLanguage(_) => ErrorCategory::UnsupportedLanguage,
        }
    }

    /// HTTP status to category.
    pub fn from_status(status: u16) -> ErrorCategory {
        match status {
            429 => ErrorCategory::RateLimit,
            502..=504 => ErrorCategory::ServiceUnavailable,
            408 => ErrorCategory::Timeout,
            402 => ErrorCategory::QuotaExceeded,
            400 | 422 => ErrorCategory::InvalidData,
            _ => ErrorCategory::Unknown,
        }
    }

    fn from_io_kind(kind: io::ErrorKind) -> Option<ErrorCategory> {
        match kind {
            io::ErrorKind::TimedOut => Some(ErrorCategory::Timeout),
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Some(ErrorCategory::Network),
            io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => {
                Some(ErrorCategory::InvalidData)
            }
            _ => None,
        }
    }

    fn classify_message(message: &str) -> ErrorCategory {
        let lower = message.to_lowercase();
        MESSAGE_RULES
            .iter()
            .find(|(needle, _)| lower.contains(needle))
            .map(|&(_, category)| category)
            .unwrap_or(ErrorCategory::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn retryability_table() {
        let retryable: Vec<_> = ErrorCategory::ALL
            .into_iter()
            .filter(|c| c.is_retryable())
            .collect();
        assert_eq!(
            retryable,
            vec![
                ErrorCategory::Network,
                ErrorCategory::Timeout,
                ErrorCategory::RateLimit,
                ErrorCategory::ServiceUnavailable,
                ErrorCategory::QuotaExceeded,
            ]
        );
    }

    #[test]
    fn typed_analysis_errors() {
        let cases = [
            (AnalysisError::Network("reset".into()), ErrorCategory::Network),
            (AnalysisError::RateLimited { retry_after_ms: Some(500) }, ErrorCategory::RateLimit),
            (AnalysisError::QuotaExceeded("monthly".into()), ErrorCategory::QuotaExceeded),
            (AnalysisError::DeadlineExceeded { limit_ms: 10 }, ErrorCategory::Timeout),
            (AnalysisError::Cancelled, ErrorCategory::Timeout),
            (AnalysisError::Parse("eof".into()), ErrorCategory::ParsingError),
            (AnalysisError::InvalidData("no id".into()), ErrorCategory::InvalidData),
            (
                AnalysisError::InsufficientContent { words: 1, required: 10 },
                ErrorCategory::InsufficientContent,
            ),
            (AnalysisError::UnsupportedLanguage("xx".into()), ErrorCategory::UnsupportedLanguage),
        ];
        for (err, expected) in cases {
            assert_eq!(ErrorClassifier::classify(&anyhow::Error::new(err)), expected);
        }
    }

    #[test]
    fn http_statuses() {
        let classify = |status| {
            ErrorClassifier::classify(&anyhow::Error::new(AnalysisError::Http {
                status,
                message: String::new(),
            }))
        };
        assert_eq!(classify(429), ErrorCategory::RateLimit);
        assert_eq!(classify(503), ErrorCategory::ServiceUnavailable);
        assert_eq!(classify(504), ErrorCategory::ServiceUnavailable);
        assert_eq!(classify(402), ErrorCategory::QuotaExceeded);
        assert_eq!(classify(422), ErrorCategory::InvalidData);
        assert_eq!(classify(500), ErrorCategory::Unknown);
    }

    #[test]
    fn typed_cause_behind_context() {
        let err = Err::<(), _>(AnalysisError::RateLimited { retry_after_ms: None })
            .context("calling analysis gateway")
            .unwrap_err();
        assert_eq!(ErrorClassifier::classify(&err), ErrorCategory::RateLimit);
    }

    #[test]
    fn io_errors_by_kind() {
        let reset = anyhow::Error::new(io::Error::new(io::ErrorKind::ConnectionReset, "peer"));
        assert_eq!(ErrorClassifier::classify(&reset), ErrorCategory::Network);

        let timed_out = anyhow::Error::new(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(ErrorClassifier::classify(&timed_out), ErrorCategory::Timeout);
    }

    #[test]
    fn serde_json_errors_are_parsing() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(
            ErrorClassifier::classify(&anyhow::Error::new(err)),
            ErrorCategory::ParsingError
        );
    }

    #[tokio::test]
    async fn elapsed_is_timeout() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            ErrorClassifier::classify(&anyhow::Error::new(elapsed)),
            ErrorCategory::Timeout
        );
    }

    #[test]
    fn message_fallbacks() {
        let classify = |msg: &str| ErrorClassifier::classify(&anyhow!(msg.to_string()));
        assert_eq!(classify("Request timed out after 30s"), ErrorCategory::Timeout);
        assert_eq!(classify("HTTP 429 Too Many Requests"), ErrorCategory::RateLimit);
        assert_eq!(classify("upstream overloaded"), ErrorCategory::ServiceUnavailable);
        assert_eq!(classify("Quota exhausted for key"), ErrorCategory::QuotaExceeded);
        assert_eq!(classify("ECONNRESET"), ErrorCategory::Network);
        assert_eq!(classify("Unexpected token < in JSON"), ErrorCategory::ParsingError);
        assert_eq!(classify("story text too short"), ErrorCategory::InsufficientContent);
        assert_eq!(classify("unsupported language: tlh"), ErrorCategory::UnsupportedLanguage);
        assert_eq!(classify("invalid story payload"), ErrorCategory::InvalidData);
        assert_eq!(classify("something odd happened"), ErrorCategory::Unknown);
    }

    #[test]
    fn category_serializes_camel_case() {
        let json = serde_json::to_string(&ErrorCategory::ServiceUnavailable).unwrap();
        assert_eq!(json, "\"serviceUnavailable\"");
        assert_eq!(ErrorCategory::RateLimit.to_string(), "rateLimit");
    }
}
