//! Typed error taxonomy for the redaction pipeline.
//!
//! Every stage boundary returns one of these variants rather than an
//! opaque `anyhow::Error` so that callers (in particular the Verifier's
//! retry/degradation logic) can branch on error *kind*. Internal,
//! non-crossing-a-stage-boundary plumbing still uses `anyhow::Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PiiError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("extraction produced no text")]
    EmptyExtraction,

    #[error("NER model unavailable: {0}")]
    NerModelMissing(String),

    #[error("mapping file is corrupt: {0}")]
    MappingCorrupt(String),

    #[error("verify API key is invalid or missing")]
    InvalidApiKey,

    #[error("verify API credits exhausted ({credits_remaining} remaining)")]
    InsufficientCredits {
        credits_remaining: f64,
        purchase_url: String,
    },

    #[error("verify API rate limited, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    #[error("verify API error: {0}")]
    VerifyOther(String),

    #[error("verify request timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("pipeline run was cancelled")]
    Cancelled,
}

impl PiiError {
    /// Short category name, used for log fields and canary/audit counters.
    pub fn category(&self) -> &'static str {
        match self {
            PiiError::UnsupportedFormat(_) => "UnsupportedFormat",
            PiiError::EmptyExtraction => "EmptyExtraction",
            PiiError::NerModelMissing(_) => "NERModelMissing",
            PiiError::MappingCorrupt(_) => "MappingCorrupt",
            PiiError::InvalidApiKey => "InvalidAPIKey",
            PiiError::InsufficientCredits { .. } => "InsufficientCredits",
            PiiError::RateLimit { .. } => "RateLimit",
            PiiError::VerifyOther(_) => "VerifyOther",
            PiiError::Timeout => "Timeout",
            PiiError::Internal(_) => "Internal",
            PiiError::Cancelled => "Cancelled",
        }
    }

    /// Whether this category represents a 4xx-shaped client error that the
    /// Verifier's retry policy must not retry.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PiiError::InvalidApiKey
                | PiiError::InsufficientCredits { .. }
                | PiiError::RateLimit { .. }
                | PiiError::VerifyOther(_)
        )
    }
}
