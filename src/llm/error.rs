//! LLM error types

use regex::RegexSet;
use std::sync::LazyLock;
use thiserror::Error;

/// Provider messages that indicate quota or rate exhaustion even when the
/// transport did not report a 429 status
static RATE_LIMIT_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b429\b",
        r"(?i)rate limit",
        r"(?i)resource has been exhausted",
        r"(?i)exceeded your current quota",
    ])
    .expect("rate limit patterns are valid")
});

/// LLM error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Timeout, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unknown, message)
    }

    /// Whether this failure belongs to the rate-limit class, either by kind
    /// or by the provider's wording
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.kind == LlmErrorKind::RateLimit || RATE_LIMIT_PATTERNS.is_match(&self.message)
    }
}

/// Transport failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Connection failures, dropped streams
    Network,
    /// Rate limited or quota exhausted (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Authentication failed (401, 403) or missing credentials
    Auth,
    /// Bad request (400)
    InvalidRequest,
    /// Exchange exceeded its time budget
    Timeout,
    Unknown,
}
