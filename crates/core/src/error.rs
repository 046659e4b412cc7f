use crate::analysis::Tier;

/// Result alias that carries the custom [`BeatSyncError`] type.
pub type Result<T> = std::result::Result<T, BeatSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BeatSyncError {
    /// Free-form message for conditions that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The analysis document or config file could not be decoded.
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    /// An event sequence failed validation while building the model. Raised
    /// once at startup; there is no recovery path.
    #[error("invalid {tier} sequence: {reason}")]
    Validation {
        tier: &'static str,
        reason: ValidationReason,
    },
    /// The current event of a tier has zero duration, so its remaining
    /// fraction has no meaningful value.
    #[error("indeterminate timing for {tier} event {index}: zero-length span")]
    IndeterminateTiming { tier: Tier, index: usize },
    /// Configuration values outside their accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BeatSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn validation(tier: &'static str, reason: ValidationReason) -> Self {
        Self::Validation { tier, reason }
    }
}

impl From<&str> for BeatSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BeatSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Why an event sequence was rejected.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ValidationReason {
    #[error("sequence is empty")]
    Empty,
    #[error("event {index} starts before its predecessor")]
    Unsorted { index: usize },
    #[error("event {index} has a negative start ({value})")]
    NegativeStart { index: usize, value: f64 },
    #[error("event {index} has a negative duration ({value})")]
    NegativeDuration { index: usize, value: f64 },
    #[error("event {index} has a non-finite timing value")]
    NonFinite { index: usize },
}
