//! Crate-level error type.
//!
//! Configuration and index errors abort construction or the offending call;
//! they are never replaced by a default. Budget exhaustion is not an error.

/// Errors produced by policies, the decision loop and executors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A constructor parameter is out of its documented domain.
    #[error("invalid configuration: `{field}` {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// An arm index outside `[0, arms)` reached the registry.
    #[error("arm index {arm} out of range for {arms} arm(s)")]
    ArmOutOfRange { arm: usize, arms: usize },

    /// The trial executor reported a failure; the trial outcome is unknown.
    #[error("executor failed during {op}: {detail}")]
    Executor { op: &'static str, detail: String },

    /// The executor returned numbers inconsistent with the episode budget
    /// or with the batch that was requested.
    #[error("executor protocol violation: {detail}")]
    Protocol { detail: String },

    /// An operator override the active policy cannot honour.
    #[error("{what} is not supported by this policy")]
    Unsupported { what: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// Whether this is a configuration error (taxonomy class (a)).
    pub fn is_config(&self) -> bool {
        matches!(self, Error::InvalidConfig { .. })
    }

    /// Whether a failed trial may be retried once the budget is confirmed
    /// untouched. Configuration, index and protocol errors never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Executor { .. } | Error::Io(_) => true,
            #[cfg(feature = "http")]
            Error::Http(_) => true,
            _ => false,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
