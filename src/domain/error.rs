//! Domain error types.
//!
//! `DataUnavailable` and `OrderRejected` are cycle-level outcomes and end up on
//! the decision record. The `Config*` family and `UnknownRuleSet` are only
//! raised while loading configuration at startup.

#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("data unavailable: {reason}")]
    DataUnavailable { reason: String },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown rule set '{name}' (expected conservative or aggressive)")]
    UnknownRuleSet { name: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub fn data_unavailable(reason: impl Into<String>) -> Self {
        TraderError::DataUnavailable {
            reason: reason.into(),
        }
    }

    pub fn order_rejected(reason: impl Into<String>) -> Self {
        TraderError::OrderRejected {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl std::fmt::Display) -> Self {
        TraderError::Storage {
            reason: reason.to_string(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Csv(_) | TraderError::Storage { .. } => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::UnknownRuleSet { .. } => 2,
            TraderError::DataUnavailable { .. } => 3,
            TraderError::OrderRejected { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
