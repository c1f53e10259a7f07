use thiserror::Error;

pub type Result<T> = std::result::Result<T, InsightsError>;

#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient data: no post records to predict from")]
    InsufficientData,

    #[error("record source error: {0}")]
    Source(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InsightsError {
    pub fn invalid_record(id: impl Into<String>, reason: impl Into<String>) -> Self {
        InsightsError::InvalidRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InsightsError::InvalidRecord { .. } => "invalid_record",
            InsightsError::InvalidInput(_) => "invalid_input",
            InsightsError::InsufficientData => "insufficient_data",
            InsightsError::Source(_) => "source",
            InsightsError::Config(_) => "config",
            InsightsError::Io(_) => "io",
        }
    }
}
