use thiserror::Error;

/// Failures raised by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A unique constraint rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("invalid stored JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    // Unique-constraint violations become Duplicate so callers can match on them
    pub fn from_insert(err: rusqlite::Error, what: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                StoreError::Duplicate(what.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcomes of assessment operations that the caller is expected to handle.
#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("learner {learner_id} is not enrolled in skill {skill_id}")]
    Forbidden { learner_id: i64, skill_id: i64 },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("assessment {0} expired (time limit exceeded)")]
    Expired(i64),

    #[error("not enough questions available ({available}/{requested})")]
    InsufficientData { available: usize, requested: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl AssessmentError {
    /// Stable machine-readable tag for each outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            AssessmentError::NotFound(_) => "not_found",
            AssessmentError::Forbidden { .. } => "forbidden",
            AssessmentError::InvalidState(_) => "invalid_state",
            AssessmentError::Conflict(_) => "conflict",
            AssessmentError::Expired(_) => "expired",
            AssessmentError::InsufficientData { .. } => "insufficient_data",
            AssessmentError::InvalidInput(_) => "invalid_input",
            AssessmentError::Storage(_) => "storage",
        }
    }
}

impl From<rusqlite::Error> for AssessmentError {
    fn from(err: rusqlite::Error) -> Self {
        AssessmentError::Storage(StoreError::Database(err))
    }
}
