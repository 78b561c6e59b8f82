use sea_orm::error::DbErr;
use sea_orm::SqlErr;
use serde::Serialize;

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A concurrent writer got there first; the whole batch can be retried.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Sequence error: {0}")]
    SequenceError(String),

    /// A reference catalog row too broken to build a master from.
    #[error("Malformed reference data: {0}")]
    MalformedReference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Like [`ServiceError::db_error`], but unique-key violations become
    /// [`ServiceError::Conflict`] so callers can retry the batch.
    pub fn from_write<E: IntoDbErr>(error: E, what: &str) -> Self {
        let err = error.into_db_err();
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                ServiceError::Conflict(format!("{what}: {detail}"))
            }
            _ => ServiceError::DatabaseError(err),
        }
    }

    /// Whether re-running the failed batch from scratch can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) | Self::ValidationError(_) => 2,
            Self::NotFound(_) => 3,
            Self::Conflict(_) => 4,
            Self::MalformedReference(_) => 5,
            Self::DatabaseError(_)
            | Self::SequenceError(_)
            | Self::InternalError(_)
            | Self::Other(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
