use sqlx::error::ErrorKind;
use thiserror::Error as ThisError;
use warp::http::StatusCode;
use warp::reject::Reject;

/// Failure taxonomy of the storage and composition layer. `Validation`
/// carries the offending field so responses can be keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("{field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("subscribing to yourself is not allowed")]
    SelfFollow,

    #[error("query failed: {0}")]
    Query(String),
}

impl Error {
    pub fn validation(field: &'static str, reason: &str) -> Self {
        Self::Validation {
            field,
            reason: reason.to_string(),
        }
    }

    pub fn conflict(info: &str) -> Self {
        Self::Conflict(info.to_string())
    }

    pub fn not_found(info: &str) -> Self {
        Self::NotFound(info.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::SelfFollow => StatusCode::BAD_REQUEST,
            Error::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => match e.kind() {
                ErrorKind::UniqueViolation => Self::Conflict(format!("{e}")),
                _ => Self::Query(format!("{e}")),
            },
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut => Self::Query("pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Query("pool closed".to_string()),
            sqlx::Error::WorkerCrashed => Self::Query("worker crashed".to_string()),
            sqlx::Error::ColumnNotFound(e) => Self::Query(format!("column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Query(format!("column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::Query(format!("{e}")),
            sqlx::Error::Io(e) => Self::Query(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::Query(format!("{e}")),
            sqlx::Error::Configuration(e) => Self::Query(format!("{e}")),
            sqlx::Error::Tls(e) => Self::Query(format!("{e}")),
            e => Self::Query(format!("{e}")),
        }
    }
}

impl Reject for Error {}
