use thiserror::Error;

use rouchdb_core::RouchError;
use rouchdb_query::QueryError;

/// Error kinds the view engine surfaces (`spec.md` §7).
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view is not open")]
    NotOpen,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    DbError(#[from] RouchError),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("cancelled")]
    Cancelled,

    /// A single document's map-function invocation failed. Logged and
    /// swallowed by the indexer (`spec.md` §7); never surfaces through
    /// `updateIndex`'s return value, but kept as a variant so call sites
    /// that do want to inspect failures (e.g. tests) have a typed shape.
    #[error("map function failed for document {doc_id}: {message}")]
    MapFnFailure { doc_id: String, message: String },
}

impl From<QueryError> for ViewError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::BadRequest(msg) => ViewError::BadRequest(msg),
        }
    }
}

/// HTTP-shaped status code for an error, per `spec.md` §6.
impl ViewError {
    pub fn status_code(&self) -> u16 {
        match self {
            ViewError::NotOpen => 500,
            ViewError::NotFound(_) => 404,
            ViewError::BadRequest(_) => 400,
            ViewError::Conflict(_) => 409,
            ViewError::DbError(_) => 500,
            ViewError::EncodingError(_) => 500,
            ViewError::Cancelled => 500,
            ViewError::MapFnFailure { .. } => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ViewError>;
