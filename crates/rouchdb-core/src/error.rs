use thiserror::Error;

/// Errors surfaced by the document store abstraction that the view engine
/// consumes. This is deliberately small: the store itself (replication,
/// attachments, auth) lives outside this crate's scope.
#[derive(Debug, Error)]
pub enum RouchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: document update conflict")]
    Conflict,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid revision format: {0}")]
    InvalidRev(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RouchError>;
