use crate::session::SessionState;

/// Core error type.
///
/// Adapter crates map their transport errors into `External` / `NotFound` so the
/// pipeline can record them per group instead of aborting a whole request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("external error: {0}")]
    External(String),

    #[error("session is not ready (state: {0})")]
    SessionNotReady(SessionState),

    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("invalid export payload: {0}")]
    InvalidPayload(String),

    #[error("invalid export format: {0}")]
    InvalidFormat(String),

    #[error("export write failed: {0}")]
    ExportWrite(String),
}

impl Error {
    /// True for failures caused by the caller's request (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidPayload(_) | Error::InvalidFormat(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
