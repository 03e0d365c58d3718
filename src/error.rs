use thiserror::Error;

/// Error surface of the world server. The core recovers from none of these
/// internally; they all propagate to the RPC boundary.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("entity with id {0} not found")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("stream cancelled")]
    Cancelled,

    #[error("internal: {0}")]
    Internal(String),
}

impl WorldError {
    pub fn internal(e: impl std::fmt::Display) -> Self {
        WorldError::Internal(e.to_string())
    }
}
