use std::fmt;

/// Unified error type for the notehost crate.
///
/// Policy refusals and not-found lookups are *not* errors; they surface as
/// `false` / `None` return values. Errors are reserved for calls that could
/// not be attempted at all.
#[derive(Debug, Clone)]
pub enum HostError {
    /// A value crossing the plugin boundary had the wrong type.
    TypeViolation(String),
    /// Invalid input provided by the caller.
    InvalidInput(String),
    /// A media payload exceeds the host size limit.
    MediaTooLarge { size: usize, limit: usize },
    /// Failure reported by an external collaborator (persistence, upload,
    /// dialog presentation). Propagated unchanged, never retried here.
    Transport(String),
    /// Internal error.
    Internal(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::TypeViolation(msg) => write!(f, "type violation: {msg}"),
            HostError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            HostError::MediaTooLarge { size, limit } => {
                write!(f, "media payload of {size} bytes exceeds limit of {limit} bytes")
            }
            HostError::Transport(msg) => write!(f, "transport error: {msg}"),
            HostError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}

/// Result type alias using [`HostError`].
pub type HostResult<T> = Result<T, HostError>;
