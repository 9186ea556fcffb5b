//! Error types shared across the Trail workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, TrailError>;

/// Errors raised by the shared types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrailError {
    #[error("Unknown audit type '{0}': expected one of insert, update, remove, associate, dissociate")]
    UnknownAuditType(String),

    #[error("Unknown access scope '{0}': expected 'view'")]
    UnknownScope(String),
}
