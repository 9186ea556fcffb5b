//! Audit subsystem error types

use thiserror::Error;
use trail_common::AccessScope;

/// Result type alias for audit operations
pub type AuditResult<T> = std::result::Result<T, AuditError>;

/// Errors surfaced by the capture and query paths
///
/// `NotAuditable`, `AccessDenied` and `InvalidArgument` are raised before any
/// statement is built. `Storage` carries driver failures through unchanged.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Entity type is not registered as audited
    #[error("Entity '{0}' is not auditable")]
    NotAuditable(String),

    /// Caller's roles do not satisfy the entity's policy for the scope
    #[error("Access denied to '{entity}' audits for scope '{scope}'")]
    AccessDenied { entity: String, scope: AccessScope },

    /// Page or page size outside its domain, or a missing required argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Statement execution failed
    #[error("Audit storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity metadata could not be loaded or is inconsistent
    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuditError {
    pub fn not_auditable(entity: impl Into<String>) -> Self {
        Self::NotAuditable(entity.into())
    }

    pub fn access_denied(entity: impl Into<String>, scope: AccessScope) -> Self {
        Self::AccessDenied {
            entity: entity.into(),
            scope,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata(message.into())
    }

    /// Whether the caller can fix the request and try again
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NotAuditable(_) | Self::AccessDenied { .. } | Self::InvalidArgument(_)
        )
    }
}
