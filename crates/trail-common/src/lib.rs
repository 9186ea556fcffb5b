//! Trail Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging bootstrap and hashing helpers for the Trail workspace.
//!
//! # Overview
//!
//! - **Types**: the closed set of audit change types and access scopes
//! - **Hashing**: opaque transaction hash generation
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use trail_common::{hash::new_transaction_hash, AuditType};
//!
//! let hash = new_transaction_hash();
//! assert_eq!(hash.len(), 40);
//! assert_eq!("insert".parse::<AuditType>().ok(), Some(AuditType::Insert));
//! ```

pub mod error;
pub mod hash;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TrailError};
pub use types::{AccessScope, AuditType};
