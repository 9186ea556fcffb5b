//! Trail Core Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Commit-time audit capture and audit history queries over PostgreSQL.
//!
//! # Overview
//!
//! - **Capture**: change detection stages [`PendingAudit`] records on a
//!   [`FlushCoordinator`]; when the observed transaction commits, the
//!   coordinator runs its [`FlushCallback`] (usually an [`AuditWriter`])
//!   on the same connection, so audit rows commit or roll back together
//!   with the business rows.
//! - **Observation**: statement observers are combined in an
//!   [`ObserverChain`] and driven by an [`ObservedTransaction`].
//! - **Queries**: [`AuditReader`] reads one entity's audit table, merges an
//!   object's history with its associations, paginates, and groups rows by
//!   transaction. Auditability and view roles are checked before any SQL is
//!   built.
//! - **Metadata**: entity tables, inheritance and associations come from a
//!   [`MetadataProvider`], snapshotted into an [`EntityRegistry`].
//!
//! # Audit tables
//!
//! Each audited entity has its own table named
//! `<schema>.<prefix><entity table><suffix>` with at least the columns
//! `id`, `type`, `object_id`, `discriminator`, `transaction_hash`, `diffs`,
//! `blame_id`, `blame_user` and `created_at`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trail_core::{
//!     db, AuditConfig, AuditQuery, AuditReader, EntityRegistry, StaticMetadata,
//! };
//!
//! # async fn run() -> trail_core::AuditResult<()> {
//! let config = AuditConfig::load()?;
//! let metadata = Arc::new(StaticMetadata::from_file("entities.toml")?);
//! let registry = Arc::new(EntityRegistry::build(metadata.as_ref(), &config.tables)?);
//! let pool = db::create_pool(&config.database).await?;
//!
//! let reader = AuditReader::new(pool, registry, metadata);
//! let history = reader
//!     .query_audits("Author", &AuditQuery::new().object_id(1).page(1).page_size(20))
//!     .await?;
//! println!("{} changes", history.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod flush;
pub mod metadata;
pub mod observer;
pub mod policy;
pub mod reader;
pub mod record;
pub mod registry;
pub mod sql;
pub mod transaction;
pub mod writer;

// Re-export commonly used types
pub use config::{AuditConfig, DatabaseConfig, TableNaming};
pub use error::{AuditError, AuditResult};
pub use flush::{FlushCallback, FlushCoordinator};
pub use metadata::{AssociationMapping, EntityDefinition, InheritanceType, MetadataProvider, StaticMetadata};
pub use observer::{ObserverChain, StatementExecutor, StatementObserver};
pub use policy::{AccessPolicy, AuditUser, IdentityProvider, StaticIdentity};
pub use reader::{AuditFilter, AuditQuery, AuditReader, Pager};
pub use record::{AuditRecord, PendingAudit, TaggedAuditRecord};
pub use registry::{EntityEntry, EntityRegistry};
pub use transaction::ObservedTransaction;
pub use trail_common::{AccessScope, AuditType};
pub use writer::AuditWriter;
