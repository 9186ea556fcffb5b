//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function taking an
//! [`AuditReader`] built by [`open_reader`].

pub mod count;
pub mod entities;
pub mod history;
pub mod page;
pub mod record;
pub mod transaction;

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use trail_core::{db, AuditConfig, AuditReader, EntityRegistry, StaticIdentity, StaticMetadata};

use crate::Cli;

/// Build a reader from the environment and the CLI's metadata and identity
///
/// The pool connects lazily, so commands that never query (like `entities`)
/// work without a reachable database.
pub fn open_reader(cli: &Cli) -> Result<AuditReader> {
    let config = AuditConfig::load().context("Failed to load configuration")?;

    let metadata = StaticMetadata::from_file(&cli.metadata)
        .with_context(|| format!("Failed to load metadata from {}", cli.metadata.display()))?;
    let metadata = Arc::new(metadata);
    let registry = EntityRegistry::build(metadata.as_ref(), &config.tables)
        .context("Failed to build entity registry")?;

    let pool = db::create_lazy_pool(&config.database).context("Failed to configure database pool")?;

    let reader = AuditReader::new(pool, Arc::new(registry), metadata)
        .with_default_page_size(config.default_page_size);

    Ok(match identity(cli) {
        Some(identity) => reader.with_identity(Arc::new(identity)),
        None => reader,
    })
}

fn identity(cli: &Cli) -> Option<StaticIdentity> {
    let base = match cli.user.as_deref() {
        Some(user) => StaticIdentity::user(user, user),
        None if !cli.roles.is_empty() => StaticIdentity::anonymous(),
        None => return None,
    };
    Some(base.with_roles(cli.roles.iter().cloned()))
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}
