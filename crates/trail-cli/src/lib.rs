//! Trail CLI Library
//!
//! Read-only inspection of an audit store from the command line.
//!
//! # Overview
//!
//! - **Entities**: list audited entity types and their tables (`trail entities`)
//! - **History**: one entity's audit rows, optionally merged with its
//!   associations (`trail history`)
//! - **Pages**: paginated history with navigation (`trail page`)
//! - **Counts**: number of matching rows (`trail count`)
//! - **Records**: a single audit row (`trail record`)
//! - **Transactions**: every row written by one transaction (`trail transaction`)
//!
//! Entity metadata is read from a TOML file (`--metadata` / `TRAIL_METADATA`);
//! the database and table naming come from the environment. Output is JSON on
//! stdout, logs go to stderr.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trail_common::AuditType;

/// Trail - audit trail inspector
#[derive(Parser, Debug)]
#[command(name = "trail")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Entity metadata file
    #[arg(long, env = "TRAIL_METADATA", default_value = "trail.toml", global = true)]
    pub metadata: PathBuf,

    /// Acting user, recorded for access checks
    #[arg(long, env = "TRAIL_USER", global = true)]
    pub user: Option<String>,

    /// Role held by the acting user (repeatable)
    #[arg(long = "role", global = true)]
    pub roles: Vec<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List audited entity types and their tables
    Entities,

    /// Show audit history of an entity type
    History {
        /// Entity type name
        entity: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Page number (1-based), used with --page-size
        #[arg(long)]
        page: Option<i64>,

        /// Rows per page
        #[arg(long)]
        page_size: Option<i64>,

        /// Only rows written by this transaction
        #[arg(long)]
        transaction: Option<String>,

        /// Merge in related rows of associated entities (needs --object-id)
        #[arg(long)]
        associations: bool,

        /// Include rows of subtypes sharing the entity's table
        #[arg(long)]
        non_strict: bool,
    },

    /// Show one page of history with navigation
    Page {
        /// Entity type name
        entity: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: i64,

        /// Rows per page (defaults to TRAIL_PAGE_SIZE)
        #[arg(long)]
        page_size: Option<i64>,
    },

    /// Count audit rows of an entity type
    Count {
        /// Entity type name
        entity: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show a single audit row
    Record {
        /// Entity type name
        entity: String,

        /// Audit row id
        id: i64,
    },

    /// Show every audit row written by one transaction
    Transaction {
        /// Transaction hash
        hash: String,

        /// Only these change types (comma-separated)
        #[arg(long, value_delimiter = ',')]
        types: Vec<AuditType>,
    },
}

/// Filters shared by the history commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only rows about this object
    #[arg(long)]
    pub object_id: Option<String>,

    /// Only these change types (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub types: Vec<AuditType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_history() {
        let cli = Cli::try_parse_from([
            "trail",
            "--metadata",
            "entities.toml",
            "--role",
            "ROLE_AUDITOR",
            "--role",
            "ROLE_ADMIN",
            "history",
            "Author",
            "--object-id",
            "42",
            "--types",
            "insert,update",
            "--page",
            "2",
            "--page-size",
            "10",
            "--associations",
        ])
        .unwrap();

        assert_eq!(cli.metadata, PathBuf::from("entities.toml"));
        assert_eq!(cli.roles, vec!["ROLE_AUDITOR", "ROLE_ADMIN"]);
        match cli.command {
            Commands::History {
                entity,
                filters,
                page,
                page_size,
                associations,
                non_strict,
                ..
            } => {
                assert_eq!(entity, "Author");
                assert_eq!(filters.object_id.as_deref(), Some("42"));
                assert_eq!(filters.types, vec![AuditType::Insert, AuditType::Update]);
                assert_eq!(page, Some(2));
                assert_eq!(page_size, Some(10));
                assert!(associations);
                assert!(!non_strict);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = Cli::try_parse_from(["trail", "count", "Author", "--types", "upsert"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_page_defaults() {
        let cli = Cli::try_parse_from(["trail", "page", "Post"]).unwrap();
        match cli.command {
            Commands::Page { page, page_size, .. } => {
                assert_eq!(page, 1);
                assert_eq!(page_size, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
