//! Configuration management

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

// ============================================================================
// Audit Configuration Constants
// ============================================================================

/// Default prefix prepended to an entity table name to form its audit table.
pub const DEFAULT_TABLE_PREFIX: &str = "";

/// Default suffix appended to an entity table name to form its audit table.
pub const DEFAULT_TABLE_SUFFIX: &str = "_audit";

/// Default page size used by the pagination adapter.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/trail";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 0;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Audit subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub tables: TableNaming,
    pub default_page_size: i64,
    pub database: DatabaseConfig,
}

/// How audit table names are derived from entity table names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNaming {
    pub prefix: String,
    pub suffix: String,
}

impl TableNaming {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// `<prefix><table><suffix>`, without schema
    pub fn audit_table_name(&self, table: &str) -> String {
        format!("{}{}{}", self.prefix, table, self.suffix)
    }
}

impl Default for TableNaming {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_PREFIX, DEFAULT_TABLE_SUFFIX)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl AuditConfig {
    /// Load configuration from `.env`, the environment and defaults
    ///
    /// Environment variables:
    /// - `TRAIL_TABLE_PREFIX`, `TRAIL_TABLE_SUFFIX`, `TRAIL_PAGE_SIZE`
    /// - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`, `DATABASE_MIN_CONNECTIONS`,
    ///   `DATABASE_CONNECT_TIMEOUT`
    pub fn load() -> AuditResult<Self> {
        dotenvy::dotenv().ok();

        let config = AuditConfig {
            tables: TableNaming {
                prefix: std::env::var("TRAIL_TABLE_PREFIX")
                    .unwrap_or_else(|_| DEFAULT_TABLE_PREFIX.to_string()),
                suffix: std::env::var("TRAIL_TABLE_SUFFIX")
                    .unwrap_or_else(|_| DEFAULT_TABLE_SUFFIX.to_string()),
            },
            default_page_size: env_parsed("TRAIL_PAGE_SIZE").unwrap_or(DEFAULT_PAGE_SIZE),
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_parsed("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_parsed("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_parsed("DATABASE_CONNECT_TIMEOUT")
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> AuditResult<()> {
        // An empty prefix and suffix would point audit queries at the entity tables
        if self.tables.prefix.is_empty() && self.tables.suffix.is_empty() {
            return Err(AuditError::Config(
                "Audit table prefix and suffix cannot both be empty".to_string(),
            ));
        }

        if self.default_page_size < 1 {
            return Err(AuditError::Config(format!(
                "Default page size must be at least 1, got {}",
                self.default_page_size
            )));
        }

        if self.database.url.is_empty() {
            return Err(AuditError::Config("Database URL cannot be empty".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(AuditError::Config(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AuditError::Config(format!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            tables: TableNaming::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
            database: DatabaseConfig::default(),
        }
    }
}
