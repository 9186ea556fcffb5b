//! Entity registry
//!
//! Built once from a [`MetadataProvider`], the registry maps each entity type
//! to its live table, its audit table and the inheritance and association
//! details the query engine needs. Lookups are by value; nothing is resolved
//! lazily at query time.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::TableNaming;
use crate::error::{AuditError, AuditResult};
use crate::metadata::{AssociationMapping, InheritanceType, MetadataProvider};

/// Optionally schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: Option<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.filter(|s| !s.is_empty()),
            name: name.into(),
        }
    }

    /// Quoted form for embedding in SQL, e.g. `"blog"."post_audit"`
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.name)),
            None => quote_identifier(&self.name),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Everything the engine knows about one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityEntry {
    pub name: String,
    pub table: QualifiedName,
    pub audit_table: QualifiedName,
    pub inheritance: InheritanceType,
    pub discriminator: Option<String>,
    pub identifier_column: String,
    pub associations: Vec<AssociationMapping>,
}

impl EntityEntry {
    /// Discriminator to filter on, when rows of other subtypes share the table
    pub fn discriminator_filter(&self, strict: bool) -> Option<&str> {
        if strict && self.inheritance == InheritanceType::SingleTable {
            self.discriminator.as_deref()
        } else {
            None
        }
    }
}

/// Entity type -> table resolution
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entries: BTreeMap<String, EntityEntry>,
}

impl EntityRegistry {
    /// Snapshot every entity the provider knows about
    pub fn build(provider: &dyn MetadataProvider, naming: &TableNaming) -> AuditResult<Self> {
        let mut entries = BTreeMap::new();

        for entity in provider.entity_types() {
            let table = provider.table_name(&entity).ok_or_else(|| {
                AuditError::metadata(format!("No table name for entity '{entity}'"))
            })?;
            let schema = provider.schema_name(&entity);

            let entry = EntityEntry {
                audit_table: QualifiedName::new(schema.clone(), naming.audit_table_name(&table)),
                table: QualifiedName::new(schema, table),
                inheritance: provider.inheritance_type(&entity),
                discriminator: provider.discriminator(&entity),
                identifier_column: provider.identifier_column(&entity),
                associations: provider.associations(&entity),
                name: entity.clone(),
            };
            entries.insert(entity, entry);
        }

        tracing::debug!(entities = entries.len(), "Entity registry built");

        Ok(Self { entries })
    }

    pub fn get(&self, entity: &str) -> Option<&EntityEntry> {
        self.entries.get(entity)
    }

    /// Like [`get`](Self::get), but an unknown entity is `NotAuditable`
    pub fn resolve(&self, entity: &str) -> AuditResult<&EntityEntry> {
        self.get(entity)
            .ok_or_else(|| AuditError::not_auditable(entity))
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entries.contains_key(entity)
    }

    /// Entries sorted by entity type name
    pub fn entries(&self) -> impl Iterator<Item = &EntityEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
