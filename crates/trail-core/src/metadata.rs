//! Entity metadata contracts
//!
//! The object-relational layer owns the entity model. The audit subsystem only
//! needs a narrow view of it, expressed by [`MetadataProvider`]. [`StaticMetadata`]
//! is a declarative implementation loaded from TOML, which also answers the
//! auditability and role questions of [`AccessPolicy`](crate::policy::AccessPolicy).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use trail_common::AccessScope;

use crate::error::{AuditError, AuditResult};
use crate::policy::AccessPolicy;

/// Default identifier column of an entity table
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "id";

/// How an entity hierarchy is mapped onto tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritanceType {
    #[default]
    None,
    /// All subtypes share one table, told apart by a discriminator column
    SingleTable,
    Joined,
}

/// One direct association of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationMapping {
    /// Field name on the source entity
    pub name: String,
    /// Entity type on the other side
    #[serde(rename = "target")]
    pub target_type: String,
    /// Owning-side field on the target, which is what the target's diffs record
    #[serde(default)]
    pub mapped_by: Option<String>,
    /// Column on the target table holding the source's identifier
    #[serde(default)]
    pub join_column: Option<String>,
}

impl AssociationMapping {
    /// Key under which the target's diff payload records this link
    pub fn diff_field(&self) -> &str {
        self.mapped_by.as_deref().unwrap_or(&self.name)
    }
}

/// Narrow view of the object-relational metadata
pub trait MetadataProvider: Send + Sync {
    /// Every known entity type
    fn entity_types(&self) -> Vec<String>;

    fn table_name(&self, entity: &str) -> Option<String>;

    fn schema_name(&self, entity: &str) -> Option<String>;

    fn inheritance_type(&self, entity: &str) -> InheritanceType;

    /// Discriminator value of this exact type, under single-table inheritance
    fn discriminator(&self, entity: &str) -> Option<String>;

    fn identifier_column(&self, _entity: &str) -> String {
        DEFAULT_IDENTIFIER_COLUMN.to_string()
    }

    fn associations(&self, entity: &str) -> Vec<AssociationMapping>;
}

/// Declarative definition of one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub inheritance: InheritanceType,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default = "default_identifier")]
    pub identifier: String,
    #[serde(default = "default_auditable")]
    pub auditable: bool,
    /// Required roles keyed by scope name; a missing scope means unconditional access
    #[serde(default)]
    pub roles: BTreeMap<String, BTreeSet<String>>,
    #[serde(default, rename = "association")]
    pub associations: Vec<AssociationMapping>,
}

fn default_identifier() -> String {
    DEFAULT_IDENTIFIER_COLUMN.to_string()
}

fn default_auditable() -> bool {
    true
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            schema: None,
            inheritance: InheritanceType::None,
            discriminator: None,
            identifier: default_identifier(),
            auditable: true,
            roles: BTreeMap::new(),
            associations: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn single_table(mut self, discriminator: impl Into<String>) -> Self {
        self.inheritance = InheritanceType::SingleTable;
        self.discriminator = Some(discriminator.into());
        self
    }

    pub fn identifier(mut self, column: impl Into<String>) -> Self {
        self.identifier = column.into();
        self
    }

    pub fn auditable(mut self, auditable: bool) -> Self {
        self.auditable = auditable;
        self
    }

    pub fn require_role(mut self, scope: AccessScope, role: impl Into<String>) -> Self {
        self.roles
            .entry(scope.as_str().to_string())
            .or_default()
            .insert(role.into());
        self
    }

    pub fn association(mut self, mapping: AssociationMapping) -> Self {
        self.associations.push(mapping);
        self
    }
}

#[derive(Debug, Deserialize)]
struct MetadataFile {
    #[serde(default, rename = "entity")]
    entities: Vec<EntityDefinition>,
}

/// Metadata and policy declared up front
///
/// ```toml
/// [[entity]]
/// name = "Author"
/// table = "author"
/// roles = { view = ["ROLE_AUDITOR"] }
///
/// [[entity.association]]
/// name = "posts"
/// target = "Post"
/// mapped_by = "author"
/// join_column = "author_id"
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    entities: BTreeMap<String, EntityDefinition>,
}

impl StaticMetadata {
    pub fn new(definitions: impl IntoIterator<Item = EntityDefinition>) -> AuditResult<Self> {
        let mut entities = BTreeMap::new();
        for definition in definitions {
            if definition.table.trim().is_empty() {
                return Err(AuditError::metadata(format!(
                    "Entity '{}' has an empty table name",
                    definition.name
                )));
            }
            if definition.inheritance == InheritanceType::SingleTable
                && definition.discriminator.is_none()
            {
                return Err(AuditError::metadata(format!(
                    "Entity '{}' uses single-table inheritance without a discriminator",
                    definition.name
                )));
            }
            let name = definition.name.clone();
            if entities.insert(name.clone(), definition).is_some() {
                return Err(AuditError::metadata(format!("Entity '{name}' is declared twice")));
            }
        }

        Ok(Self { entities })
    }

    pub fn from_toml_str(source: &str) -> AuditResult<Self> {
        let file: MetadataFile = toml::from_str(source)
            .map_err(|e| AuditError::metadata(format!("Invalid metadata TOML: {e}")))?;
        Self::new(file.entities)
    }

    pub fn from_file(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            AuditError::metadata(format!("Failed to read metadata file '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn definition(&self, entity: &str) -> Option<&EntityDefinition> {
        self.entities.get(entity)
    }
}

impl MetadataProvider for StaticMetadata {
    fn entity_types(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    fn table_name(&self, entity: &str) -> Option<String> {
        self.definition(entity).map(|d| d.table.clone())
    }

    fn schema_name(&self, entity: &str) -> Option<String> {
        self.definition(entity).and_then(|d| d.schema.clone())
    }

    fn inheritance_type(&self, entity: &str) -> InheritanceType {
        self.definition(entity)
            .map(|d| d.inheritance)
            .unwrap_or_default()
    }

    fn discriminator(&self, entity: &str) -> Option<String> {
        self.definition(entity).and_then(|d| d.discriminator.clone())
    }

    fn identifier_column(&self, entity: &str) -> String {
        self.definition(entity)
            .map(|d| d.identifier.clone())
            .unwrap_or_else(default_identifier)
    }

    fn associations(&self, entity: &str) -> Vec<AssociationMapping> {
        self.definition(entity)
            .map(|d| d.associations.clone())
            .unwrap_or_default()
    }
}

impl AccessPolicy for StaticMetadata {
    fn is_auditable(&self, entity: &str) -> bool {
        self.definition(entity).is_some_and(|d| d.auditable)
    }

    fn configured_roles(&self, entity: &str, scope: AccessScope) -> Option<BTreeSet<String>> {
        self.definition(entity)
            .and_then(|d| d.roles.get(scope.as_str()))
            .cloned()
    }
}
