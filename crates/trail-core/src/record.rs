//! Audit record models
//!
//! An [`AuditRecord`] is one immutable row of an entity's audit table. The
//! subsystem only ever appends rows ([`PendingAudit`] is the not-yet-written
//! form) and reads them back newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use trail_common::AuditType;

/// Columns every audit table exposes, in select order
pub const AUDIT_COLUMNS: &[&str] = &[
    "id",
    "type",
    "object_id",
    "discriminator",
    "transaction_hash",
    "diffs",
    "blame_id",
    "blame_user",
    "created_at",
];

/// Audit row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditRecord {
    /// Monotonic within its table
    pub id: i64,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub audit_type: AuditType,
    /// String-typed so composite and non-integer keys fit
    pub object_id: String,
    /// Only set for single-table inheritance hierarchies
    pub discriminator: Option<String>,
    pub transaction_hash: Option<String>,
    /// `{ field: { "old": .., "new": .. } }`
    pub diffs: JsonValue,
    pub blame_id: Option<String>,
    pub blame_user: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// The `{old, new}` pair recorded for one field or association
    pub fn diff(&self, field: &str) -> Option<&JsonValue> {
        self.diffs.get(field)
    }

    pub fn old_value(&self, field: &str) -> Option<&JsonValue> {
        self.diff(field).and_then(|d| d.get("old"))
    }

    pub fn new_value(&self, field: &str) -> Option<&JsonValue> {
        self.diff(field).and_then(|d| d.get("new"))
    }

    /// Identity of the related object an association diff points at
    ///
    /// Prefers the new side; falls back to the old side for dissociations.
    pub fn related_id(&self, field: &str) -> Option<String> {
        [self.new_value(field), self.old_value(field)]
            .into_iter()
            .flatten()
            .find_map(|side| side.get("id"))
            .map(|id| match id {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
    }

    /// Field names touched by this change
    pub fn changed_fields(&self) -> Vec<&str> {
        self.diffs
            .as_object()
            .map(|fields| fields.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Audit row returned by an association-union query, tagged with the entity
/// type whose audit table it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaggedAuditRecord {
    pub source_entity: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: AuditRecord,
}

impl TaggedAuditRecord {
    /// `(source, id)` pair; unique across a union result modulo duplicates
    pub fn key(&self) -> (&str, i64) {
        (&self.source_entity, self.record.id)
    }
}

/// Audit row staged for the next flush
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAudit {
    pub entity: String,
    pub audit_type: AuditType,
    pub object_id: String,
    pub discriminator: Option<String>,
    pub transaction_hash: Option<String>,
    pub diffs: JsonValue,
    pub blame_id: Option<String>,
    pub blame_user: Option<String>,
    /// Captured at staging time
    pub created_at: DateTime<Utc>,
}

impl PendingAudit {
    pub fn builder(entity: impl Into<String>, audit_type: AuditType) -> PendingAuditBuilder {
        PendingAuditBuilder {
            entity: entity.into(),
            audit_type,
            object_id: None,
            discriminator: None,
            transaction_hash: None,
            diffs: Map::new(),
            blame_id: None,
            blame_user: None,
        }
    }
}

/// Builder for [`PendingAudit`]
#[derive(Debug, Clone)]
pub struct PendingAuditBuilder {
    entity: String,
    audit_type: AuditType,
    object_id: Option<String>,
    discriminator: Option<String>,
    transaction_hash: Option<String>,
    diffs: Map<String, JsonValue>,
    blame_id: Option<String>,
    blame_user: Option<String>,
}

impl PendingAuditBuilder {
    pub fn object_id(mut self, object_id: impl ToString) -> Self {
        self.object_id = Some(object_id.to_string());
        self
    }

    pub fn discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    pub fn transaction_hash(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }

    /// Record a field change
    pub fn field(mut self, name: impl Into<String>, old: JsonValue, new: JsonValue) -> Self {
        self.diffs
            .insert(name.into(), serde_json::json!({ "old": old, "new": new }));
        self
    }

    /// Record an association change; `None` means no related object on that side
    pub fn association(
        self,
        name: impl Into<String>,
        old_id: Option<&str>,
        new_id: Option<&str>,
    ) -> Self {
        let side = |id: Option<&str>| match id {
            Some(id) => serde_json::json!({ "id": id }),
            None => JsonValue::Null,
        };
        self.field(name, side(old_id), side(new_id))
    }

    pub fn blame(mut self, id: impl Into<String>, user: impl Into<String>) -> Self {
        self.blame_id = Some(id.into());
        self.blame_user = Some(user.into());
        self
    }

    /// Build the pending row
    ///
    /// # Panics
    /// Panics if no object id was set. Use `try_build()` for fallible construction.
    #[allow(clippy::expect_used)]
    pub fn build(self) -> PendingAudit {
        self.try_build()
            .expect("PendingAuditBuilder: object_id is required")
    }

    pub fn try_build(self) -> Result<PendingAudit, &'static str> {
        let object_id = self.object_id.ok_or("object_id is required")?;

        Ok(PendingAudit {
            entity: self.entity,
            audit_type: self.audit_type,
            object_id,
            discriminator: self.discriminator,
            transaction_hash: self.transaction_hash,
            diffs: JsonValue::Object(self.diffs),
            blame_id: self.blame_id,
            blame_user: self.blame_user,
            created_at: Utc::now(),
        })
    }
}
