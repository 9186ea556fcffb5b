//! Audit query engine
//!
//! [`AuditReader`] is the read side of the subsystem. Every entry point runs
//! the same pipeline before any SQL is built:
//!
//! 1. the entity must be auditable and registered (`NotAuditable`);
//! 2. the caller must satisfy the entity's view policy (`AccessDenied`);
//! 3. paging arguments must be in range (`InvalidArgument`).
//!
//! Session filters (type set, transaction hash) live in an [`AuditFilter`]
//! owned by the reader. Change them with the `set_*` methods or derive a
//! configured copy with [`AuditReader::with_filter`].

mod association;
mod pager;
mod query;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use trail_common::{AccessScope, AuditType};

pub use pager::{Page, Pager};

use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{AuditError, AuditResult};
use crate::policy::{ensure_auditable, ensure_granted, AccessPolicy, IdentityProvider};
use crate::record::{AuditRecord, TaggedAuditRecord};
use crate::registry::{EntityEntry, EntityRegistry};
use crate::sql::{bind_params, Statement};
use association::LinkedEntity;
use query::Criteria;

/// Session-scoped filters applied to every query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Empty means every type
    pub types: BTreeSet<AuditType>,
    pub transaction_hash: Option<String>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = AuditType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn with_transaction(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.transaction_hash.is_none()
    }
}

/// Per-call options for [`AuditReader::query_audits`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    pub object_id: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// Overrides the session transaction filter
    pub transaction_hash: Option<String>,
    /// Under single-table inheritance, only rows of the exact entity type
    pub strict: bool,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            object_id: None,
            page: None,
            page_size: None,
            transaction_hash: None,
            strict: true,
        }
    }
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_id(mut self, object_id: impl ToString) -> Self {
        self.object_id = Some(object_id.to_string());
        self
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: i64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn transaction_hash(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Read access to the audit tables
#[derive(Clone)]
pub struct AuditReader {
    pool: PgPool,
    registry: Arc<EntityRegistry>,
    policy: Arc<dyn AccessPolicy>,
    identity: Option<Arc<dyn IdentityProvider>>,
    filter: AuditFilter,
    default_page_size: i64,
}

impl AuditReader {
    pub fn new(pool: PgPool, registry: Arc<EntityRegistry>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self {
            pool,
            registry,
            policy,
            identity: None,
            filter: AuditFilter::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Check view roles against `identity`
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Copy of this reader with `filter` as its session filter
    pub fn with_filter(&self, filter: AuditFilter) -> Self {
        Self {
            filter,
            ..self.clone()
        }
    }

    /// Page size used by [`paginate`](Self::paginate) when none is given
    pub fn with_default_page_size(mut self, page_size: i64) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn set_type_filter(&mut self, types: impl IntoIterator<Item = AuditType>) {
        self.filter.types = types.into_iter().collect();
    }

    pub fn set_transaction_filter(&mut self, hash: Option<String>) {
        self.filter.transaction_hash = hash;
    }

    pub fn filter(&self) -> &AuditFilter {
        &self.filter
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Auditable entity types and their tables, sorted by type name
    pub fn list_auditable_entities(&self) -> BTreeMap<String, String> {
        self.registry
            .entries()
            .filter(|entry| self.policy.is_auditable(&entry.name))
            .map(|entry| (entry.name.clone(), entry.table.to_string()))
            .collect()
    }

    /// Audit rows of one entity type, newest first
    #[tracing::instrument(skip(self))]
    pub async fn query_audits(&self, entity: &str, query: &AuditQuery) -> AuditResult<Vec<AuditRecord>> {
        let entry = self.authorize(entity)?;
        let criteria = self.criteria(query)?;

        let statement = query::select_statement(entry, &criteria);
        self.fetch_records(entry, &statement).await
    }

    /// Number of rows `query_audits` would return without paging
    #[tracing::instrument(skip(self))]
    pub async fn count(&self, entity: &str, object_id: Option<&str>) -> AuditResult<i64> {
        let entry = self.authorize(entity)?;
        let criteria = self.criteria(&AuditQuery {
            object_id: object_id.map(str::to_string),
            ..AuditQuery::default()
        })?;

        let statement = query::count_statement(entry, &criteria);
        tracing::debug!(entity, table = %entry.audit_table, "Counting audit rows");

        let count = bind_params!(sqlx::query_scalar::<_, i64>(statement.sql()), statement.params())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// The row with id `row_id`, if it passes the session filters
    #[tracing::instrument(skip(self))]
    pub async fn query_one(&self, entity: &str, row_id: i64) -> AuditResult<Vec<AuditRecord>> {
        let entry = self.authorize(entity)?;
        let mut criteria = self.criteria(&AuditQuery::default())?;
        criteria.row_id = Some(row_id);

        let statement = query::select_statement(entry, &criteria);
        self.fetch_records(entry, &statement).await
    }

    /// One object's history merged with related rows of its associations
    ///
    /// Rows are tagged with the entity type whose audit table they came from.
    /// Associations whose target is not audited, not visible to the caller,
    /// or not mapped through a single join column are left out.
    #[tracing::instrument(skip(self))]
    pub async fn query_audits_with_associations(
        &self,
        entity: &str,
        query: &AuditQuery,
    ) -> AuditResult<Vec<TaggedAuditRecord>> {
        let entry = self.authorize(entity)?;
        if query.object_id.is_none() {
            return Err(AuditError::invalid_argument(
                "an object id is required to query associations",
            ));
        }
        let criteria = self.criteria(query)?;

        let links = self.linked_entities(entry);
        let statement = association::union_statement(entry, &links, &criteria);
        tracing::debug!(
            entity,
            table = %entry.audit_table,
            branches = links.len() + 1,
            "Association union built"
        );

        let rows = bind_params!(
            sqlx::query_as::<_, TaggedAuditRecord>(statement.sql()),
            statement.params()
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// A page of `entity`'s history with navigation
    ///
    /// The total comes from a separate count over the same predicate.
    #[tracing::instrument(skip(self))]
    pub async fn paginate(
        &self,
        entity: &str,
        object_id: Option<&str>,
        page: i64,
        page_size: Option<i64>,
    ) -> AuditResult<Pager<AuditRecord>> {
        let page_size = page_size.unwrap_or(self.default_page_size);
        let entry = self.authorize(entity)?;
        let mut query = AuditQuery::new().page(page).page_size(page_size);
        query.object_id = object_id.map(str::to_string);
        let criteria = self.criteria(&query)?;

        let total = self.count(entity, object_id).await?;
        let statement = query::select_statement(entry, &criteria);
        let results = self.fetch_records(entry, &statement).await?;

        Ok(Pager::new(results, page, page_size, total))
    }

    /// Every visible audit row written by one transaction, grouped by entity type
    ///
    /// Entity types the caller may not view are skipped; types without rows
    /// are left out of the result.
    #[tracing::instrument(skip(self))]
    pub async fn query_audits_by_transaction(
        &self,
        transaction_hash: &str,
    ) -> AuditResult<BTreeMap<String, Vec<AuditRecord>>> {
        let criteria = self.criteria(&AuditQuery::new().transaction_hash(transaction_hash))?;
        let mut grouped = BTreeMap::new();

        for entry in self.registry.entries() {
            if !self.policy.is_auditable(&entry.name) {
                continue;
            }
            match self.check_view(&entry.name) {
                Ok(()) => {}
                Err(AuditError::AccessDenied { .. }) => {
                    tracing::warn!(entity = %entry.name, "Skipping entity the caller may not view");
                    continue;
                }
                Err(e) => return Err(e),
            }

            let statement = query::select_statement(entry, &criteria);
            let records = self.fetch_records(entry, &statement).await?;
            if !records.is_empty() {
                grouped.insert(entry.name.clone(), records);
            }
        }

        Ok(grouped)
    }

    /// Auditability, registration and view access, in that order
    fn authorize(&self, entity: &str) -> AuditResult<&EntityEntry> {
        ensure_auditable(self.policy.as_ref(), entity)?;
        let entry = self.registry.resolve(entity)?;
        self.check_view(entity)?;
        Ok(entry)
    }

    fn check_view(&self, entity: &str) -> AuditResult<()> {
        ensure_granted(
            self.policy.as_ref(),
            self.identity.as_deref(),
            entity,
            AccessScope::View,
        )
    }

    /// Merge per-call options with the session filter
    fn criteria(&self, query: &AuditQuery) -> AuditResult<Criteria> {
        Ok(Criteria {
            object_id: query.object_id.clone(),
            row_id: None,
            types: self.filter.types.iter().copied().collect(),
            transaction_hash: query
                .transaction_hash
                .clone()
                .or_else(|| self.filter.transaction_hash.clone()),
            strict: query.strict,
            page: Page::optional(query.page, query.page_size)?,
        })
    }

    fn linked_entities<'a>(&'a self, entry: &'a EntityEntry) -> Vec<LinkedEntity<'a>> {
        let mut links = Vec::new();

        for mapping in &entry.associations {
            let target_type = mapping.target_type.as_str();
            let Some(target) = self
                .registry
                .get(target_type)
                .filter(|_| self.policy.is_auditable(target_type))
            else {
                tracing::debug!(entity = %entry.name, association = %mapping.name, "Association target is not audited");
                continue;
            };
            let Some(join_column) = mapping.join_column.as_deref() else {
                tracing::warn!(
                    entity = %entry.name,
                    association = %mapping.name,
                    "Association has no single join column, skipping"
                );
                continue;
            };
            if self.check_view(target_type).is_err() {
                tracing::warn!(entity = %entry.name, target = target_type, "Skipping association the caller may not view");
                continue;
            }

            links.push(LinkedEntity {
                mapping,
                target,
                join_column,
            });
        }

        links
    }

    async fn fetch_records(
        &self,
        entry: &EntityEntry,
        statement: &Statement,
    ) -> AuditResult<Vec<AuditRecord>> {
        tracing::debug!(
            entity = %entry.name,
            table = %entry.audit_table,
            params = statement.params().len(),
            "Audit query built"
        );

        let records = bind_params!(
            sqlx::query_as::<_, AuditRecord>(statement.sql()),
            statement.params()
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

impl std::fmt::Debug for AuditReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditReader")
            .field("entities", &self.registry.len())
            .field("filter", &self.filter)
            .field("default_page_size", &self.default_page_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_query_defaults_to_strict() {
        let query = AuditQuery::new().object_id(4).page(2).page_size(10);
        assert!(query.strict);
        assert_eq!(query.object_id.as_deref(), Some("4"));
        assert!(!AuditQuery::new().strict(false).strict);
    }

    #[test]
    fn test_filter_builder() {
        let filter = AuditFilter::new()
            .with_types([AuditType::Insert, AuditType::Update, AuditType::Insert])
            .with_transaction("T1");

        assert_eq!(filter.types.len(), 2);
        assert_eq!(filter.transaction_hash.as_deref(), Some("T1"));
        assert!(!filter.is_empty());
        assert!(AuditFilter::new().is_empty());
    }
}
