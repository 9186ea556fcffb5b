//! Single-entity audit queries
//!
//! Filters apply in a fixed order: discriminator (strict single-table
//! inheritance only), object id, type set, transaction hash. Rows come back
//! newest first, with the row id breaking timestamp ties.

use trail_common::AuditType;

use super::pager::Page;
use crate::record::AUDIT_COLUMNS;
use crate::registry::{quote_identifier, EntityEntry};
use crate::sql::{Placeholder, SqlBuilder, SqlFragment, SqlParam, Statement};

/// Alias of the audit table inside every generated branch
pub(crate) const AUDIT_ALIAS: &str = "a";

pub(crate) const ORDER_BY: &str = " ORDER BY a.\"created_at\" DESC, a.\"id\" DESC";

/// Resolved filters for one call
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Criteria {
    pub object_id: Option<String>,
    pub row_id: Option<i64>,
    pub types: Vec<AuditType>,
    pub transaction_hash: Option<String>,
    pub strict: bool,
    pub page: Option<Page>,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            object_id: None,
            row_id: None,
            types: Vec::new(),
            transaction_hash: None,
            strict: true,
            page: None,
        }
    }
}

/// Placeholders bound for a [`Criteria`]
///
/// The object id is always bound first, so it is `$1` whenever present.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CriteriaBinds {
    pub object_id: Option<Placeholder>,
    pub discriminator: Option<Placeholder>,
    pub types: Option<Placeholder>,
    pub transaction: Option<Placeholder>,
    pub row_id: Option<Placeholder>,
}

impl CriteriaBinds {
    pub fn bind(sql: &mut SqlBuilder, entry: &EntityEntry, criteria: &Criteria) -> Self {
        let object_id = criteria.object_id.as_deref().map(|id| sql.bind(id));
        let discriminator = entry
            .discriminator_filter(criteria.strict)
            .map(|value| sql.bind(value));
        let types = (!criteria.types.is_empty()).then(|| {
            let names = criteria.types.iter().map(|t| t.as_str().to_string()).collect();
            sql.bind(SqlParam::TextArray(names))
        });
        let transaction = criteria.transaction_hash.as_deref().map(|hash| sql.bind(hash));
        let row_id = criteria.row_id.map(|id| sql.bind(id));

        Self {
            object_id,
            discriminator,
            types,
            transaction,
            row_id,
        }
    }

    /// Conditions on the entity's own audit table
    pub fn own_conditions(&self) -> Vec<String> {
        let mut conditions = Vec::new();
        if let Some(p) = self.discriminator {
            conditions.push(format!("a.\"discriminator\" = {p}"));
        }
        if let Some(p) = self.object_id {
            conditions.push(format!("a.\"object_id\" = {p}"));
        }
        conditions.extend(self.shared_conditions());
        if let Some(p) = self.row_id {
            conditions.push(format!("a.\"id\" = {p}"));
        }
        conditions
    }

    /// Type and transaction conditions, which every union branch applies
    pub fn shared_conditions(&self) -> Vec<String> {
        let mut conditions = Vec::new();
        if let Some(p) = self.types {
            conditions.push(format!("a.\"type\" = ANY({p})"));
        }
        if let Some(p) = self.transaction {
            conditions.push(format!("a.\"transaction_hash\" = {p}"));
        }
        conditions
    }
}

/// What a branch selects
#[derive(Debug, Clone, Copy)]
pub(crate) enum Projection {
    Records,
    /// Records prefixed by a `source_entity` column
    Tagged(Placeholder),
    Count,
}

/// `SELECT ... FROM <audit table> a WHERE ...`
#[derive(Debug)]
pub(crate) struct AuditSelect<'a> {
    pub entry: &'a EntityEntry,
    pub projection: Projection,
    pub conditions: Vec<String>,
}

impl SqlFragment for AuditSelect<'_> {
    fn render(&self, sql: &mut SqlBuilder) {
        sql.push("SELECT ");
        match self.projection {
            Projection::Records => {
                sql.push(&audit_columns());
            }
            Projection::Tagged(tag) => {
                sql.push_placeholder(tag)
                    .push("::text AS \"source_entity\", ")
                    .push(&audit_columns());
            }
            Projection::Count => {
                sql.push("COUNT(*)");
            }
        }
        sql.push(" FROM ")
            .push(&self.entry.audit_table.quoted())
            .push(" ")
            .push(AUDIT_ALIAS);
        sql.push_where(&self.conditions);
    }
}

/// `a."id", a."type", ...`
pub(crate) fn audit_columns() -> String {
    AUDIT_COLUMNS
        .iter()
        .map(|column| format!("{AUDIT_ALIAS}.{}", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn push_page(sql: &mut SqlBuilder, page: Option<Page>) {
    if let Some(page) = page {
        sql.push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
    }
}

/// Ordered, optionally paged select over one entity's audit table
pub(crate) fn select_statement(entry: &EntityEntry, criteria: &Criteria) -> Statement {
    let mut sql = SqlBuilder::new();
    let binds = CriteriaBinds::bind(&mut sql, entry, criteria);

    sql.push_fragment(&AuditSelect {
        entry,
        projection: Projection::Records,
        conditions: binds.own_conditions(),
    });
    sql.push(ORDER_BY);
    push_page(&mut sql, criteria.page);

    sql.build()
}

/// Row count over the same predicate, ignoring paging
pub(crate) fn count_statement(entry: &EntityEntry, criteria: &Criteria) -> Statement {
    let mut sql = SqlBuilder::new();
    let binds = CriteriaBinds::bind(&mut sql, entry, criteria);

    sql.push_fragment(&AuditSelect {
        entry,
        projection: Projection::Count,
        conditions: binds.own_conditions(),
    });

    sql.build()
}
