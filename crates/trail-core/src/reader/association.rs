//! Association union
//!
//! A change to a link between two entities is recorded in the owning side's
//! diff payload, so one object's history can be spread over several audit
//! tables. The union query reads the entity's own audit table plus, for each
//! direct association, the target's audit table restricted to rows that
//! concern the object. A target row matches when either:
//!
//! - the live target row still points at the object through the join column;
//! - or the target's diff payload names the object as the old or new related id.
//!
//! The two predicates overlap and both are kept. Branches are combined with
//! `UNION ALL`, so a row matching through both paths of different branches is
//! returned once per branch; callers dedupe on `(source_entity, id)` if needed.
//! Paging applies to the merged result only.

use super::query::{audit_columns, push_page, AuditSelect, Criteria, CriteriaBinds, Projection};
use crate::metadata::AssociationMapping;
use crate::registry::{quote_identifier, EntityEntry};
use crate::sql::{Placeholder, SqlBuilder, SqlFragment, Statement};

/// Combined ordering; the source tag keeps ties between tables stable
const UNION_ORDER_BY: &str =
    " ORDER BY \"created_at\" DESC, \"id\" DESC, \"source_entity\" ASC";

/// One association that can take part in the union
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkedEntity<'a> {
    pub mapping: &'a AssociationMapping,
    pub target: &'a EntityEntry,
    pub join_column: &'a str,
}

/// Branch over an associated entity's audit table
struct AssociationBranch<'a> {
    link: LinkedEntity<'a>,
    tag: Placeholder,
    diff_field: Placeholder,
    object_id: Placeholder,
    discriminator: Option<Placeholder>,
    shared: Vec<String>,
}

impl SqlFragment for AssociationBranch<'_> {
    fn render(&self, sql: &mut SqlBuilder) {
        let target = self.link.target;
        let object_id = self.object_id;
        let field = self.diff_field;

        sql.push("SELECT ")
            .push_placeholder(self.tag)
            .push("::text AS \"source_entity\", ")
            .push(&audit_columns())
            .push(" FROM ")
            .push(&target.audit_table.quoted())
            .push(" a WHERE (EXISTS (SELECT 1 FROM ")
            .push(&target.table.quoted())
            .push(" l WHERE CAST(l.")
            .push(&quote_identifier(&target.identifier_column))
            .push(" AS TEXT) = a.\"object_id\" AND CAST(l.")
            .push(&quote_identifier(self.link.join_column))
            .push(" AS TEXT) = ")
            .push_placeholder(object_id)
            .push(&format!(
                ") OR a.\"diffs\" -> {field} -> 'old' ->> 'id' = {object_id} \
                 OR a.\"diffs\" -> {field} -> 'new' ->> 'id' = {object_id})"
            ));

        if let Some(discriminator) = self.discriminator {
            sql.push(" AND a.\"discriminator\" = ")
                .push_placeholder(discriminator);
        }
        for condition in &self.shared {
            sql.push(" AND ").push(condition);
        }
    }
}

/// Union of the entity's own history and its associations' related rows
///
/// `criteria.object_id` must be set; it is bound once as `$1` and shared by
/// every branch.
pub(crate) fn union_statement(
    entry: &EntityEntry,
    links: &[LinkedEntity<'_>],
    criteria: &Criteria,
) -> Statement {
    let mut sql = SqlBuilder::new();
    let binds = CriteriaBinds::bind(&mut sql, entry, criteria);

    let base = AuditSelect {
        entry,
        projection: Projection::Tagged(sql.bind(entry.name.as_str())),
        conditions: binds.own_conditions(),
    };

    let mut branches = Vec::with_capacity(links.len());
    if let Some(object_id) = binds.object_id {
        for link in links {
            branches.push(AssociationBranch {
                link: *link,
                tag: sql.bind(link.target.name.as_str()),
                diff_field: sql.bind(link.mapping.diff_field()),
                object_id,
                discriminator: link
                    .target
                    .discriminator_filter(criteria.strict)
                    .map(|value| sql.bind(value)),
                shared: binds.shared_conditions(),
            });
        }
    }

    let mut fragments: Vec<&dyn SqlFragment> = Vec::with_capacity(branches.len() + 1);
    fragments.push(&base);
    fragments.extend(branches.iter().map(|b| b as &dyn SqlFragment));

    sql.push("SELECT * FROM (");
    sql.push_union_all(&fragments);
    sql.push(") AS audits");
    sql.push(UNION_ORDER_BY);
    push_page(&mut sql, criteria.page);

    sql.build()
}
