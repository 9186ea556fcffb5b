//! Parameterized SQL composition
//!
//! Audit queries are assembled from fragments at runtime: the table depends
//! on the entity, the predicate on the active filters, and an association
//! union has one branch per linked entity. [`SqlBuilder`] keeps that safe:
//!
//! - identifiers are only ever emitted through
//!   [`QualifiedName::quoted`](crate::registry::QualifiedName::quoted) or
//!   [`quote_identifier`](crate::registry::quote_identifier);
//! - every value goes through [`SqlBuilder::bind`], which returns a
//!   [`Placeholder`] that may be written any number of times, so branches of
//!   a union can share one bound parameter;
//! - [`SqlBuilder::push_union_all`] joins branches written against the same
//!   parameter list.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// A bound statement parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Text(String),
    OptionalText(Option<String>),
    BigInt(i64),
    TextArray(Vec<String>),
    Json(JsonValue),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        Self::BigInt(value)
    }
}

/// Position of a bound parameter, rendered as `$n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder(usize);

impl Placeholder {
    pub fn position(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// A finished statement: SQL text plus its positional parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    sql: String,
    params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Statement without parameters
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }
}

/// Something that writes itself into a [`SqlBuilder`]
///
/// Fragments bind their parameters up front and only write placeholders
/// while rendering, so a fragment can be rendered into a union without
/// renumbering.
pub trait SqlFragment {
    fn render(&self, sql: &mut SqlBuilder);
}

/// Incrementally built statement with positional parameters
#[derive(Debug, Default, Clone)]
pub struct SqlBuilder {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and return its placeholder
    ///
    /// Nothing is written to the SQL text.
    pub fn bind(&mut self, param: impl Into<SqlParam>) -> Placeholder {
        self.params.push(param.into());
        Placeholder(self.params.len())
    }

    /// Register a parameter and write its placeholder
    pub fn push_bind(&mut self, param: impl Into<SqlParam>) -> &mut Self {
        let placeholder = self.bind(param);
        self.push_placeholder(placeholder)
    }

    pub fn push_placeholder(&mut self, placeholder: Placeholder) -> &mut Self {
        self.sql.push_str(&placeholder.to_string());
        self
    }

    /// Append trusted SQL text
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub fn push_fragment(&mut self, fragment: &dyn SqlFragment) -> &mut Self {
        fragment.render(self);
        self
    }

    /// Write `(b1) UNION ALL (b2) ...`
    ///
    /// Each branch is parenthesized so its own clauses stay local to it.
    pub fn push_union_all(&mut self, branches: &[&dyn SqlFragment]) -> &mut Self {
        for (index, branch) in branches.iter().enumerate() {
            if index > 0 {
                self.push(" UNION ALL ");
            }
            self.push("(");
            branch.render(self);
            self.push(")");
        }
        self
    }

    /// Write ` WHERE c1 AND c2 ...`, or nothing when there are no conditions
    pub fn push_where(&mut self, conditions: &[String]) -> &mut Self {
        for (index, condition) in conditions.iter().enumerate() {
            self.push(if index == 0 { " WHERE " } else { " AND " });
            self.push(condition);
        }
        self
    }

    /// Current SQL text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Bind a parameter list onto a `sqlx` query, in order
///
/// Works for `query`, `query_as` and `query_scalar` alike.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                $crate::sql::SqlParam::Text(value) => query.bind(value.as_str()),
                $crate::sql::SqlParam::OptionalText(value) => query.bind(value.as_deref()),
                $crate::sql::SqlParam::BigInt(value) => query.bind(*value),
                $crate::sql::SqlParam::TextArray(values) => query.bind(values.as_slice()),
                $crate::sql::SqlParam::Json(value) => query.bind(value),
                $crate::sql::SqlParam::Timestamp(value) => query.bind(*value),
            };
        }
        query
    }};
}

pub(crate) use bind_params;
