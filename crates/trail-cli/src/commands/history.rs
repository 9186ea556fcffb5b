//! `trail history` command implementation
//!
//! Shows one entity type's audit rows, newest first. With `--associations`
//! the rows of directly associated entities that concern the object are
//! merged in, each tagged with the entity type it came from.

use anyhow::Result;
use trail_core::{AuditQuery, AuditReader};

use super::print_json;
use crate::FilterArgs;

/// Options of one history call
#[derive(Debug, Clone, Default)]
pub struct HistoryArgs {
    pub filters: FilterArgs,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub transaction: Option<String>,
    pub associations: bool,
    pub non_strict: bool,
}

impl HistoryArgs {
    pub fn query(&self) -> AuditQuery {
        AuditQuery {
            object_id: self.filters.object_id.clone(),
            page: self.page,
            page_size: self.page_size,
            transaction_hash: self.transaction.clone(),
            strict: !self.non_strict,
        }
    }
}

pub async fn run(mut reader: AuditReader, entity: &str, args: &HistoryArgs) -> Result<()> {
    reader.set_type_filter(args.filters.types.iter().copied());
    let query = args.query();

    if args.associations {
        let rows = reader.query_audits_with_associations(entity, &query).await?;
        print_json(&rows)
    } else {
        let rows = reader.query_audits(entity, &query).await?;
        print_json(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_from_args() {
        let args = HistoryArgs {
            filters: FilterArgs {
                object_id: Some("9".to_string()),
                types: Vec::new(),
            },
            page: Some(3),
            page_size: Some(20),
            transaction: Some("abc".to_string()),
            associations: false,
            non_strict: true,
        };

        let query = args.query();
        assert_eq!(query.object_id.as_deref(), Some("9"));
        assert_eq!(query.page, Some(3));
        assert_eq!(query.page_size, Some(20));
        assert_eq!(query.transaction_hash.as_deref(), Some("abc"));
        assert!(!query.strict);
    }

    #[test]
    fn test_default_args_are_strict() {
        assert!(HistoryArgs::default().query().strict);
    }
}
