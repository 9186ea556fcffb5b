//! `trail count` command implementation

use anyhow::Result;
use serde_json::json;
use trail_core::AuditReader;

use super::print_json;
use crate::FilterArgs;

pub async fn run(mut reader: AuditReader, entity: &str, filters: &FilterArgs) -> Result<()> {
    reader.set_type_filter(filters.types.iter().copied());
    let count = reader.count(entity, filters.object_id.as_deref()).await?;

    print_json(&json!({ "entity": entity, "count": count }))
}
