//! `trail record` command implementation
//!
//! Shows a single audit row by id.

use anyhow::{bail, Result};
use trail_core::AuditReader;

use super::print_json;

pub async fn run(reader: &AuditReader, entity: &str, id: i64) -> Result<()> {
    let records = reader.query_one(entity, id).await?;

    match records.first() {
        Some(record) => print_json(record),
        None => bail!("No audit record {id} for {entity}"),
    }
}
