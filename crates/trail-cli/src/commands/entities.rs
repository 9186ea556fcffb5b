//! `trail entities` command implementation
//!
//! Lists audited entity types with their tables.

use anyhow::Result;
use trail_core::AuditReader;

use super::print_json;

pub fn run(reader: &AuditReader) -> Result<()> {
    let entities = reader.list_auditable_entities();
    tracing::debug!(count = entities.len(), "Listing auditable entities");
    print_json(&entities)
}
