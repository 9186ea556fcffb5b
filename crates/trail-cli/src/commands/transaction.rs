//! `trail transaction` command implementation
//!
//! Shows every audit row written by one transaction, grouped by entity type.
//! Entity types the caller may not view are left out.

use anyhow::Result;
use trail_common::AuditType;
use trail_core::AuditReader;

use super::print_json;

pub async fn run(mut reader: AuditReader, hash: &str, types: &[AuditType]) -> Result<()> {
    reader.set_type_filter(types.iter().copied());

    let grouped = reader.query_audits_by_transaction(hash).await?;
    if grouped.is_empty() {
        tracing::info!(transaction = hash, "No visible audit rows for transaction");
    }

    print_json(&grouped)
}
