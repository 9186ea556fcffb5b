//! `trail page` command implementation
//!
//! Shows one page of history together with page navigation.

use anyhow::Result;
use trail_core::AuditReader;

use super::print_json;
use crate::FilterArgs;

pub async fn run(
    mut reader: AuditReader,
    entity: &str,
    filters: &FilterArgs,
    page: i64,
    page_size: Option<i64>,
) -> Result<()> {
    reader.set_type_filter(filters.types.iter().copied());

    let pager = reader
        .paginate(entity, filters.object_id.as_deref(), page, page_size)
        .await?;
    tracing::debug!(
        entity,
        page = pager.current_page,
        num_pages = pager.num_pages,
        "Fetched audit page"
    );

    print_json(&pager)
}
