//! Page arithmetic and paginated results

use serde::Serialize;

use crate::error::{AuditError, AuditResult};

/// Validated LIMIT/OFFSET window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Window for 1-based `page` of `page_size` rows
    pub fn new(page: i64, page_size: i64) -> AuditResult<Self> {
        if page < 1 {
            return Err(AuditError::invalid_argument(format!(
                "page must be at least 1, got {page}"
            )));
        }
        if page_size < 1 {
            return Err(AuditError::invalid_argument(format!(
                "page_size must be at least 1, got {page_size}"
            )));
        }

        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| AuditError::invalid_argument("page is out of range"))?;

        Ok(Self {
            limit: page_size,
            offset,
        })
    }

    /// Window only when a page size is given; `page` is still validated
    pub fn optional(page: Option<i64>, page_size: Option<i64>) -> AuditResult<Option<Self>> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(AuditError::invalid_argument(format!(
                "page must be at least 1, got {page}"
            )));
        }
        page_size.map(|size| Self::new(page, size)).transpose()
    }
}

/// One page of results plus navigation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pager<T> {
    pub results: Vec<T>,
    pub current_page: i64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
    pub previous_page: Option<i64>,
    pub next_page: Option<i64>,
    pub num_pages: i64,
    pub have_to_paginate: bool,
    pub total_count: i64,
}

impl<T> Pager<T> {
    /// Navigation for `results` as page `page` of `total_count` rows
    pub fn new(results: Vec<T>, page: i64, page_size: i64, total_count: i64) -> Self {
        let num_pages = if page_size > 0 {
            let total = total_count.max(0);
            total / page_size + i64::from(total % page_size != 0)
        } else {
            0
        };
        let has_previous_page = page > 1;
        let has_next_page = page < num_pages;

        Self {
            results,
            current_page: page,
            has_previous_page,
            has_next_page,
            previous_page: has_previous_page.then(|| page - 1),
            next_page: has_next_page.then(|| page + 1),
            num_pages,
            have_to_paginate: total_count > page_size,
            total_count,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Pager<U> {
        Pager {
            results: self.results.into_iter().map(f).collect(),
            current_page: self.current_page,
            has_previous_page: self.has_previous_page,
            has_next_page: self.has_next_page,
            previous_page: self.previous_page,
            next_page: self.next_page,
            num_pages: self.num_pages,
            have_to_paginate: self.have_to_paginate,
            total_count: self.total_count,
        }
    }
}
