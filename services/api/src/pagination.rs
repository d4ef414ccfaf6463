//! Page-number pagination
//!
//! Lists are wrapped in `{count, next, previous, results}` where the links are
//! absolute URLs that keep every other query parameter intact.

use axum::http::Uri;
use serde::{Deserialize, Serialize};

/// Hard cap on `limit`
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw `page` / `limit` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Resolved paging parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
}

impl PageParams {
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    pub fn limit(&self) -> i64 {
        self.limit as i64
    }
}

/// Paginated response envelope
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Build the envelope for `results`, linking relative to the request `uri`
    pub fn new(results: Vec<T>, count: i64, params: PageParams, uri: &Uri, public_url: &str) -> Self {
        let seen = params.offset() + results.len() as i64;
        let next = (seen < count).then(|| page_link(uri, public_url, params.page + 1));
        let previous = (params.page > 1).then(|| page_link(uri, public_url, params.page - 1));

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

fn page_link(uri: &Uri, public_url: &str, page: u32) -> String {
    let page_pair = format!("page={}", page);
    let mut pairs: Vec<&str> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty() && !pair.starts_with("page=") && *pair != "page")
        .collect();

    // page 1 is the default, so drop it for a canonical previous link
    if page > 1 {
        pairs.push(&page_pair);
    }

    let base = format!("{}{}", public_url.trim_end_matches('/'), uri.path());
    if pairs.is_empty() {
        base
    } else {
        format!("{}?{}", base, pairs.join("&"))
    }
}
