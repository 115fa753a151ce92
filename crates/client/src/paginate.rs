//! Sequential pagination with accumulation.
//!
//! Drains a paged resource page by page, strictly in ascending order, one
//! request at a time. The source's cursor contract does not tolerate
//! parallel page fetches, and a short fixed delay between pages keeps the
//! request rate polite. Callers that want concurrency run whole
//! accumulations as jobs under the batch executor instead.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::fetch::{FetchError, ResourceFetcher, Target};

/// Grace period between consecutive page requests.
pub const PAGE_DELAY: Duration = Duration::from_millis(120);

/// One decoded page: the items it carried plus the source-reported total.
#[derive(Debug, Default)]
pub struct Page {
    pub total: u64,
    pub items: Vec<Value>,
}

/// Decode the standard `{ data: { total, list } }` page envelope,
/// mapping absent fields to empty defaults.
pub fn parse_page(response: &Value) -> Page {
    let data = &response["data"];
    Page {
        total: data["total"].as_u64().unwrap_or(0),
        items: data["list"].as_array().cloned().unwrap_or_default(),
    }
}

/// Fetch pages 1.. from `make_target`, appending each page's items (those
/// accepted by `keep`) until a page comes back empty or the pre-filter item
/// count reaches the reported total, whichever comes first.
///
/// Any page-level fetch error aborts the drain — pagination has no partial
/// success, unlike batch jobs.
pub async fn drain_pages<F, P>(
    fetcher: &dyn ResourceFetcher,
    make_target: F,
    mut keep: P,
) -> Result<Vec<Value>, FetchError>
where
    F: Fn(usize) -> Target,
    P: FnMut(&Value) -> bool,
{
    let mut accumulated = Vec::new();
    let mut fetched = 0u64;
    let mut page_no = 1usize;

    loop {
        let response = fetcher.fetch_json(&make_target(page_no)).await?;
        let page = parse_page(&response);
        let count = page.items.len() as u64;
        fetched += count;

        accumulated.extend(page.items.into_iter().filter(|item| keep(item)));
        debug!(page_no, fetched, total = page.total, kept = accumulated.len(), "drained page");

        if count == 0 || fetched >= page.total {
            return Ok(accumulated);
        }
        page_no += 1;
        tokio::time::sleep(PAGE_DELAY).await;
    }
}
