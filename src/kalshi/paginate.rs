//! Cursor pagination over Kalshi list endpoints.
//!
//! A run starts with no cursor and follows `cursor` values until the upstream
//! stops returning one. Two safety nets bound every run:
//!
//! - the page cap is checked *before* each fetch, so `max_pages = 1` performs
//!   exactly one request;
//! - a cursor that was already returned in the same run aborts pagination.

use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;

use indexmap::IndexMap;

use crate::error::{PaginationError, ToolError};

/// Largest page size accepted by the list endpoints.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Default page cap for full-corpus convenience operations.
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Upper bound accepted for a caller-supplied page cap.
pub const MAX_PAGES_LIMIT: u32 = 10_000;

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Cursor for the next page; `None` once exhausted.
    pub cursor: Option<String>,
}

/// Page size and page cap for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// Items requested per page.
    pub limit: u32,
    /// Maximum number of pages fetched.
    pub max_pages: u32,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            limit: MAX_PAGE_LIMIT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Identifies the endpoint being paged, for error messages.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    /// Path such as `/markets`.
    pub path: &'static str,
    /// Advice appended when the page cap is hit.
    pub cap_hint: &'static str,
}

impl Endpoint {
    fn max_pages_exceeded(self) -> PaginationError {
        PaginationError::MaxPagesExceeded {
            endpoint: self.path.to_string(),
            hint: self.cap_hint.to_string(),
        }
    }

    fn cursor_repeated(self) -> PaginationError {
        PaginationError::CursorRepeated {
            endpoint: self.path.to_string(),
        }
    }
}

/// Walks a cursor-paginated source to completion.
///
/// `fetch` receives the cursor (`None` for the first page) and the page size.
/// Returns every item in page order together with the number of pages fetched.
///
/// # Errors
///
/// Returns the first error produced by `fetch`, or a [`PaginationError`] when
/// the page cap is reached or a cursor repeats.
pub async fn page_through<T, F, Fut>(
    endpoint: Endpoint,
    options: PageOptions,
    mut fetch: F,
) -> Result<(Vec<T>, u32), ToolError>
where
    F: FnMut(Option<String>, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ToolError>>,
{
    let mut items = Vec::new();
    let mut seen_cursors = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0_u32;

    loop {
        if pages >= options.max_pages {
            return Err(endpoint.max_pages_exceeded().into());
        }

        let page = fetch(cursor.take(), options.limit).await?;
        items.extend(page.items);
        pages += 1;

        let Some(next) = page.cursor.filter(|c| !c.is_empty()) else {
            break;
        };
        if !seen_cursors.insert(next.clone()) {
            tracing::warn!(endpoint = endpoint.path, pages, "Cursor repeated, aborting pagination");
            return Err(endpoint.cursor_repeated().into());
        }
        tracing::trace!(endpoint = endpoint.path, pages, "Following cursor");
        cursor = Some(next);
    }

    Ok((items, pages))
}

/// Like [`page_through`], but keeps only the first item for each key.
///
/// First-seen order is preserved.
///
/// # Errors
///
/// See [`page_through`].
pub async fn page_through_unique<T, K, F, Fut, KF>(
    endpoint: Endpoint,
    options: PageOptions,
    fetch: F,
    key: KF,
) -> Result<(Vec<T>, u32), ToolError>
where
    F: FnMut(Option<String>, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ToolError>>,
    K: Hash + Eq,
    KF: Fn(&T) -> K,
{
    let (items, pages) = page_through(endpoint, options, fetch).await?;
    let mut unique = IndexMap::with_capacity(items.len());
    for item in items {
        unique.entry(key(&item)).or_insert(item);
    }
    Ok((unique.into_values().collect(), pages))
}
