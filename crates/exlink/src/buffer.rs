//! Caller-allocated buffer transfer protocol.
//!
//! Every bulk fetch shares one calling convention: the caller allocates a
//! fixed-capacity array of wire records, the engine writes up to capacity
//! elements and reports how many it produced, and only the written prefix
//! is materialized. The engine never allocates the array, so no allocation
//! crosses the boundary except the per-field strings handled by the
//! ownership bridge.
//!
//! The reported count is best-effort: a buggy engine reporting more than
//! capacity must not cause reads past the buffer, so iteration always
//! clamps to `min(reported, capacity)`. The raw reported count is kept on
//! the returned [`Page`] so truncation is observable instead of silent.

use std::mem::MaybeUninit;

use tracing::warn;

use exlink_sys::FfiResult;

use crate::error::{ExchangeError, interpret};

/// Default capacity for paginated fetches when the request's paginator
/// sets no limit (or a smaller one).
pub(crate) const DEFAULT_PAGE_CAPACITY: usize = 256;

/// Capacity for the unpaginated wide fetches (market pairs, cancel-all).
pub(crate) const WIDE_PAGE_CAPACITY: usize = 1024;

/// Per-side depth for synchronous order book fetches.
pub(crate) const BOOK_DEPTH: usize = 512;

/// The materialized prefix of one bulk fetch, plus the engine-reported
/// element count.
///
/// `reported > len` means the engine produced more elements than the
/// buffer could hold and the page is a truncated prefix.
#[derive(Debug, Clone)]
pub struct Page<T> {
    items: Vec<T>,
    reported: usize,
}

impl<T> Page<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element count the engine claims to have produced.
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// Whether the engine produced more elements than the buffer held.
    pub fn truncated(&self) -> bool {
        self.reported > self.items.len()
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Effective capacity for a paginated fetch: the requested limit, floored
/// at [`DEFAULT_PAGE_CAPACITY`].
pub(crate) fn page_capacity(limit: Option<u64>) -> usize {
    (limit.unwrap_or(0) as usize).max(DEFAULT_PAGE_CAPACITY)
}

/// Run one bulk fetch.
///
/// `call` receives `(buffer, capacity, &mut actual)` and performs the raw
/// engine call; `decode` materializes one written record, consuming any
/// engine-owned strings it contains. The tagged result is interpreted
/// before any buffer slot is read; on failure the buffer contents are
/// undefined and no element is decoded. A decode failure partway through
/// still decodes the remaining written records — each record's decode
/// consumes its engine-owned strings, so skipping the tail would strand
/// them — and then propagates the first error; slots past the clamped
/// count are never touched.
pub(crate) fn fetch_with<R, T>(
    capacity: usize,
    call: impl FnOnce(*mut R, usize, *mut usize) -> FfiResult,
    mut decode: impl FnMut(R) -> Result<T, ExchangeError>,
) -> Result<Page<T>, ExchangeError>
where
    R: Copy,
{
    let mut buf = vec![MaybeUninit::<R>::uninit(); capacity];
    let mut reported = 0usize;

    let result = call(buf.as_mut_ptr() as *mut R, capacity, &mut reported);
    // SAFETY: `result` came from the call above and is interpreted once.
    unsafe { interpret(result) }?;

    let written = reported.min(capacity);
    if reported > capacity {
        warn!(reported, capacity, "bulk fetch truncated to buffer capacity");
    }

    let mut items = Vec::with_capacity(written);
    let mut failed = None;
    for slot in &buf[..written] {
        // SAFETY: the engine initialized the first `written` slots; the
        // result was Ok so their contents are valid wire records.
        let record = unsafe { slot.assume_init() };
        match decode(record) {
            Ok(item) => items.push(item),
            // Keep decoding: every record owns strings that must be
            // consumed even when the page is going to fail.
            Err(e) => {
                if failed.is_none() {
                    failed = Some(e);
                }
            }
        }
    }
    if let Some(e) = failed {
        return Err(e);
    }

    Ok(Page { items, reported })
}
