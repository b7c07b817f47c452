//! Accumulator for walking `next` links of a paginated search

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::bundle::{Bundle, BundleEntry};
use crate::error::{CoreError, Result};

/// Caps on a pagination walk. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageLimits {
    pub max_pages: Option<NonZeroUsize>,
    pub max_elapsed: Option<Duration>,
}

impl PageLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Check whether another page may be fetched given the progress so far.
    pub fn check_next(&self, pages: usize, entries: usize, elapsed: Duration) -> Result<()> {
        if let Some(max) = self.max_pages
            && pages >= max.get()
        {
            return Err(CoreError::PageLimitExceeded {
                pages,
                entries,
                reason: format!("max_pages {} reached", max),
            });
        }

        if let Some(max) = self.max_elapsed
            && elapsed >= max
        {
            return Err(CoreError::PageLimitExceeded {
                pages,
                entries,
                reason: format!("max_elapsed {:?} reached after {:?}", max, elapsed),
            });
        }

        Ok(())
    }
}

/// Combined search result being assembled page by page
#[derive(Debug)]
pub struct PagedResult {
    initial: Bundle,
    entries: Vec<BundleEntry>,
    next: Option<String>,
    pages: usize,
}

impl PagedResult {
    /// Start from the initial search response
    pub fn new(mut initial: Bundle) -> Self {
        let entries = std::mem::take(&mut initial.entry);
        let next = initial.next_link().map(str::to_string);
        Self {
            initial,
            entries,
            next,
            pages: 1,
        }
    }

    /// URL of the page still to be fetched
    pub fn next_url(&self) -> Option<&str> {
        self.next.as_deref()
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Append a fetched page and take over its `next` link
    pub fn absorb(&mut self, page: Bundle) {
        self.next = page.next_link().map(str::to_string);
        self.entries.extend(page.entry);
        self.pages += 1;
    }

    /// Initial response metadata with the full entry list
    pub fn finish(self) -> Bundle {
        let mut bundle = self.initial;
        bundle.entry = self.entries;
        bundle
    }
}
