//! Transaction bundle chunking and response merging
//!
//! FHIR servers cap how many entries a single transaction may carry. A
//! bundle above the cap is split into contiguous sub-bundles that are
//! submitted one after another, and the sub-responses are stitched back
//! into a single `transaction-response`.

use std::borrow::Cow;
use std::num::NonZeroUsize;

use crate::bundle::{Bundle, BundleEntry, BUNDLE_TYPE_TRANSACTION_RESPONSE};
use crate::error::{CoreError, Result};

/// Entry limit enforced by the upstream FHIR service
pub const DEFAULT_MAX_ENTRIES_PER_BUNDLE: NonZeroUsize = NonZeroUsize::new(400).unwrap();

/// Split a transaction bundle into sub-bundles of at most `max_entries`.
///
/// A bundle already within the limit (including one with no entries) is
/// returned borrowed, as the single chunk. Larger bundles are copied field
/// for field with `entry` replaced by consecutive slices, so concatenating
/// the chunk entries reproduces the original order.
pub fn chunk_transaction(bundle: &Bundle, max_entries: NonZeroUsize) -> Result<Vec<Cow<'_, Bundle>>> {
    if !bundle.is_transaction() {
        return Err(CoreError::NotTransaction {
            found: bundle.bundle_type.clone(),
        });
    }

    let max = max_entries.get();
    if bundle.entry.len() <= max {
        return Ok(vec![Cow::Borrowed(bundle)]);
    }

    let chunks: Vec<Cow<'_, Bundle>> = bundle
        .entry
        .chunks(max)
        .map(|slice| Cow::Owned(bundle.with_entries(slice.to_vec())))
        .collect();

    tracing::debug!(
        entries = bundle.entry.len(),
        max_entries = max,
        chunks = chunks.len(),
        "Split transaction bundle"
    );

    Ok(chunks)
}

/// Accumulates sub-responses in submission order
#[derive(Debug, Default)]
pub struct TransactionResponseMerger {
    entries: Vec<BundleEntry>,
    responses: usize,
}

impl TransactionResponseMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the entries of the next sub-response
    pub fn push(&mut self, response: Bundle) {
        self.responses += 1;
        self.entries.extend(response.entry);
    }

    /// Number of sub-responses merged so far
    pub fn responses(&self) -> usize {
        self.responses
    }

    /// Produce the combined `transaction-response` bundle
    pub fn finish(self) -> Bundle {
        let mut merged = Bundle::new(BUNDLE_TYPE_TRANSACTION_RESPONSE);
        merged.entry = self.entries;
        merged
    }
}
