//! Chunked transaction upload and full pagination fetch
//!
//! Both walks keep exactly one request in flight. Transaction chunks are
//! applied by the server in submission order, so chunk N+1 is only sent
//! once chunk N has been answered.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::time::Instant;

use tigercare_core::{chunk_transaction, Bundle, PagedResult, TransactionResponseMerger};

use crate::client::FhirSession;
use crate::error::{ClientError, Result};

impl FhirSession<'_> {
    /// Submit a transaction bundle, splitting it when it exceeds the
    /// configured entry limit, and merge the sub-responses into one
    /// `transaction-response`.
    ///
    /// The first failing chunk aborts the upload. Chunks already accepted
    /// by the server are not rolled back.
    pub async fn submit_transaction(&self, bundle: &Bundle) -> Result<Bundle> {
        let limit = self.client.config().max_entries_per_bundle;
        let mut queue: VecDeque<Cow<'_, Bundle>> = chunk_transaction(bundle, limit)?.into();
        let total = queue.len();
        let mut merger = TransactionResponseMerger::new();

        tracing::info!(
            entries = bundle.entry.len(),
            chunks = total,
            "Submitting transaction bundle"
        );

        while let Some(chunk) = queue.pop_front() {
            let index = total - queue.len();
            let response = self
                .post_transaction(&chunk)
                .await
                .map_err(|e| ClientError::ChunkFailed {
                    chunk: index,
                    total,
                    source: Box::new(e),
                })?;

            tracing::debug!(
                chunk = index,
                total,
                entries = response.entry.len(),
                "Transaction chunk accepted"
            );
            merger.push(response);
        }

        Ok(merger.finish())
    }

    async fn post_transaction(&self, chunk: &Bundle) -> Result<Bundle> {
        let body = chunk.to_value()?;
        let value = self.post_path("", &body).await?;
        Ok(Bundle::from_value(value)?)
    }

    /// Run a search and follow `next` links until the last page
    pub async fn search_all(&self, resource_type: &str, params: &[(String, String)]) -> Result<Bundle> {
        let first = self.search(resource_type, params).await?;
        self.walk_pages(first).await
    }

    /// Follow `next` links starting from an already fetched page.
    ///
    /// Stops at the first page without a `next` link, or fails with
    /// [`tigercare_core::CoreError::PageLimitExceeded`] when the configured
    /// limits would be crossed. A failed fetch discards the entries
    /// gathered so far.
    pub async fn walk_pages(&self, initial: Bundle) -> Result<Bundle> {
        let limits = self.client.config().page_limits;
        let started = Instant::now();
        let mut result = PagedResult::new(initial);

        while let Some(next) = result.next_url().map(str::to_string) {
            limits.check_next(result.pages(), result.entry_count(), started.elapsed())?;

            let page_number = result.pages() + 1;
            let page = self
                .fetch_page(&next)
                .await
                .map_err(|e| ClientError::PageFailed {
                    page: page_number,
                    source: Box::new(e),
                })?;
            result.absorb(page);
        }

        tracing::debug!(
            pages = result.pages(),
            entries = result.entry_count(),
            "Pagination complete"
        );
        Ok(result.finish())
    }
}
