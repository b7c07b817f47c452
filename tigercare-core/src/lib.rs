pub mod bundle;
pub mod error;
pub mod operation_outcome;
pub mod pagination;
pub mod transaction;

pub use bundle::{
    Bundle, BundleEntry, BundleLink, BUNDLE_TYPE_SEARCHSET, BUNDLE_TYPE_TRANSACTION,
    BUNDLE_TYPE_TRANSACTION_RESPONSE,
};
pub use error::{CoreError, Result};
pub use operation_outcome::{IssueSeverity, IssueType, OperationOutcome, OperationOutcomeIssue};
pub use pagination::{PageLimits, PagedResult};
pub use transaction::{
    chunk_transaction, TransactionResponseMerger, DEFAULT_MAX_ENTRIES_PER_BUNDLE,
};
