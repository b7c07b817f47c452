use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Bundle.type must be 'transaction' to be chunked, found {found:?}")]
    NotTransaction { found: Option<String> },

    #[error("Expected a Bundle, found resourceType '{found}'")]
    NotABundle { found: String },

    #[error("Pagination stopped after {pages} page(s) and {entries} entries: {reason}")]
    PageLimitExceeded {
        pages: usize,
        entries: usize,
        reason: String,
    },

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
