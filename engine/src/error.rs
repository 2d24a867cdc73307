use crate::document::DocumentId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// A token, query term or stop word contains a control byte, is empty
    /// where that is not allowed, or a negative document id was supplied.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("document id {0} already exists")]
    Duplicate(DocumentId),

    #[error("document id {0} does not exist")]
    NotFound(DocumentId),
}
