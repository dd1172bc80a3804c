use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the transaction store, processor and report export.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The completion update found the row no longer pending (or gone).
    #[error("Transaction {id} is not pending")]
    NotPending { id: String },

    #[error("Export to {} failed: {reason}", path.display())]
    Export { path: PathBuf, reason: String },

    #[error("Invalid transaction record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
