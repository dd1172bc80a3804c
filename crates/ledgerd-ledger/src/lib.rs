//! Transactions and the two batch routines that run over them.
//!
//! - [`TransactionProcessor`] completes yesterday's pending transactions.
//! - [`ReportGenerator`] exports yesterday's transactions to CSV.
//!
//! Both implement [`ledgerd_scheduler::BatchRoutine`]; [`jobs::routine_table`]
//! wires them to their job names.

pub mod db;
pub mod error;
pub mod export;
pub mod jobs;
pub mod processor;
pub mod report;
pub mod seed;
pub mod store;
pub mod types;
pub mod window;

pub use error::{LedgerError, Result};
pub use export::{CsvExporter, ExportOptions, ReportExporter, ReportRow};
pub use processor::TransactionProcessor;
pub use report::ReportGenerator;
pub use store::{SqliteTransactionStore, TransactionStore};
pub use types::{NewTransaction, ProcessingStatus, Transaction, TransactionKind};
pub use window::DayWindow;
