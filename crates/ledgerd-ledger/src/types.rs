use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Payment,
    Withdrawal,
    Disbursement,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 3] = [
        TransactionKind::Payment,
        TransactionKind::Withdrawal,
        TransactionKind::Disbursement,
    ];
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionKind::Payment => "payment",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Disbursement => "disbursement",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "payment" => Ok(TransactionKind::Payment),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "disbursement" => Ok(TransactionKind::Disbursement),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

/// Processing state of a transaction. Only the processor moves a row from
/// `Pending` to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub const ALL: [ProcessingStatus; 3] = [
        ProcessingStatus::Pending,
        ProcessingStatus::Completed,
        ProcessingStatus::Failed,
    ];
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(format!("unknown processing status: {other}")),
        }
    }
}

/// A persisted transaction row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// UUID string.
    pub id: String,
    pub kind: TransactionKind,
    /// Always carries two fractional digits.
    pub amount: Decimal,
    pub status: ProcessingStatus,
    pub consumer_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub status: ProcessingStatus,
    pub consumer_id: String,
    pub created_at: DateTime<Utc>,
}
