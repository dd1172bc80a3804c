use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Armed at boot and fired on its schedule.
    Active,
    /// Kept in the table but never armed.
    Inactive,
    /// Disarmed by an operator or by shutdown. Terminal.
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Active => "active",
            JobStatus::Inactive => "inactive",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "inactive" => Ok(JobStatus::Inactive),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// State of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// A persisted job definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Surrogate key.
    pub id: i64,
    /// Unique dispatch key, e.g. `process-transactions`.
    pub name: String,
    /// Six-field cron expression (seconds first).
    pub schedule: String,
    pub status: JobStatus,
    /// Start of the most recent fire, written before the routine runs.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Cached copy of the armed trigger's next instant.
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One execution attempt of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub id: i64,
    /// Copy of `Job.name` at fire time.
    pub job_name: String,
    /// Copy of `Job.schedule` at fire time.
    pub schedule: String,
    pub started_at: DateTime<Utc>,
    /// `None` while the run is open.
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub total_processed: u32,
    pub total_success: u32,
    pub total_failure: u32,
    pub failure_reason: Option<String>,
}
