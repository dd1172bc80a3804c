//! `ledgerd-scheduler`: cron-triggered batch jobs with SQLite run bookkeeping.
//!
//! # Overview
//!
//! Job definitions live in `batch_jobs`. At boot the [`Scheduler`] arms a
//! trigger for every active job on a [`Clock`]. Each fire:
//!
//! | Step | Effect                                                   |
//! |------|----------------------------------------------------------|
//! | 1    | `batch_jobs.last_run_at` set to the fire's start         |
//! | 2    | `batch_job_logs` row opened as `running`                 |
//! | 3    | routine resolved by job name runs on its own task        |
//! | 4    | run log closed `success`/`failed` from the outcome       |
//! | 5    | `batch_jobs.next_run_at` refreshed from the trigger      |
//!
//! A routine error or panic still closes the run log as `failed`.

pub mod clock;
pub mod db;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod registry;
pub mod routine;
pub mod runs;
pub mod schedule;
pub mod types;

pub use clock::{Clock, CronClock, FireCallback, FireFuture, TriggerHandle};
pub use engine::{Scheduler, SchedulerOptions};
pub use error::{Result, SchedulerError};
pub use jobs::JobStore;
pub use lifecycle::{LifecycleManager, ShutdownReport};
pub use routine::{BatchRoutine, RoutineTable, RunOutcome};
pub use runs::RunLogStore;
pub use types::{Job, JobStatus, RunLog, RunStatus};
