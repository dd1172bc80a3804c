use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use tracing::{debug, error, info, warn};

use crate::{
    clock::{Clock, FireCallback, FireFuture, TriggerHandle},
    error::Result,
    jobs::JobStore,
    registry::TriggerRegistry,
    routine::{BatchRoutine, RoutineTable, RunOutcome},
    runs::RunLogStore,
    types::{Job, JobStatus},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerOptions {
    /// Let a fire start while the previous run of the same job is still open.
    pub allow_overlapping_runs: bool,
}

/// Arms active jobs on a [`Clock`] and runs each fire through the run envelope:
/// `last_run_at` → open run log → routine → close run log → `next_run_at`.
pub struct Scheduler {
    jobs: JobStore,
    clock: Arc<dyn Clock>,
    routines: RoutineTable,
    triggers: Arc<TriggerRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl Scheduler {
    pub fn new(
        jobs: JobStore,
        runs: RunLogStore,
        routines: RoutineTable,
        clock: Arc<dyn Clock>,
        options: SchedulerOptions,
    ) -> Self {
        let triggers = Arc::new(TriggerRegistry::new());
        let dispatcher = Arc::new(Dispatcher {
            jobs: jobs.clone(),
            runs,
            triggers: Arc::clone(&triggers),
            allow_overlapping_runs: options.allow_overlapping_runs,
            in_flight: DashSet::new(),
        });
        Self {
            jobs,
            clock,
            routines,
            triggers,
            dispatcher,
        }
    }

    /// Arm every active job and record each trigger's next instant.
    ///
    /// A job whose schedule cannot be armed is logged and skipped. Failing to
    /// read the job table is returned to the caller. Returns the number of
    /// jobs armed.
    pub fn load_active_jobs(&self) -> Result<usize> {
        let jobs = self.jobs.list_by_status(JobStatus::Active)?;
        let mut armed = 0;
        for job in &jobs {
            match self.arm_job(job) {
                Ok(next) => {
                    armed += 1;
                    info!(job = %job.name, schedule = %job.schedule, next_run_at = ?next, "job armed");
                }
                Err(e) => error!(job = %job.name, error = %e, "failed to arm job"),
            }
        }
        info!(armed, active = jobs.len(), "active jobs loaded");
        Ok(armed)
    }

    /// Arm (or re-arm) one job and persist its next instant.
    ///
    /// Re-arming a name cancels the trigger it replaces.
    pub fn arm_job(&self, job: &Job) -> Result<Option<DateTime<Utc>>> {
        let routine = self.routines.resolve(&job.name);
        if routine.is_none() {
            warn!(job = %job.name, "no routine registered for job; its runs will record no work");
        }
        let target = Arc::new(FireTarget {
            job_id: job.id,
            name: job.name.clone(),
            schedule: job.schedule.clone(),
            routine,
        });

        let cell: Arc<OnceLock<Arc<dyn TriggerHandle>>> = Arc::new(OnceLock::new());
        let callback: FireCallback = {
            let dispatcher = Arc::clone(&self.dispatcher);
            let cell = Arc::clone(&cell);
            Arc::new(move || {
                let dispatcher = Arc::clone(&dispatcher);
                let target = Arc::clone(&target);
                let handle = cell.get().cloned();
                let fire: FireFuture =
                    Box::pin(async move { dispatcher.fire(&target, handle).await });
                fire
            })
        };

        let handle = self.clock.arm(&job.schedule, callback)?;
        let _ = cell.set(Arc::clone(&handle));

        let next = handle.next_fire_time();
        if let Err(e) = self.jobs.set_next_run(job.id, next) {
            handle.cancel();
            return Err(e);
        }
        self.triggers.arm(&job.name, handle);
        Ok(next)
    }

    /// Disarm a job and mark it cancelled.
    ///
    /// Returns false when no trigger is armed under `name` or the status
    /// update fails. A run already in progress finishes normally.
    pub fn cancel_job(&self, name: &str) -> bool {
        let Some(handle) = self.triggers.take(name) else {
            debug!(job = %name, "cancel requested for job that is not armed");
            return false;
        };
        handle.cancel();
        match self.jobs.mark_cancelled(name) {
            Ok(()) => {
                info!(job = %name, "job cancelled");
                true
            }
            Err(e) => {
                error!(job = %name, error = %e, "failed to persist job cancellation");
                false
            }
        }
    }

    /// Cancel every active job, best effort. Returns how many were cancelled.
    pub fn cancel_all_active(&self) -> usize {
        let jobs = match self.jobs.list_by_status(JobStatus::Active) {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "failed to list active jobs for cancellation");
                return 0;
            }
        };
        let cancelled = jobs.iter().filter(|job| self.cancel_job(&job.name)).count();
        info!(cancelled, active = jobs.len(), "active jobs cancelled");
        cancelled
    }

    /// Release the clock's timers. Safe to call repeatedly.
    pub fn shutdown(&self) {
        match self.clock.release_all() {
            Ok(()) => info!("scheduler clock released"),
            Err(e) => error!(error = %e, "failed to release scheduler clock"),
        }
    }

    /// Next instant of the trigger armed under `name`.
    pub fn next_fire_time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.triggers.lookup(name)?.next_fire_time()
    }

    /// Names with a live trigger, sorted.
    pub fn armed_jobs(&self) -> Vec<String> {
        self.triggers.names()
    }

    pub fn is_armed(&self, name: &str) -> bool {
        self.triggers.lookup(name).is_some()
    }
}

/// Everything a fire needs, captured once when the job is armed.
struct FireTarget {
    job_id: i64,
    name: String,
    schedule: String,
    routine: Option<Arc<dyn BatchRoutine>>,
}

/// Shared per-fire state: stores, the live triggers and the set of jobs with
/// an open run.
struct Dispatcher {
    jobs: JobStore,
    runs: RunLogStore,
    triggers: Arc<TriggerRegistry>,
    allow_overlapping_runs: bool,
    in_flight: DashSet<String>,
}

impl Dispatcher {
    async fn fire(&self, target: &FireTarget, handle: Option<Arc<dyn TriggerHandle>>) {
        let started_at = Utc::now();
        if let Err(e) = self.jobs.set_last_run(target.job_id, started_at) {
            error!(job = %target.name, error = %e, "failed to record last run");
        }

        match self.admit(&target.name) {
            Some(_guard) => self.execute(target, started_at).await,
            None => self.reject_overlap(target, started_at),
        }

        self.refresh_next_run(target, handle);
    }

    fn admit(&self, name: &str) -> Option<RunGuard<'_>> {
        if self.allow_overlapping_runs {
            return Some(RunGuard {
                in_flight: &self.in_flight,
                name: None,
            });
        }
        self.in_flight.insert(name.to_string()).then(|| RunGuard {
            in_flight: &self.in_flight,
            name: Some(name.to_string()),
        })
    }

    async fn execute(&self, target: &FireTarget, started_at: DateTime<Utc>) {
        info!(job = %target.name, schedule = %target.schedule, "running batch job");
        let run_id = match self.runs.open(&target.name, &target.schedule, started_at) {
            Ok(id) => id,
            Err(e) => {
                error!(job = %target.name, error = %e, "failed to open run log; run skipped");
                return;
            }
        };

        let outcome = match &target.routine {
            Some(routine) => invoke(&target.name, Arc::clone(routine)).await,
            None => {
                warn!(job = %target.name, run_id, "no routine registered for job");
                RunOutcome::default()
            }
        };
        self.close(target, run_id, &outcome);
    }

    fn reject_overlap(&self, target: &FireTarget, started_at: DateTime<Utc>) {
        warn!(job = %target.name, "previous run still in progress; fire skipped");
        match self.runs.open(&target.name, &target.schedule, started_at) {
            Ok(run_id) => {
                let outcome = RunOutcome::failed(format!(
                    "skipped: previous run of {} still in progress",
                    target.name
                ));
                self.close(target, run_id, &outcome);
            }
            Err(e) => error!(job = %target.name, error = %e, "failed to record skipped run"),
        }
    }

    fn close(&self, target: &FireTarget, run_id: i64, outcome: &RunOutcome) {
        match self.runs.close(run_id, outcome, Utc::now()) {
            Ok(status) => info!(
                job = %target.name,
                run_id,
                %status,
                total = outcome.total,
                success = outcome.success,
                failure = outcome.failure,
                "run closed"
            ),
            Err(e) => error!(job = %target.name, run_id, error = %e, "failed to close run log"),
        }
    }

    /// Persist the next instant of the trigger that fired.
    ///
    /// A trigger that was replaced while this run was open no longer owns
    /// `next_run_at`; the re-arm already wrote the new instant.
    fn refresh_next_run(&self, target: &FireTarget, handle: Option<Arc<dyn TriggerHandle>>) {
        let Some(handle) = handle else {
            warn!(job = %target.name, "fire arrived before its trigger was registered");
            return;
        };
        if let Some(current) = self.triggers.lookup(&target.name) {
            if !std::ptr::addr_eq(Arc::as_ptr(&current), Arc::as_ptr(&handle)) {
                debug!(job = %target.name, "trigger re-armed during run; next run left as is");
                return;
            }
        }
        if let Err(e) = self.jobs.set_next_run(target.job_id, handle.next_fire_time()) {
            error!(job = %target.name, error = %e, "failed to record next run");
        }
    }
}

/// Run a routine on its own task so a panic is contained and still closes the run.
async fn invoke(name: &str, routine: Arc<dyn BatchRoutine>) -> RunOutcome {
    match tokio::spawn(async move { routine.run().await }).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(job = %name, error = %format!("{e:#}"), "routine failed");
            RunOutcome::failed(format!("{e:#}"))
        }
        Err(e) => {
            error!(job = %name, error = %e, "routine aborted");
            RunOutcome::failed(format!("routine aborted: {e}"))
        }
    }
}

/// Marks a job as having an open run until dropped.
struct RunGuard<'a> {
    in_flight: &'a DashSet<String>,
    name: Option<String>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(name) = self.name.take() {
            self.in_flight.remove(&name);
        }
    }
}
