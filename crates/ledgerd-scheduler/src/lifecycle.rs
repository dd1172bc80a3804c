//! Graceful shutdown of the scheduling core.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::engine::Scheduler;

/// What the shutdown sequence did, for logging by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub jobs_cancelled: usize,
    pub still_armed: Vec<String>,
}

impl ShutdownReport {
    /// One human-readable line per step.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.jobs_cancelled > 0 {
            lines.push(format!("- {} job(s) cancelled", self.jobs_cancelled));
        } else {
            lines.push("- No active jobs".to_string());
        }
        if !self.still_armed.is_empty() {
            lines.push(format!(
                "- Triggers released while still armed: {}",
                self.still_armed.join(", ")
            ));
        }
        lines.push("- Scheduler clock released".to_string());
        lines.push("- Core quiesced".to_string());
        lines
    }
}

/// Runs the fixed shutdown sequence and announces when the core is idle.
///
/// Steps:
/// 1. Cancel all active jobs (best effort, per job).
/// 2. Release the clock.
/// 3. Flip the quiesced signal to `true`.
///
/// No step can prevent the next: cancellation and release log their own
/// failures instead of returning them.
pub struct LifecycleManager {
    scheduler: Arc<Scheduler>,
    quiesced: watch::Sender<bool>,
}

impl LifecycleManager {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        let (quiesced, _) = watch::channel(false);
        Self {
            scheduler,
            quiesced,
        }
    }

    /// Receiver that turns `true` once [`shutdown`](Self::shutdown) has finished.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.quiesced.subscribe()
    }

    pub fn is_quiesced(&self) -> bool {
        *self.quiesced.borrow()
    }

    /// Execute the shutdown sequence. Safe to call more than once.
    pub fn shutdown(&self) -> ShutdownReport {
        info!("shutting down scheduling core");

        // 1. Disarm and mark cancelled every active job.
        let jobs_cancelled = self.scheduler.cancel_all_active();

        // 2. Release the clock, including triggers for jobs that were armed
        //    but are no longer active in the table.
        let still_armed = self.scheduler.armed_jobs();
        self.scheduler.shutdown();

        // 3. Tell upstream we are idle. send_replace never fails, even with
        //    no receivers yet.
        self.quiesced.send_replace(true);

        let report = ShutdownReport {
            jobs_cancelled,
            still_armed,
        };
        info!(
            jobs_cancelled = report.jobs_cancelled,
            still_armed = report.still_armed.len(),
            "scheduling core quiesced"
        );
        report
    }
}
