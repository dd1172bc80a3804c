//! Cron-driven timers.
//!
//! A [`Clock`] arms one trigger per job. Each trigger invokes its callback at
//! every instant matched by its cron expression and can report the next such
//! instant. [`CronClock`] drives every trigger from its own tokio task, so a
//! slow callback never delays another trigger.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    error::{Result, SchedulerError},
    schedule::{next_after, parse_cron},
};

pub type FireFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Invoked once per fire; the returned future runs on its own task.
pub type FireCallback = Arc<dyn Fn() -> FireFuture + Send + Sync>;

/// A live, armed trigger.
pub trait TriggerHandle: Send + Sync {
    /// Next instant this trigger will fire, or `None` once cancelled or exhausted.
    fn next_fire_time(&self) -> Option<DateTime<Utc>>;

    /// Stop future fires. A fire already handed to its callback is unaffected.
    fn cancel(&self);

    fn is_cancelled(&self) -> bool;
}

pub trait Clock: Send + Sync {
    /// Validate `expression` and start firing `callback` on it.
    fn arm(&self, expression: &str, callback: FireCallback) -> Result<Arc<dyn TriggerHandle>>;

    /// Cancel every trigger this clock armed and refuse further arming.
    /// Calling it more than once is a no-op.
    fn release_all(&self) -> Result<()>;
}

/// Production clock backed by the `cron` crate and tokio timers.
pub struct CronClock {
    root: CancellationToken,
}

impl CronClock {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
        }
    }
}

impl Default for CronClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for CronClock {
    fn arm(&self, expression: &str, callback: FireCallback) -> Result<Arc<dyn TriggerHandle>> {
        let schedule = parse_cron(expression)?;
        if self.root.is_cancelled() {
            return Err(SchedulerError::Clock("clock has been released".to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SchedulerError::Clock(e.to_string()))?;

        let trigger = Arc::new(CronTrigger {
            next: Mutex::new(next_after(&schedule, Utc::now())),
            schedule,
            token: self.root.child_token(),
        });
        runtime.spawn(drive(Arc::clone(&trigger), callback));
        Ok(trigger)
    }

    fn release_all(&self) -> Result<()> {
        if !self.root.is_cancelled() {
            self.root.cancel();
            info!("cron clock released");
        }
        Ok(())
    }
}

struct CronTrigger {
    schedule: cron::Schedule,
    next: Mutex<Option<DateTime<Utc>>>,
    token: CancellationToken,
}

impl CronTrigger {
    fn peek(&self) -> Option<DateTime<Utc>> {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move past `fired_at` so `next_fire_time` reports the upcoming instant
    /// while the callback for `fired_at` is still running.
    fn advance_past(&self, fired_at: DateTime<Utc>) {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner) =
            next_after(&self.schedule, fired_at);
    }
}

impl TriggerHandle for CronTrigger {
    fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        if self.token.is_cancelled() {
            None
        } else {
            self.peek()
        }
    }

    fn cancel(&self) {
        self.token.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

async fn drive(trigger: Arc<CronTrigger>, callback: FireCallback) {
    loop {
        let Some(at) = trigger.peek() else {
            debug!("cron schedule exhausted");
            break;
        };
        let wait = (at - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = trigger.token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        // Timers can wake a little early; sleep out the remainder.
        if Utc::now() < at {
            continue;
        }
        trigger.advance_past(at);
        tokio::spawn(callback());
    }
}
