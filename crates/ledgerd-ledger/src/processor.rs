use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use ledgerd_scheduler::{BatchRoutine, RunOutcome};

use crate::{error::Result, store::TransactionStore, window::DayWindow};

/// Completes yesterday's pending transactions page by page.
///
/// A row that fails to complete is counted, its reason kept, and the run
/// moves on. Invocations on one processor never overlap.
pub struct TransactionProcessor {
    store: Arc<dyn TransactionStore>,
    page_size: usize,
    gate: Mutex<()>,
}

impl TransactionProcessor {
    pub fn new(store: Arc<dyn TransactionStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            gate: Mutex::new(()),
        }
    }

    pub async fn process_pending(&self) -> Result<RunOutcome> {
        self.process_window(&DayWindow::previous_day()).await
    }

    /// Process every pending row created inside `window`.
    ///
    /// Returns `Err` only when the first page cannot be read. A read failure
    /// after rows were completed ends the run with the counts so far plus one
    /// failure carrying the read error.
    pub async fn process_window(&self, window: &DayWindow) -> Result<RunOutcome> {
        let _gate = self.gate.lock().await;

        let mut outcome = RunOutcome::default();
        let mut failed: HashSet<String> = HashSet::new();
        let mut reasons: Vec<String> = Vec::new();

        loop {
            // Rows that failed earlier in this run are still pending; read
            // past them so each page holds up to `page_size` fresh rows.
            let fetched = match self
                .store
                .pending_in_window(window, self.page_size + failed.len())
            {
                Ok(rows) => rows,
                Err(e) if outcome.total == 0 => return Err(e),
                Err(e) => {
                    warn!(error = %e, processed = outcome.total, "page read failed; run cut short");
                    outcome.failure += 1;
                    reasons.push(format!("page read failed: {e}"));
                    break;
                }
            };
            let page: Vec<_> = fetched
                .into_iter()
                .filter(|tx| !failed.contains(&tx.id))
                .take(self.page_size)
                .collect();
            if page.is_empty() {
                break;
            }

            for tx in page {
                outcome.total += 1;
                match self.store.complete(&tx.id, Utc::now()) {
                    Ok(()) => outcome.success += 1,
                    Err(e) => {
                        warn!(transaction = %tx.id, error = %e, "transaction not completed");
                        outcome.failure += 1;
                        reasons.push(format!("transaction {}: {e}", tx.id));
                        failed.insert(tx.id);
                    }
                }
            }
        }

        outcome.failure_reason = reasons.join("\n");
        info!(
            date = %window.iso_date(),
            total = outcome.total,
            success = outcome.success,
            failure = outcome.failure,
            "pending transactions processed"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl BatchRoutine for TransactionProcessor {
    async fn run(&self) -> anyhow::Result<RunOutcome> {
        Ok(self.process_pending().await?)
    }
}
