use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use ledgerd_scheduler::{BatchRoutine, RunOutcome};

use crate::{
    export::{ExportOptions, ReportExporter, ReportRow},
    store::TransactionStore,
    window::DayWindow,
};

/// Exports every transaction of one day, whatever its status, as a CSV report.
pub struct ReportGenerator {
    store: Arc<dyn TransactionStore>,
    exporter: Arc<dyn ReportExporter>,
    directory: Option<PathBuf>,
    headers: bool,
    include_timestamp: bool,
}

impl ReportGenerator {
    pub fn new(store: Arc<dyn TransactionStore>, exporter: Arc<dyn ReportExporter>) -> Self {
        Self {
            store,
            exporter,
            directory: None,
            headers: true,
            include_timestamp: true,
        }
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_headers(mut self, headers: bool) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timestamp(mut self, include_timestamp: bool) -> Self {
        self.include_timestamp = include_timestamp;
        self
    }

    /// `daily-report_<YYYY-MM-DD>.csv` for `window`.
    pub fn file_name(window: &DayWindow) -> String {
        format!("daily-report_{}.csv", window.iso_date())
    }

    pub async fn generate_report(&self) -> RunOutcome {
        self.generate_for(&DayWindow::previous_day()).await
    }

    /// Read failures and export failures both yield `{0, 0, 1, reason}`.
    pub async fn generate_for(&self, window: &DayWindow) -> RunOutcome {
        let date = window.iso_date();
        let transactions = match self.store.in_window(window) {
            Ok(rows) => rows,
            Err(e) => {
                error!(%date, error = %e, "failed to read transactions for report");
                return RunOutcome::failed(e.to_string());
            }
        };

        let rows: Vec<ReportRow> = transactions.iter().map(ReportRow::from).collect();
        let options = ExportOptions {
            file_name: Self::file_name(window),
            directory: self.directory.clone(),
            headers: self.headers,
            include_timestamp: self.include_timestamp,
        };
        match self.exporter.export(&rows, &options) {
            Ok(path) => {
                info!(%date, rows = rows.len(), path = %path.display(), "daily report generated");
                let n = u32::try_from(rows.len()).unwrap_or(u32::MAX);
                RunOutcome {
                    total: n,
                    success: n,
                    ..RunOutcome::default()
                }
            }
            Err(e) => {
                error!(%date, error = %e, "failed to export daily report");
                RunOutcome::failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl BatchRoutine for ReportGenerator {
    async fn run(&self) -> anyhow::Result<RunOutcome> {
        Ok(self.generate_report().await)
    }
}
