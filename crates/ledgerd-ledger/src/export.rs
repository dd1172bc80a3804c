//! CSV report export.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use ledgerd_core::time::format_timestamp;

use crate::{
    db::amount_text,
    error::{LedgerError, Result},
    types::Transaction,
};

/// Where and how to write one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Base file name, e.g. `report.csv`. A trailing `.csv` is normalised.
    pub file_name: String,
    /// Overrides the exporter's default directory.
    pub directory: Option<PathBuf>,
    pub headers: bool,
    /// Append `_<generation time>` before the extension.
    pub include_timestamp: bool,
}

impl ExportOptions {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            directory: None,
            headers: true,
            include_timestamp: true,
        }
    }
}

/// One CSV line of the daily report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub kind: String,
    pub amount: String,
    pub status: String,
    pub consumer_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ReportRow {
    pub const HEADERS: [&'static str; 7] = [
        "id",
        "kind",
        "amount",
        "status",
        "consumer_id",
        "created_at",
        "updated_at",
    ];
}

impl From<&Transaction> for ReportRow {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            kind: tx.kind.to_string(),
            amount: amount_text(tx.amount),
            status: tx.status.to_string(),
            consumer_id: tx.consumer_id.clone(),
            created_at: format_timestamp(tx.created_at),
            updated_at: tx.updated_at.map(format_timestamp).unwrap_or_default(),
        }
    }
}

/// Writes report rows to a file and returns its path.
pub trait ReportExporter: Send + Sync {
    fn export(&self, rows: &[ReportRow], options: &ExportOptions) -> Result<PathBuf>;
}

/// File-system exporter backed by the `csv` crate.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    default_directory: PathBuf,
}

impl CsvExporter {
    pub fn new(default_directory: impl Into<PathBuf>) -> Self {
        Self {
            default_directory: default_directory.into(),
        }
    }

    fn prepare_directory(dir: &Path) -> Result<()> {
        let export_err = |reason: String| LedgerError::Export {
            path: dir.to_path_buf(),
            reason,
        };
        fs::create_dir_all(dir).map_err(|e| export_err(e.to_string()))?;
        let meta = fs::metadata(dir).map_err(|e| export_err(e.to_string()))?;
        if !meta.is_dir() {
            return Err(export_err("not a directory".to_string()));
        }
        if meta.permissions().readonly() {
            return Err(export_err("directory is read-only".to_string()));
        }
        Ok(())
    }
}

impl ReportExporter for CsvExporter {
    fn export(&self, rows: &[ReportRow], options: &ExportOptions) -> Result<PathBuf> {
        let dir = options
            .directory
            .clone()
            .unwrap_or_else(|| self.default_directory.clone());
        Self::prepare_directory(&dir)?;

        let stamp = options.include_timestamp.then(Utc::now);
        let path = dir.join(final_file_name(&options.file_name, stamp));
        let export_err = |reason: String| LedgerError::Export {
            path: path.clone(),
            reason,
        };

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(|e| export_err(e.to_string()))?;
        if options.headers {
            writer
                .write_record(ReportRow::HEADERS)
                .map_err(|e| export_err(e.to_string()))?;
        }
        for row in rows {
            writer.serialize(row).map_err(|e| export_err(e.to_string()))?;
        }
        writer.flush().map_err(|e| export_err(e.to_string()))?;

        info!(path = %path.display(), rows = rows.len(), "report exported");
        Ok(path)
    }
}

/// `report.csv` → `report_2025-07-18T09-05-00-000Z.csv` when stamped.
fn final_file_name(file_name: &str, stamp: Option<DateTime<Utc>>) -> String {
    let base = file_name.strip_suffix(".csv").unwrap_or(file_name);
    match stamp {
        Some(at) => format!("{base}_{}.csv", format_timestamp(at).replace([':', '.'], "-")),
        None => format!("{base}.csv"),
    }
}
