use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "ledgerd.toml";
pub const DEFAULT_DB_PATH: &str = "ledgerd.db";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_EXPORT_DIR: &str = "./exports";
pub const DEFAULT_GRACE_SECS: u64 = 5;

/// Top-level config (ledgerd.toml + LEDGERD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerdConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// When false (default) a fire is rejected while the previous run of the
    /// same job is still open.
    #[serde(default)]
    pub allow_overlapping_runs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Rows fetched per page by the transaction processor.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Daily report export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_export_dir")]
    pub directory: String,
    /// Write a header row as the first CSV line.
    #[serde(default = "bool_true")]
    pub headers: bool,
    /// Append a generation timestamp to the file name.
    #[serde(default = "bool_true")]
    pub include_timestamp: bool,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            directory: default_export_dir(),
            headers: true,
            include_timestamp: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Upper bound on the shutdown sequence before the process exits anyway.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_secs: DEFAULT_GRACE_SECS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_export_dir() -> String {
    DEFAULT_EXPORT_DIR.to_string()
}
fn default_grace_secs() -> u64 {
    DEFAULT_GRACE_SECS
}

impl LedgerdConfig {
    /// Load config from a TOML file with LEDGERD_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `LEDGERD_PROCESSING__PAGE_SIZE=250`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path))
                .merge(Env::prefixed("LEDGERD_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        let config: LedgerdConfig = figment
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;
        if config.processing.page_size == 0 {
            return Err(crate::error::CoreError::Config(
                "processing.page_size must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_yields_defaults() {
        let config = LedgerdConfig::from_figment(Figment::new()).unwrap();
        assert_eq!(config.database.path, DEFAULT_DB_PATH);
        assert_eq!(config.processing.page_size, 100);
        assert_eq!(config.reports.directory, "./exports");
        assert!(config.reports.headers);
        assert!(config.reports.include_timestamp);
        assert!(!config.scheduler.allow_overlapping_runs);
        assert_eq!(config.shutdown.grace_secs, 5);
    }

    #[test]
    fn toml_overrides_selected_keys() {
        let toml = r#"
            [processing]
            page_size = 25

            [reports]
            directory = "/var/lib/ledgerd/reports"
            include_timestamp = false
        "#;
        let config = LedgerdConfig::from_figment(Figment::new().merge(Toml::string(toml))).unwrap();
        assert_eq!(config.processing.page_size, 25);
        assert_eq!(config.reports.directory, "/var/lib/ledgerd/reports");
        assert!(!config.reports.include_timestamp);
        assert!(config.reports.headers);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let toml = "[processing]\npage_size = 0\n";
        let err = LedgerdConfig::from_figment(Figment::new().merge(Toml::string(toml))).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }
}
