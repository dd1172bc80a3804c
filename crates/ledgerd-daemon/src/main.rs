//! ledgerd: cron-scheduled batch jobs over a transaction ledger.
//!
//! Usage:
//!   ledgerd [run]                          Arm active jobs and wait for a signal
//!   ledgerd seed [--transactions N]        Insert default jobs and demo data
//!   ledgerd jobs [--json]                  List job definitions
//!   ledgerd runs [--job NAME] [--limit N]  List recent runs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use ledgerd_core::LedgerdConfig;
use ledgerd_scheduler::LifecycleManager;

mod app;
mod commands;
mod shutdown;

use app::App;

/// ledgerd - scheduled transaction processing and daily reports
#[derive(Parser)]
#[command(name = "ledgerd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to ledgerd.toml (falls back to LEDGERD_CONFIG, then ./ledgerd.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Arm every active job and run until SIGINT/SIGTERM (default)
    Run,

    /// Insert the default jobs and demo transactions dated yesterday
    Seed {
        /// Number of demo transactions to insert
        #[arg(short, long, default_value_t = 1000)]
        transactions: usize,
    },

    /// List job definitions
    Jobs {
        #[arg(long)]
        json: bool,
    },

    /// List recent run logs, newest first
    Runs {
        /// Only runs of this job
        #[arg(short, long)]
        job: Option<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ledgerd=info,ledgerd_scheduler=info,ledgerd_ledger=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    // load config: --config > LEDGERD_CONFIG env > ./ledgerd.toml
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .or_else(|| std::env::var("LEDGERD_CONFIG").ok());
    let config = LedgerdConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        LedgerdConfig::default()
    });

    let app = App::open(config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(app).await,
        Commands::Seed { transactions } => {
            let summary = commands::seed(&app, transactions)?;
            println!(
                "seeded {} job(s) and {} transaction(s)",
                summary.jobs_inserted, summary.transactions_inserted
            );
            Ok(())
        }
        Commands::Jobs { json } => {
            let jobs = app.jobs.list()?;
            commands::print_jobs(&mut std::io::stdout().lock(), &jobs, json)
        }
        Commands::Runs { job, limit, json } => {
            let runs = app.runs.recent(job.as_deref(), limit)?;
            commands::print_runs(&mut std::io::stdout().lock(), &runs, json)
        }
    }
}

async fn run(app: App) -> anyhow::Result<()> {
    let scheduler = Arc::new(app.scheduler());

    // Failing to read the job table at boot is fatal.
    let armed = scheduler.load_active_jobs()?;
    if armed == 0 {
        warn!("no active jobs armed; run `ledgerd seed` to create the defaults");
    }
    for name in scheduler.armed_jobs() {
        info!(job = %name, next_run_at = ?scheduler.next_fire_time(&name), "scheduled");
    }

    let lifecycle = Arc::new(LifecycleManager::new(scheduler));
    info!("ledgerd running; press Ctrl-C to stop");
    shutdown::wait_for_signal().await;

    let grace = Duration::from_secs(app.config.shutdown.grace_secs);
    shutdown::shutdown_within(lifecycle, grace).await;
    info!("ledgerd stopped");
    Ok(())
}
