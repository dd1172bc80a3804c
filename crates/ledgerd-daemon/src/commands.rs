//! One-shot subcommands: seed, jobs, runs.

use std::io::Write;

use chrono::{DateTime, Utc};
use tracing::info;

use ledgerd_ledger::{jobs::seed_default_jobs, seed::demo_transactions, DayWindow};
use ledgerd_scheduler::{Job, RunLog};

use crate::app::App;

pub struct SeedSummary {
    pub jobs_inserted: usize,
    pub transactions_inserted: usize,
}

/// Insert the default jobs (if missing) and `transactions` demo rows dated
/// yesterday.
pub fn seed(app: &App, transactions: usize) -> anyhow::Result<SeedSummary> {
    let jobs_inserted = seed_default_jobs(&app.jobs)?;
    let window = DayWindow::previous_day();
    let ids = app
        .transactions
        .insert_many(&demo_transactions(transactions, &window))?;
    info!(
        jobs = jobs_inserted,
        transactions = ids.len(),
        date = %window.iso_date(),
        "seed complete"
    );
    Ok(SeedSummary {
        jobs_inserted,
        transactions_inserted: ids.len(),
    })
}

fn ts(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
}

pub fn print_jobs(out: &mut impl Write, jobs: &[Job], json: bool) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, jobs)?;
        writeln!(out)?;
        return Ok(());
    }
    if jobs.is_empty() {
        writeln!(out, "no jobs (try `ledgerd seed`)")?;
        return Ok(());
    }
    writeln!(out, "NAME\tSTATUS\tSCHEDULE\tLAST RUN\tNEXT RUN")?;
    for job in jobs {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            job.name,
            job.status,
            job.schedule,
            ts(job.last_run_at),
            ts(job.next_run_at)
        )?;
    }
    Ok(())
}

pub fn print_runs(out: &mut impl Write, runs: &[RunLog], json: bool) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, runs)?;
        writeln!(out)?;
        return Ok(());
    }
    if runs.is_empty() {
        writeln!(out, "no runs recorded")?;
        return Ok(());
    }
    writeln!(out, "ID\tJOB\tSTATUS\tSTARTED\tFINISHED\tTOTAL/OK/FAIL\tREASON")?;
    for run in runs {
        // Reasons can span many lines; the table shows the first.
        let reason = run
            .failure_reason
            .as_deref()
            .and_then(|r| r.lines().next())
            .unwrap_or("");
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}/{}/{}\t{}",
            run.id,
            run.job_name,
            run.status,
            run.started_at.to_rfc3339(),
            ts(run.finished_at),
            run.total_processed,
            run.total_success,
            run.total_failure,
            reason
        )?;
    }
    Ok(())
}
