//! CLI helper functions

use crate::{
    config::ExportConfig,
    etl::{ExportOutcome, ExportProgress, ExportStatus, RunState, format_bytes},
    export::{DryRunReport, describe, prepare},
    schema::Schema,
    transform::{Instruction, TRANSFORMERS, fake::catalog},
};
use eyre::Result;
use owo_colors::OwoColorize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often the progress reporter logs while an export runs
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Check that re-scanned instructions account for every parsed flag value
///
/// `expected` pairs each transformer kind with the number of values the
/// argument parser collected for it.
///
/// # Errors
/// Returns an error when a kind was scanned a different number of times
pub fn check_instruction_counts(
    instructions: &[Instruction],
    expected: &[(&str, usize)],
) -> Result<()> {
    for (kind, count) in expected {
        let found = instructions
            .iter()
            .filter(|i| i.kind.eq_ignore_ascii_case(kind))
            .count();
        if found != *count {
            eyre::bail!(
                "Could not read the order of --{} arguments: parsed {} value(s) but found {}",
                kind,
                count,
                found
            );
        }
    }
    Ok(())
}

/// Render the faker catalog and transformer kinds as plain text
pub fn fake_catalog() -> String {
    let mut out = String::from("Transformers:\n");
    for descriptor in TRANSFORMERS {
        out.push_str(&format!(
            "  {:<22} {}\n",
            descriptor.flags.join(", "),
            descriptor.summary
        ));
    }

    out.push_str("\nFakers (dataset.method):\n");
    let mut dataset = "";
    for faker in catalog::all() {
        if faker.dataset != dataset {
            dataset = faker.dataset;
            out.push_str(&format!("  {}\n", dataset));
        }
        out.push_str(&format!(
            "    {:<20} {} ({})\n",
            faker.path(),
            faker.description,
            faker.logical_type
        ));
    }
    out
}

fn schema_lines(schema: &Schema) -> String {
    schema
        .columns()
        .iter()
        .map(|c| {
            let mut line = format!("  {} {}", c.name, c.logical_type);
            if !c.nullable {
                line.push_str(" not null");
            }
            if c.is_virtual {
                line.push_str(" (virtual, not exported)");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a dry-run report for the terminal
pub fn render_dry_run(report: &DryRunReport) -> String {
    let transformers = if report.transformers.is_empty() {
        "none".to_string()
    } else {
        report.transformers.join(" -> ")
    };
    format!(
        "Source schema:\n{}\n\nTransformers: {}\n\nOutput schema:\n{}\n",
        schema_lines(&report.source),
        transformers,
        schema_lines(&report.transformed)
    )
}

/// Open the source and print the schema the sink would receive
pub async fn dry_run(config: &ExportConfig) -> Result<DryRunReport> {
    log::info!(
        "Dry run: {} -> {}",
        config.input.bright_black(),
        config.output.bright_black()
    );
    let report = describe(config).await?;
    print!("{}", render_dry_run(&report));
    Ok(report)
}

/// Log a progress line periodically until the run reaches a terminal state
pub fn spawn_progress_reporter(
    progress: Arc<ExportProgress>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let snapshot = progress.snapshot();
            if snapshot.state.is_terminal() {
                break;
            }
            if snapshot.state == RunState::Running || snapshot.state == RunState::Draining {
                log::info!("{}", snapshot);
            }
        }
    })
}

/// Cancel `token` when the process receives Ctrl-C
pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping export");
            token.cancel();
        }
    })
}

/// Run an export with progress reporting
///
/// Pipeline: resolved reader -> configured transformers -> resolved writer
pub async fn export(config: &ExportConfig, cancel: CancellationToken) -> Result<ExportOutcome> {
    log::info!(
        "Exporting {} to {}",
        config.input.bright_black(),
        config.output.bright_black()
    );
    if config.limit > 0 {
        log::info!("Row limit: {}", config.limit.cyan());
    }

    let pipeline = prepare(config)?;
    let reporter = spawn_progress_reporter(pipeline.progress(), PROGRESS_INTERVAL);
    let result = pipeline.run(cancel).await;
    reporter.abort();

    let outcome = result?;
    let summary = format!(
        "{} rows, {}",
        outcome.rows_written,
        format_bytes(outcome.bytes_written)
    );
    match outcome.status {
        ExportStatus::Completed => {
            log::info!("Wrote {} to {}", summary.green(), config.output.bright_black())
        }
        ExportStatus::Cancelled(_) => {
            log::info!("Wrote {} to {}", summary.yellow(), config.output.bright_black())
        }
    }
    Ok(outcome)
}
