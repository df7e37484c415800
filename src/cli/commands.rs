//! Command implementations for the station climate CLI
//!
//! Summary and profile commands drive a background `SessionWorker`, the
//! same way an interactive front end would; inspect reads synchronously.

use crate::cli::args::{Args, Commands, InspectArgs, ProfileArgs, SummaryArgs};
use crate::config::PipelineConfig;
use crate::profile::MonthProfile;
use crate::session::DataSession;
use crate::worker::{SessionCommand, SessionEvent, SessionWorker};
use anyhow::{Context, Result, anyhow, bail};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info};

/// Main command runner
pub async fn run(args: Args) -> Result<()> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let config = args.pipeline_config();
    config.validate().context("Invalid configuration")?;

    match &args.command {
        Some(Commands::Summary(summary)) => {
            run_summary(summary, summary.apply_to(config), args.quiet).await
        }
        Some(Commands::Profile(profile)) => run_profile(profile, config, args.quiet).await,
        Some(Commands::Inspect(inspect)) => run_inspect(inspect.clone(), config).await,
        None => bail!("No command given"),
    }
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("station_climate={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

async fn run_summary(args: &SummaryArgs, config: PipelineConfig, quiet: bool) -> Result<()> {
    info!("Summarising {}", args.file.display());
    let aggregation = config.aggregation.to_string();
    let group_by = config.group_by.join(",");

    let spinner = create_spinner("Reading station data", quiet);
    let (worker, mut events) = SessionWorker::spawn(config)?;
    worker
        .send(SessionCommand::SetFilePath(args.file.clone()))
        .await?;

    let event = next_event(&mut events).await;
    spinner.finish_and_clear();
    let table = match event? {
        SessionEvent::NewData(table) => table,
        other => return fail_on(other, &args.file.display().to_string()),
    };
    worker.shutdown().await?;

    println!("{}", "Station summary".bright_green().bold());
    println!("  {} {}", "File:".bright_cyan(), args.file.display());
    if group_by.is_empty() {
        println!("  {} none", "Grouped by:".bright_cyan());
    } else {
        println!("  {} {}", "Grouped by:".bright_cyan(), group_by);
        println!("  {} {}", "Reductions:".bright_cyan(), aggregation);
    }
    println!();
    println!("{}", table);
    Ok(())
}

async fn run_profile(args: &ProfileArgs, config: PipelineConfig, quiet: bool) -> Result<()> {
    let spinner = create_spinner("Reading station data", quiet);
    let (worker, mut events) = SessionWorker::spawn(config)?;
    worker
        .send(SessionCommand::SetFilePath(args.file.clone()))
        .await?;

    let event = next_event(&mut events).await;
    spinner.set_message(format!("Profiling month {}", args.month));
    match event? {
        SessionEvent::NewData(_) => {}
        other => {
            spinner.finish_and_clear();
            return fail_on(other, &args.file.display().to_string());
        }
    }

    worker.send(SessionCommand::FilterMonth(args.month)).await?;
    let event = next_event(&mut events).await;
    spinner.finish_and_clear();
    let profile = match event? {
        SessionEvent::MonthProfile(profile) => profile,
        other => return fail_on(other, &args.file.display().to_string()),
    };
    worker.shutdown().await?;

    print_profile(&profile, args.month);
    Ok(())
}

async fn run_inspect(args: InspectArgs, config: PipelineConfig) -> Result<()> {
    let file = args.file.clone();
    let rows = args.rows;

    let (session, table) = tokio::task::spawn_blocking(move || {
        let mut session = DataSession::open(&args.file, config)?;
        let table = session.table()?;
        Ok::<_, crate::ClimateError>((session, table))
    })
    .await
    .context("Inspect task failed")?
    .with_context(|| format!("Failed to read {}", file.display()))?;

    let table = table.ok_or_else(|| anyhow!("No data read from {}", file.display()))?;

    println!("{}", "Station file".bright_green().bold());
    if let Some(source) = session.source() {
        let metadata = source.metadata();
        println!("  {} {}", "Name:".bright_cyan(), metadata.file_name);
        println!("  {} {}", "Directory:".bright_cyan(), metadata.file_dir.display());
        println!("  {} {} bytes", "Size:".bright_cyan(), metadata.filesize_bytes);
        println!("  {} {}", "Modified:".bright_cyan(), metadata.modified);
        if let Some(created) = metadata.created {
            println!("  {} {}", "Created:".bright_cyan(), created);
        }
    }

    if let Some(report) = session.last_report() {
        println!(
            "  {} {}",
            "Header lines:".bright_cyan(),
            report.boundaries.skip_rows
        );
        println!("  {} {}", "Rows read:".bright_cyan(), report.stats.rows_read);
        if report.stats.long_rows > 0 {
            println!(
                "  {} {}",
                "Rows with trailing notes:".bright_yellow(),
                report.stats.long_rows
            );
        }
    }

    println!();
    println!("{}", table.frame().head(Some(rows.min(table.height()))));
    Ok(())
}

fn print_profile(profile: &MonthProfile, requested: f64) {
    println!("{}", "Month profile".bright_green().bold());
    if (profile.month as f64 - requested.round()).abs() > f64::EPSILON {
        println!(
            "  {} {} (requested {})",
            "Month:".bright_cyan(),
            profile.month,
            requested
        );
    } else {
        println!("  {} {}", "Month:".bright_cyan(), profile.month);
    }
    println!("  {} {}", "Rows:".bright_cyan(), profile.rows);
    println!(
        "  {} {}",
        "Coldest minimum:".bright_cyan(),
        format_temperature(profile.summary.tmin_min)
    );
    println!(
        "  {} {}",
        "Mean average:".bright_cyan(),
        format_temperature(profile.summary.tavg_mean)
    );
    println!(
        "  {} {}",
        "Warmest maximum:".bright_cyan(),
        format_temperature(profile.summary.tmax_max)
    );

    for histogram in &profile.histograms {
        println!();
        println!(
            "{} ({} readings)",
            histogram.column.bright_yellow(),
            histogram.counted
        );
        for (bin, percent) in histogram.percent.iter().enumerate() {
            if *percent > 0.0 {
                println!(
                    "  {:>6.1} .. {:>6.1}  {:>5.1}%",
                    histogram.edges[bin],
                    histogram.edges[bin + 1],
                    percent
                );
            }
        }
    }
}

fn format_temperature(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.1} degC", value),
        None => "n/a".to_string(),
    }
}

/// Spinner shown while the worker reads and aggregates
fn create_spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn next_event(events: &mut Receiver<SessionEvent>) -> Result<SessionEvent> {
    events
        .recv()
        .await
        .ok_or_else(|| anyhow!("Session worker stopped unexpectedly"))
}

fn fail_on<T>(event: SessionEvent, file: &str) -> Result<T> {
    match event {
        SessionEvent::Failed(error) => {
            Err(error).with_context(|| format!("Failed to process {}", file))
        }
        SessionEvent::NoData => bail!("No data available from {}", file),
        other => bail!("Unexpected worker event: {:?}", other),
    }
}
