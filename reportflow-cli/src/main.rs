//! Command-line shell driving the reportflow orchestrator end to end.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use reportflow::logs::LogKind;
use reportflow::observability::{init_tracing, LogFormat};
use reportflow::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "reportflow")]
#[command(version)]
#[command(about = "Run report transformation stages and inspect their logs", long_about = None)]
struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(short, long, value_name = "FILE", env = "REPORTFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Emit diagnostics as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    json_logs: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured stages in catalog order
    Stages,

    /// Upload a report and run stages against it in the given order
    Run {
        /// The spreadsheet report to upload
        #[arg(short, long, value_name = "FILE")]
        report: PathBuf,

        /// Stage ids to run
        #[arg(required = true)]
        stages: Vec<String>,

        /// Keep going after a stage fails or is blocked
        #[arg(long)]
        keep_going: bool,
    },

    /// Inspect or reset the run logs
    Logs {
        #[command(subcommand)]
        action: LogAction,
    },
}

#[derive(Subcommand)]
enum LogAction {
    /// Print the tail of a log
    View { which: LogKind },

    /// Truncate a log
    Clear { which: LogKind },

    /// Copy the full log to a file, or stdout when no file is given
    Download {
        which: LogKind,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show size and modification time of both logs
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    init_tracing(format, if cli.verbose { "debug" } else { "info" });

    let config = load_config(cli.config.as_deref())?;
    let orchestrator = Orchestrator::builder(config)
        .with_event_sink(Arc::new(LoggingEventSink::default()))
        .build()
        .context("Failed to initialize the pipeline")?;

    match cli.command {
        Commands::Stages => cmd_stages(&orchestrator),
        Commands::Run {
            report,
            stages,
            keep_going,
        } => cmd_run(&orchestrator, &report, &stages, keep_going).await,
        Commands::Logs { action } => cmd_logs(&orchestrator, action),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            PipelineConfig::from_path(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => {
            warn!("No configuration given, using defaults; no stage has a tool bound");
            Ok(PipelineConfig::new())
        }
    }
}

fn cmd_stages(orchestrator: &Orchestrator) -> Result<()> {
    for stage in orchestrator.stages() {
        println!("{:<26} {}", stage.id, stage.display_name);
        println!("{:<26}   input:  {}", "", stage.input);
        println!("{:<26}   output: {}", "", stage.output_path.display());
    }
    Ok(())
}

async fn cmd_run(
    orchestrator: &Orchestrator,
    report: &Path,
    stages: &[String],
    keep_going: bool,
) -> Result<()> {
    let bytes = std::fs::read(report)
        .with_context(|| format!("Failed to read report {}", report.display()))?;
    let filename = report
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut session = Session::new();
    let stored = orchestrator
        .upload(&mut session, &bytes, &filename)
        .context("Upload rejected")?;
    println!("Uploaded {} to {}", filename, stored.display());

    let mut failures = 0usize;
    for stage_id in stages {
        match orchestrator.run_stage(&mut session, stage_id).await {
            Ok(run) => {
                println!("== {} [{}]", stage_id, run.record.outcome);
                println!("{}", run.output());
                if !run.ok() {
                    failures += 1;
                }
            }
            Err(e) if e.is_dependency_unmet() => {
                println!("== {stage_id} [blocked]");
                println!("{e}");
                failures += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("Stage '{stage_id}' could not run")),
        }

        if failures > 0 && !keep_going {
            break;
        }
    }

    let status = orchestrator.latest_status(&session);
    println!("{}", serde_json::to_string_pretty(&status)?);

    if failures > 0 {
        bail!("{failures} stage(s) did not succeed");
    }
    Ok(())
}

fn cmd_logs(orchestrator: &Orchestrator, action: LogAction) -> Result<()> {
    match action {
        LogAction::View { which } => {
            let text = orchestrator.view_log(which)?;
            if text.is_empty() {
                println!("({which} log is empty)");
            } else {
                print!("{text}");
            }
        }
        LogAction::Clear { which } => {
            orchestrator.clear_log(which)?;
            println!("Cleared the {which} log");
        }
        LogAction::Download { which, output } => {
            let bytes = orchestrator.download_log(which)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {} bytes to {}", bytes.len(), path.display());
                }
                None => print!("{}", String::from_utf8_lossy(&bytes)),
            }
        }
        LogAction::Info => {
            for which in LogKind::ALL {
                let meta = orchestrator.log_metadata(which)?;
                println!(
                    "{:<10} {:<6} {:>10} bytes  {}",
                    which.as_str(),
                    if meta.exists { "yes" } else { "no" },
                    meta.size_bytes,
                    meta.modified_display().unwrap_or_else(|| "-".to_string())
                );
            }
        }
    }
    Ok(())
}
