//! `insight`: run business analyses through the relay from a terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use insight_stream::{
    AnalysisClient, AnalysisRunner, Dashboard, FileSessionStore, LogEntry, Outcome,
    PersistenceBridge, RunUpdate,
};

mod render;

#[derive(Parser)]
#[command(name = "insight", about = "Business idea analysis from the terminal")]
struct Cli {
    /// Base URL of the relay
    #[arg(long, env = "INSIGHT_RELAY_URL", default_value = "http://localhost:3000")]
    relay_url: String,

    /// Directory holding the session's stored progress and result
    #[arg(long, env = "INSIGHT_SESSION_DIR")]
    session_dir: Option<PathBuf>,

    /// Give up when the stream is silent this long
    #[arg(long, default_value_t = 300)]
    idle_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse a business idea and show the dashboard when it completes
    Run {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Show the stored results
    Dashboard,
    /// Show the stored progress of the latest run
    Progress,
    /// Clear stored progress and results
    Reset,
    /// Generate a report from the stored results
    Report,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("insight=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let session_dir = cli
        .session_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("insight-session"));
    let store = Arc::new(
        FileSessionStore::open(&session_dir)
            .with_context(|| format!("Failed to open session dir {}", session_dir.display()))?,
    );
    tracing::debug!(dir = %session_dir.display(), "Using session directory");
    let bridge = PersistenceBridge::new(store.clone());

    match cli.command {
        Command::Run { query } => {
            let query = query.join(" ");
            ensure!(!query.trim().is_empty(), "Query must not be empty");
            let client = AnalysisClient::new(&cli.relay_url, Duration::from_secs(cli.idle_timeout_secs))
                .context("Failed to build HTTP client")?;
            run(AnalysisRunner::new(client, store), &query).await
        }
        Command::Dashboard => {
            print!("{}", render::dashboard(&bridge.load_dashboard()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Progress => {
            let snapshot = bridge
                .load_progress()
                .context("Failed to read stored progress")?;
            print!("{}", render::progress(snapshot.as_ref()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset => {
            bridge.reset().context("Failed to clear session")?;
            println!("Session cleared.");
            Ok(ExitCode::SUCCESS)
        }
        Command::Report => {
            println!("Report generation is not available yet.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(mut runner: AnalysisRunner<Arc<FileSessionStore>>, query: &str) -> Result<ExitCode> {
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}") {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_message("Starting analysis");

    let mut updates = runner.start(query).await;
    while let Some(update) = updates.recv().await {
        match update {
            RunUpdate::Event(event) if event.is_final => {
                bar.println(render::log_entry(&LogEntry::from_event(&event)));
            }
            RunUpdate::Event(_) => {}
            RunUpdate::Progress(snapshot) => {
                bar.set_position(u64::from(snapshot.progress));
                if let Some(stage) = &snapshot.current_stage {
                    bar.set_message(stage.title.clone());
                }
            }
            RunUpdate::Finished(_) => {}
        }
    }

    let report = runner
        .wait()
        .await
        .context("Analysis task ended unexpectedly")?;

    match report.outcome {
        Outcome::Completed(result) => {
            bar.finish_with_message("Analysis complete");
            println!();
            print!("{}", render::dashboard(&Dashboard::Ready(result)));
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Failed(failure) => {
            bar.abandon_with_message("Analysis failed");
            if failure.user_message().is_none() {
                eprintln!("{failure}");
            }
            Ok(ExitCode::FAILURE)
        }
        Outcome::Incomplete => {
            bar.abandon_with_message("Stream ended before final results");
            Ok(ExitCode::FAILURE)
        }
    }
}
