//! CLI binary for rarefind.
//!
//! Runs one search session against the YouTube Data API and prints the rare
//! videos it finds. Progress and diagnostics go to stderr; results go to
//! stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::Parser;
use rare_search::{RareFinder, SearchError, SessionFailure, SessionState, YouTubeApi};
use rarefind::{AppConfig, report};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Find rarely viewed YouTube videos by adaptive publish-time search.
#[derive(Parser)]
#[command(name = "rarefind", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Center the first window on this instant (RFC 3339) instead of a random one.
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    /// Print the session report as JSON.
    #[arg(long)]
    json: bool,

    /// Override the view-count threshold below which a video is rare.
    #[arg(long)]
    threshold: Option<u64>,

    /// Do not print progress lines or the usage summary.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Stderr only, so stdout carries results.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rarefind=info,rare_search=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(threshold) = cli.threshold {
        config.search.rare_view_threshold = threshold;
    }
    config.validate()?;

    let api = YouTubeApi::new(config.youtube_config()?)?;
    let finder = RareFinder::new(api, config.search.clone())?;

    let progress = (!cli.quiet).then(|| tokio::spawn(print_progress(finder.subscribe())));

    let handle = match cli.at {
        Some(center) => finder.start_search_at(center),
        None => finder.start_search(),
    };

    let canceller = finder.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling search...");
            canceller.cancel();
        }
    });

    let outcome = handle.await?;
    if let Some(progress) = progress {
        progress.abort();
    }

    let state = finder.state();
    let code = match &outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(SearchError::Superseded) => ExitCode::from(130),
        Err(_) => ExitCode::FAILURE,
    };

    if cli.json {
        println!("{}", report::render_json(&state)?);
    } else {
        print_outcome(&state, &outcome);
    }
    if !cli.quiet {
        eprintln!("{}", report::usage_summary(&state.api_stats));
    }

    Ok(code)
}

/// Print status messages as the session publishes them.
async fn print_progress(mut updates: watch::Receiver<SessionState>) {
    let mut last: Option<String> = None;
    loop {
        let line = report::status_line(&updates.borrow_and_update());
        if let Some(line) = line {
            if last.as_ref() != Some(&line) {
                eprintln!("{line}");
                last = Some(line);
            }
        }
        if updates.changed().await.is_err() {
            break;
        }
    }
}

fn print_outcome(state: &SessionState, outcome: &Result<Vec<rare_search::VideoDetail>, SearchError>) {
    match outcome {
        Ok(results) => {
            eprintln!("{}", report::results_header(state));
            for video in results {
                println!("{}", report::result_row(video));
            }
        }
        Err(SearchError::Superseded) => eprintln!("Search cancelled."),
        Err(err) => {
            let failure = state
                .error
                .clone()
                .unwrap_or_else(|| SessionFailure::from_error(err));
            tracing::debug!(detail = %failure.detail, "session failure");
            eprintln!("{}", report::failure_line(&failure));
        }
    }
}
