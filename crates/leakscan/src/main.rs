//! leakscan CLI
//!
//! Fetches a player's games from a remote source, runs the leak analysis
//! pipeline against a local UCI engine, and prints the report as JSON.

use std::process;
use std::sync::Arc;

use tracing::{error, info};

use leakscan::config::{AnalyzeOptions, EngineConfig};
use leakscan::pipeline::LeakAnalyzer;
use leakscan::progress::Progress;

const USAGE: &str = "usage: leakscan <username> [--source lichess|chesscom] [--max-games N] \
[--depth N] [--mode openings|tactics|both] [--max-tactics N]";

fn parse_args() -> Option<(String, AnalyzeOptions)> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut username: Option<String> = None;
    let mut opts = AnalyzeOptions::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--source" => {
                opts.source = args.get(i + 1)?.parse().ok()?;
                i += 2;
            }
            "--max-games" => {
                opts.max_games = args.get(i + 1)?.parse().ok()?;
                i += 2;
            }
            "--depth" => {
                opts.engine_depth = args.get(i + 1)?.parse().ok()?;
                i += 2;
            }
            "--mode" => {
                opts.scan_mode = args.get(i + 1)?.parse().ok()?;
                i += 2;
            }
            "--max-tactics" => {
                opts.max_tactics = args.get(i + 1)?.parse().ok()?;
                i += 2;
            }
            other if !other.starts_with("--") && username.is_none() => {
                username = Some(other.to_string());
                i += 1;
            }
            _ => return None,
        }
    }

    Some((username?, opts))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let Some((username, mut opts)) = parse_args() else {
        eprintln!("{USAGE}");
        process::exit(2);
    };

    opts.on_progress = Some(Arc::new(|progress: &Progress| {
        match (progress.current, progress.total) {
            (Some(current), Some(total)) => {
                info!(phase = ?progress.phase, message = %progress.message, current, total, "progress");
            }
            _ => {
                info!(phase = ?progress.phase, message = %progress.message, "progress");
            }
        }
    }));

    let engine_config = EngineConfig::from_env();
    info!(engine = %engine_config.path, "starting analysis");

    let analyzer = LeakAnalyzer::new(engine_config);
    match analyzer.analyze(&username, &opts).await {
        Ok(report) => {
            info!(
                games = report.games_analyzed,
                leaks = report.leaks.len(),
                tactics = report.missed_tactics.len(),
                "analysis complete"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "analysis failed");
            process::exit(1);
        }
    }
}
