use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::path::Path;

use tunefetch::cli::{Cli, Commands};
use tunefetch::core::config::{self, Config};
use tunefetch::core::logging::log_startup_summary;
use tunefetch::core::types::SongRequest;
use tunefetch::core::validation::validate_command_args;
use tunefetch::core::init_logger;
use tunefetch::download::resolver::select_candidate;
use tunefetch::download::{DirectoryTransport, Pipeline};
use tunefetch::telegram::run_bot;

/// Requester id used for requests coming from the command line.
const LOCAL_REQUESTER_ID: i64 = 0;

/// Main entry point
///
/// Parses CLI arguments and dispatches to the subcommand; `run` is the default.
///
/// # Errors
/// Returns an error if configuration, logging or bot startup fails.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    let cli = Cli::parse_args();
    let config = Config::load(cli.config.as_deref())?;

    init_logger(&config.log_level, config.log_file.as_deref())?;

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {}", panic_info);
    }));

    match cli.command.unwrap_or(Commands::Run { webhook: false }) {
        Commands::Run { webhook } => {
            log_startup_summary(&config);
            let token = config::bot_token().context("BOT_TOKEN (or TELOXIDE_TOKEN) is not set")?;
            run_bot(&config, token, webhook).await
        }
        Commands::Search { query } => run_search(&config, &query).await,
        Commands::Fetch { query, output } => run_fetch(&config, &query, &output).await,
    }
}

async fn run_search(config: &Config, args: &[String]) -> Result<()> {
    let query = validate_command_args(args)?;
    let pipeline = Pipeline::from_config(config).await;
    let candidates = pipeline.resolver().search(&query).await?;

    if candidates.is_empty() {
        println!("No results for '{}'", query);
        return Ok(());
    }
    for (i, candidate) in candidates.iter().enumerate() {
        println!("{:>2}. {}", i + 1, candidate.describe());
    }

    let settings = pipeline.resolver().settings();
    match select_candidate(candidates, settings.duration_ceiling_secs, settings.reject_overlong) {
        Some(picked) => println!("\nPicked: {}", picked.describe()),
        None => println!("\nNothing under {}s", settings.duration_ceiling_secs),
    }
    Ok(())
}

async fn run_fetch(config: &Config, args: &[String], output: &Path) -> Result<()> {
    fs_err::tokio::create_dir_all(output).await?;
    let pipeline = Pipeline::from_config(config).await;
    let transport = DirectoryTransport::new(output);

    let request = SongRequest::from_command_args(args, LOCAL_REQUESTER_ID);
    let outcome = pipeline.handle(&request, &transport).await;
    log::info!("Outcome: {}", outcome);

    if outcome.is_sent() {
        Ok(())
    } else {
        anyhow::bail!("request ended as {}", outcome)
    }
}
