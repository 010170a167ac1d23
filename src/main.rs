// src/main.rs
mod analysis;
mod config;
mod edgar;
mod extractors;
mod pipeline;
mod storage;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config::PipelineConfig;
use storage::StorageManager;
use utils::AppError;

/// Competitor-mention popularity vs. annual stock return
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory (overrides the config file)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON config file; defaults apply for anything it leaves out
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download annual filings from EDGAR
    Download {
        /// Only this ticker (default: every configured company)
        #[arg(short, long)]
        ticker: Option<String>,

        #[arg(long)]
        start_year: Option<i32>,

        #[arg(long)]
        end_year: Option<i32>,
    },
    /// Extract filing dates and company info from stored SEC headers
    ExtractDates,
    /// Count competitor mentions in stored filings (needs OPENAI_API_KEY)
    ExtractMentions,
    /// Build the filing, mention and aggregated mention tables
    Mentions,
    /// Compute annual stock returns from the price folder
    Returns,
    /// Regress demeaned returns on mention counts
    Regress,
    /// Run mentions, returns and regress
    Analyze,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    utils::logging::setup_logging(args.verbose);
    tracing::debug!("Parsed args: {:?}", args);

    let mut config = PipelineConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    let storage = StorageManager::new(&config.data_dir)?;
    tracing::info!("Using data directory {}", storage.base_dir().display());

    match args.command {
        Command::Download { ticker, start_year, end_year } => {
            config.start_year = start_year.or(config.start_year);
            config.end_year = end_year.or(config.end_year);
            config.validate()?;

            let tickers = match ticker {
                Some(t) => vec![t.to_uppercase()],
                None => config.tickers().map(str::to_string).collect(),
            };
            let summary = pipeline::download(&config, &tickers).await?;
            if summary.downloaded == 0 && summary.skipped == 0 && summary.failed > 0 {
                return Err(AppError::Processing(format!(
                    "Failed to download any of {} filings",
                    summary.failed
                )));
            }
        }
        Command::ExtractDates => {
            let dates = pipeline::extract_dates(&config, &storage)?;
            tracing::info!("Extracted dates for {} companies", dates.len());
        }
        Command::ExtractMentions => {
            let mentions = pipeline::extract_mentions(&config, &storage).await?;
            tracing::info!("Extracted mentions for {} companies", mentions.len());
        }
        Command::Mentions => {
            pipeline::mention_tables(&storage)?;
        }
        Command::Returns => {
            pipeline::returns(&config, &storage)?;
        }
        Command::Regress => {
            pipeline::regress(&storage)?;
        }
        Command::Analyze => pipeline::analyze(&config, &storage)?,
    }

    tracing::info!("Done");
    Ok(())
}
