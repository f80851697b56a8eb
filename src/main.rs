use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use polite_fetch::config::AppConfig;
use polite_fetch::loader::load_url_list;
use polite_fetch::pipeline::Pipeline;
use polite_fetch::utils;
use polite_fetch::{FetchOptions, FetchOutcome, Fetcher, Method};

#[derive(Parser)]
#[command(name = "polite-fetch", about = "Rate-limited HTTP fetcher with retries", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one URL and print its body (or final URL)
    Get {
        url: String,

        /// Print the final URL after redirects instead of the body
        #[arg(long)]
        url_only: bool,

        /// Resolve with a HEAD request (implies --url-only)
        #[arg(long)]
        head: bool,

        #[arg(long)]
        cookie: Option<String>,

        #[arg(long, env = "FETCH_PROXY")]
        proxy: Option<String>,

        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Fetch every URL listed in a file
    Batch {
        file: PathBuf,

        #[arg(long)]
        url_only: bool,

        #[arg(long, env = "FETCH_PROXY")]
        proxy: Option<String>,
    },

    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "polite_fetch=info,warn",
        1 => "polite_fetch=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Get {
            url,
            url_only,
            head,
            cookie,
            proxy,
            user_agent,
        } => {
            let fetcher = Fetcher::new(&config.fetcher).context("Failed to build fetcher")?;
            let options = FetchOptions {
                want_content: !(url_only || head),
                cookie,
                proxy,
                user_agent,
                method: if head { Method::Head } else { Method::Get },
                ..FetchOptions::default()
            };

            match fetcher.fetch_outcome(&url, &options).await? {
                FetchOutcome::Success(out) | FetchOutcome::SuccessUrlOnly(out) => {
                    println!("{}", out);
                }
                // the failure itself has already been logged
                FetchOutcome::Failure { .. } => std::process::exit(1),
            }
        }

        Command::Batch {
            file,
            url_only,
            proxy,
        } => {
            let _t = utils::Timer::start("Batch fetch");
            let urls = load_url_list(&file)?;
            let fetcher = Fetcher::new(&config.fetcher).context("Failed to build fetcher")?;
            let options = FetchOptions {
                want_content: !url_only,
                proxy,
                channel: Some("batch".to_string()),
                ..FetchOptions::default()
            };

            let (items, stats) = Pipeline::new(fetcher, config.pipeline.clone())
                .run(urls, options)
                .await;

            for item in &items {
                println!("{}\t{}", item.url, utils::preview(&item.content, 80).replace('\n', " "));
            }
            info!(
                "Done: {} fetched, {} skipped, {} errors",
                stats.fetched, stats.skipped, stats.errors
            );
        }

        Command::Config => {
            println!("{:#?}", config);
        }
    }

    Ok(())
}
