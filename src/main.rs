//! sitesearch CLI entry point

use clap::{Parser, Subcommand};
use sitesearch::{
    config::Config,
    error::Result,
    morph::{AnalyzerHandle, Passthrough},
    server::{self, AppState},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sitesearch")]
#[command(version, about = "Site crawler and lemma-based full-text search engine", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "sitesearch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve,

    /// Run a full indexing pass over the configured sites
    Crawl,

    /// Search the index
    Search {
        /// The search query
        query: String,

        /// Restrict to one site root URL
        #[arg(long)]
        site: Option<String>,

        /// Result offset for pagination
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show per-site index status and counts
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = Arc::new(Config::load(&cli.config)?);
    let analyzer: AnalyzerHandle = Arc::new(Passthrough);

    match cli.command {
        Commands::Serve => {
            server::serve(config, analyzer).await?;
        }

        Commands::Crawl => {
            let state = AppState::new(config, analyzer).await?;
            state.flag.begin();
            state.crawler.run().await?;
        }

        Commands::Search {
            query,
            site,
            offset,
            limit,
        } => {
            let state = AppState::new(config, analyzer).await?;
            let outcome = state
                .engine
                .search(&query, site.as_deref(), offset, limit)
                .await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{} results", outcome.count);
                for hit in outcome.data {
                    println!("{:.3}  {}{}  {}", hit.relevance, hit.site, hit.uri, hit.title);
                    if !hit.snippet.is_empty() {
                        println!("       {}", hit.snippet);
                    }
                }
            }
        }

        Commands::Status => {
            let state = AppState::new(config, analyzer).await?;
            let sites = state.store.all_sites().await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&sites)?);
            } else if sites.is_empty() {
                println!("No sites indexed yet");
            } else {
                for site in sites {
                    let stats = state.store.site_stats(site.id).await?;
                    println!(
                        "{}  {}  pages: {}  lemmas: {}",
                        site.url, site.status, stats.page_count, stats.lemma_count
                    );
                    if let Some(err) = site.last_error {
                        println!("  last error: {}", err);
                    }
                }
            }
        }
    }

    Ok(())
}
