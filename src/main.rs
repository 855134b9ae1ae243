use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fairmeet::api::AppState;
use fairmeet::places::AutocompleteProvider;
use fairmeet::{FairmeetConfig, GeocodeCache, GoogleMapsClient, MeetingPlanner, Participant, SearchRequest};

#[derive(Debug, Parser)]
#[command(name = "fairmeet", version, about = "Find a meeting place that is fair for everyone")]
struct Cli {
    /// Configuration file, defaults to <config dir>/fairmeet/config.toml
    #[arg(long, env = "FAIRMEET_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rank venues for a group of people
    Search {
        /// A participant as NAME=ADDRESS[@MODE], repeat for every person
        #[arg(short, long = "person", required = true)]
        people: Vec<Participant>,

        /// Place type to look for (cafe, restaurant, bar, ...)
        #[arg(long, default_value = "cafe")]
        place_type: String,

        /// fairness, minimize_max, minimize_total or rating
        #[arg(long)]
        strategy: Option<String>,

        #[arg(long)]
        max_results: Option<usize>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Address suggestions for partial input
    Suggest { input: String },
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "FAIRMEET_ADDR", default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

fn init_tracing(config: &FairmeetConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

fn build_cache(config: &FairmeetConfig) -> Result<GeocodeCache> {
    let cache = &config.cache;
    match &cache.persistent_path {
        Some(path) => GeocodeCache::with_persistence(cache.ttl(), cache.max_entries, path)
            .with_context(|| format!("Failed to open geocode cache at {}", path.display())),
        None => Ok(GeocodeCache::in_memory(cache.ttl(), cache.max_entries)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FairmeetConfig::load_from_path(cli.config.clone())?;
    init_tracing(&config, cli.verbose);

    let client = Arc::new(GoogleMapsClient::new(&config.google)?);
    let cache = Arc::new(build_cache(&config)?);
    let planner = MeetingPlanner::from_providers(
        client.clone(),
        client.clone(),
        client.clone(),
        cache,
        config.search.clone(),
    );

    match cli.command {
        Command::Search {
            people,
            place_type,
            strategy,
            max_results,
            json,
        } => {
            let request = SearchRequest {
                participants: people,
                place_type,
                strategy,
                max_results,
            };
            let plan = planner.plan(&request).await.map_err(|e| {
                tracing::error!("Search failed at the {} stage: {}", e.stage(), e);
                anyhow::anyhow!(e.user_message())
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print!("{plan}");
            }
        }
        Command::Suggest { input } => {
            for suggestion in client.suggest(&input).await {
                println!("{}", suggestion.description);
            }
        }
        Command::Serve { addr } => {
            let state = AppState {
                planner: Arc::new(planner),
                suggester: client,
            };
            fairmeet::web::run(addr, state).await?;
        }
    }

    Ok(())
}
