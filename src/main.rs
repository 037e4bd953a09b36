//! OS2Phonebook - main entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use os2phonebook::bootstrap;
use os2phonebook::server::{serve, AppState};
use os2phonebook::{Config, DataStore, ElasticBackend};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "os2phonebook", version, about = "Organisational phonebook service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP query API
    Serve,

    /// Import from OS2MO and load the search index
    Import {
        /// Replay the cache files instead of contacting OS2MO
        #[arg(long)]
        cache_only: bool,
    },

    /// Wait for the search index to come up
    Pingdb {
        /// How many probes before giving up
        #[arg(long, default_value_t = 120)]
        max_attempts: u64,

        /// Seconds between probes
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging is not up yet; print directly
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Configuration loaded successfully");

    let backend = Arc::new(ElasticBackend::new(
        config.datastore_url(),
        config.request_timeout,
    ));
    let datastore = Arc::new(DataStore::new(backend));

    match cli.command {
        Command::Serve => {
            let state = AppState::new(datastore, &config);
            serve(state, &config.bind_addr).await?;
        }

        Command::Import { cache_only } => {
            let result = if cache_only {
                info!("loading the phonebook from cache files");
                bootstrap::load_from_cache(&config, &datastore).map_err(anyhow::Error::from)
            } else {
                info!("starting a full OS2MO import");
                bootstrap::run_import(&config, &datastore)
                    .await
                    .map_err(anyhow::Error::from)
            };

            if let Err(e) = result {
                error!("import failed: {}", e);
                return Err(e);
            }
            info!("import completed");
        }

        Command::Pingdb {
            max_attempts,
            interval,
        } => {
            if !bootstrap::wait_for_datastore(datastore, max_attempts, interval).await {
                error!("datastore did not come up in time");
                anyhow::bail!("datastore unreachable after {} attempts", max_attempts);
            }
        }
    }

    Ok(())
}
