mod config;
mod logging;
mod statsd;

use clap::{Parser, Subcommand};
use config::Config;
use gateway::{AppState, Store};
use response_cache::ResponseCache;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use upstreams::Upstreams;

#[derive(Parser)]
#[command(about = "GeoGrow agricultural API")]
struct Cli {
    /// YAML config file. Defaults apply when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the HTTP server (the default).
    Serve,
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    match cli.command.unwrap_or(CliCommand::Serve) {
        CliCommand::CheckConfig => println!("config ok"),
        CliCommand::Serve => {
            let _sentry = logging::init(&config.logging);
            if let Err(err) = run(config) {
                error!(error = %err, "server failed");
                process::exit(1);
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Metrics(#[from] statsd::MetricsError),
    #[error("could not open store: {0}")]
    Store(#[from] gateway::StoreError),
    #[error(transparent)]
    Upstreams(#[from] upstreams::UpstreamError),
    #[error(transparent)]
    Gateway(#[from] gateway::GatewayError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn run(config: Config) -> Result<(), StartupError> {
    if let Some(metrics_config) = &config.metrics {
        statsd::init(metrics_config)?;
    }

    let store = Store::open(&config.gateway.store)?;
    let upstreams = Upstreams::from_config(&config.upstreams)?;
    info!(
        store = store.backend(),
        ai_live = upstreams.ai.is_live(),
        weather_live = upstreams.weather.is_live(),
        market_live = upstreams.market.is_live(),
        "starting GeoGrow"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let cache = ResponseCache::new(&config.cache);
        let state = AppState::new(config.gateway, cache, upstreams, store);
        gateway::serve(state).await
    })?;
    Ok(())
}
