use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use sketch_relay_core::config::{Config, LoggingConfig};
use sketch_relay_gateway::GatewayState;

#[derive(Parser)]
#[command(
    name = "sketch-relay",
    about = "Real-time relay for shared drawing rooms",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Port to listen on (default: $PORT, then config, then 3001)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: config, then 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show the status of a running server
    Status {
        /// Base URL of the server
        #[arg(long, default_value = "http://127.0.0.1:3001")]
        url: String,
    },

    /// Show one room on a running server
    Room {
        room_id: String,

        /// Base URL of the server
        #[arg(long, default_value = "http://127.0.0.1:3001")]
        url: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Check the configuration for problems
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_logging(&config.logging(), cli.verbose);

    match cli.command {
        Commands::Serve { port, bind } => {
            let env_port = std::env::var("PORT").ok();
            let port = resolve_port(port, env_port.as_deref(), &config);
            let bind = bind.unwrap_or_else(|| config.bind());

            let (warnings, errors) = config.validate();
            for warning in &warnings {
                tracing::warn!("{warning}");
            }
            if !errors.is_empty() {
                anyhow::bail!("Invalid configuration: {}", errors.join("; "));
            }

            let state = GatewayState::with_relay(config);
            #[cfg(feature = "metrics")]
            let state = state.with_prometheus(
                sketch_relay_gateway::metrics::install_prometheus_recorder()
                    .context("Failed to install Prometheus recorder")?,
            );

            tracing::info!("Starting Sketch Relay on {bind}:{port}");
            sketch_relay_gateway::start_gateway(Arc::new(state), &bind, port)
                .await
                .with_context(|| format!("Server on {bind}:{port} failed"))?;
        }
        Commands::Status { url } => {
            let body = fetch_json(&format!("{}/", url.trim_end_matches('/'))).await?;
            println!("Sketch Relay v{}", env!("CARGO_PKG_VERSION"));
            println!("Server: {url}");
            println!("Status: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Active rooms: {}", body["activeRooms"]);
            println!("Timestamp: {}", body["timestamp"].as_str().unwrap_or("-"));
        }
        Commands::Room { room_id, url } => {
            let body = fetch_json(room_url(&url, &room_id)?.as_str()).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                for error in &errors {
                    println!("error: {error}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} configuration error(s)", errors.len());
                }
                println!("Config OK: {}", config_path.display());
            }
        },
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level and per-crate filters.
fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directives(fallback)));
    let registry = tracing_subscriber::registry().with(filter);

    match (logging.is_json(), logging.is_stdout()) {
        (true, true) => registry
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .init(),
        (true, false) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        (false, true) => registry
            .with(fmt::layer().with_writer(std::io::stdout))
            .init(),
        (false, false) => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// `--port`, then a valid `$PORT`, then the config file (which defaults to 3001).
fn resolve_port(cli: Option<u16>, env: Option<&str>, config: &Config) -> u16 {
    if let Some(port) = cli {
        return port;
    }
    if let Some(raw) = env {
        match raw.trim().parse() {
            Ok(port) => return port,
            Err(e) => tracing::warn!(value = %raw, %e, "Ignoring invalid PORT"),
        }
    }
    config.port()
}

/// `{base}/room/{room_id}` with the id encoded as a single path segment.
fn room_url(base: &str, room_id: &str) -> anyhow::Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base).with_context(|| format!("Invalid URL: {base}"))?;
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("URL cannot take a path: {base}"))?
        .pop_if_empty()
        .push("room")
        .push(room_id);
    Ok(url)
}

async fn fetch_json(url: &str) -> anyhow::Result<serde_json::Value> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Could not reach {url}"))?
        .error_for_status()?;
    Ok(response.json().await?)
}
