//! Transport NSW CLI
//!
//! Command-line departure monitor for Transport for NSW stops.

#![allow(clippy::print_stdout)]

mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use integration_transport_nsw::{
    DepartureClient, DepartureInfo, DepartureMonitor, DepartureQuery, TransportNswClient,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Transport NSW CLI
#[derive(Parser)]
#[command(name = "transport-nsw-cli")]
#[command(author, version, about = "Next departures from Transport for NSW", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: ./transport-nsw.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the next departure at a stop
    ///
    /// Example: transport-nsw-cli departures --stop 200060 --route T1
    Departures {
        /// Stop identifier
        #[arg(short, long)]
        stop: String,

        /// Only departures of this route number
        #[arg(short, long, default_value = "")]
        route: String,

        /// Only departures to this destination (takes precedence over --route)
        #[arg(short, long, default_value = "")]
        destination: String,

        /// Open data API key
        #[arg(long, env = "TRANSPORT_NSW_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Skip departures due in this many minutes or fewer
        #[arg(long, default_value_t = 0)]
        min_due: i64,

        /// Re-query every N seconds until interrupted
        #[arg(short, long)]
        watch: Option<u64>,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the Transport NSW API is reachable
    Health,
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Render a departure record for the terminal
fn render(info: &DepartureInfo, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(info)?);
    }

    if info.is_available() {
        Ok(format!("🚉 Stop {}: {info}", info.stop_id))
    } else {
        Ok(format!("🚉 {info}"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = log_filter_from_verbosity(cli.verbose);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let client = TransportNswClient::new(&config)?;

    match cli.command {
        Commands::Departures {
            stop,
            route,
            destination,
            api_key,
            min_due,
            watch,
            json,
        } => {
            let query = DepartureQuery::new(stop, api_key)
                .with_route(route)
                .with_destination(destination)
                .with_min_due_minutes(min_due);

            let mut monitor = DepartureMonitor::new(client);

            let Some(interval) = watch else {
                let info = monitor.get_departures(&query).await;
                println!("{}", render(&info, json)?);
                return Ok(());
            };

            info!(interval_secs = interval, "Watching departures");
            loop {
                let info = monitor.get_departures(&query).await;
                println!("{}", render(&info, json)?);

                tokio::select! {
                    () = tokio::time::sleep(Duration::from_secs(interval)) => {},
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        },

        Commands::Health => {
            if client.is_healthy().await {
                println!("✅ Reachable: {}", client.config().base_url);
            } else {
                println!("❌ Unreachable: {}", client.config().base_url);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
