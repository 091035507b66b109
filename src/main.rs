use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use box_ev::calc::{
    calculate_box_expectation, run_simulation, BoxInput, CalculationResult, DetailedExpectation,
    SimulationPlan,
};
use box_ev::service::{BoxEvService, ServiceConfig};

#[derive(Parser)]
#[command(name = "box-ev")]
#[command(about = "Trading-card box expected value engine")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gRPC server
    Serve {
        /// Path to JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Listen address, overrides the config file
        #[arg(long, env = "BOX_EV_ADDR")]
        addr: Option<String>,
    },

    /// Calculate a box described by a JSON file and print the result
    Calc {
        /// Box input JSON (boxPrice, rarities, cards)
        input: PathBuf,

        /// Path to JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also run a Monte Carlo simulation with this many trials
        #[arg(long)]
        simulate: Option<usize>,

        /// Seed for the simulation
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// `calc` 子命令的輸出
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CalcOutput {
    closed_form: CalculationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation: Option<DetailedExpectation>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { config, addr } => serve(config, addr).await,
        Commands::Calc {
            input,
            config,
            simulate,
            seed,
        } => calc(input, config, simulate, seed),
    }
}

async fn serve(
    config_path: Option<PathBuf>,
    addr: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServiceConfig::load(config_path.as_deref())?;
    if let Some(addr) = addr {
        config.listen_addr = addr;
    }
    let socket = config.socket_addr()?;
    let ttl = config.cache_ttl();

    let service = BoxEvService::new(config)?;

    // 定期清理過期快取
    if !ttl.is_zero() {
        let cache = service.cache();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ttl.max(Duration::from_secs(1)));
            loop {
                interval.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, "expired cache entries purged");
                }
            }
        });
    }

    info!("box-ev v{} gRPC server listening on {}", env!("CARGO_PKG_VERSION"), socket);

    tonic::transport::Server::builder()
        .add_service(service.into_server())
        .serve(socket)
        .await?;

    Ok(())
}

fn calc(
    input: PathBuf,
    config_path: Option<PathBuf>,
    simulate: Option<usize>,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::load(config_path.as_deref())?;
    let prepared = BoxInput::from_json(&std::fs::read_to_string(&input)?)?
        .prepare(&config.duplicate_policy())?;

    let closed_form = calculate_box_expectation(
        &prepared.cards,
        &prepared.composition,
        prepared.box_price,
        &config.thresholds()?,
    );

    let simulation = match simulate {
        Some(requested) => {
            let options = config.simulation_options(requested, seed);
            let plan = SimulationPlan::new(&prepared.cards, &prepared.composition);
            Some(run_simulation(&plan, &options, prepared.box_price, |_| {
                ControlFlow::Continue(())
            })?)
        }
        None => None,
    };

    let output = CalcOutput {
        closed_form,
        simulation,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
