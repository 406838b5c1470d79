mod config;
mod demo;
mod setup;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use setup::initialize_app;
use telemetry::{init_telemetry, log_config_validation, log_startup_info};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "engine-server")]
#[command(about = "Task dispatch engine: priority queue, concurrency gates, and progress aggregation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format override (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Build an in-memory repository and the built-in executors, run a
    /// sample task hierarchy to completion, and exit.
    #[arg(long)]
    demo: bool,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_file) => {
            info!("loading configuration from file: {}", config_file);
            Config::from_file(config_file)?
        }
        None => {
            info!("loading configuration from environment");
            Config::from_env()?
        }
    };

    if let Some(ref log_level) = cli.log_level {
        config.logging.level = log_level.clone();
    }

    if let Some(ref log_format) = cli.log_format {
        config.logging.format = match log_format.to_lowercase().as_str() {
            "pretty" => config::LogFormat::Pretty,
            "json" => config::LogFormat::Json,
            "compact" => config::LogFormat::Compact,
            other => return Err(anyhow::anyhow!("invalid log format: {other}. must be one of: pretty, json, compact")),
        };
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("failed to load configuration")?;

    init_telemetry(&config.logging).context("failed to initialize telemetry")?;
    log_config_validation(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "configuration validation failed");
        std::process::exit(1);
    }

    log_startup_info(&config);

    let app = initialize_app(&config).context("failed to initialize application")?;
    let dispatcher = app.dispatcher.clone();
    let dispatch_loop = tokio::spawn(dispatcher.clone().run());

    if cli.demo {
        info!("running demo hierarchy");
        let summary = demo::run_demo(&app.service).await.context("demo hierarchy failed")?;
        println!("{summary}");
        dispatcher.shutdown();
        let _ = dispatch_loop.await;
        return Ok(());
    }

    println!("engine-server is running. Press Ctrl+C to shut down.");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown signal received");
    dispatcher.shutdown();
    let _ = dispatch_loop.await;
    info!("engine-server shut down cleanly");
    Ok(())
}
