use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ev_county_map::{config, data, render, server};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the styled county map, legend and statistics into the output dir
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the dashboard data and static front-end
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            info!("Generating dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // 1. Fetch, aggregate and style
            let dashboard = data::load_dashboard(&app_config.input).await?;

            // 2. Write artifacts
            render::write_artifacts(
                &app_config.output.dir,
                &dashboard.map,
                &dashboard.counties,
                &dashboard.stats,
            )?;

            info!("Generation complete!");
        }
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // A failed load is served as the error view rather than aborting.
            let load = data::load_dashboard(&app_config.input).await;

            server::start_server(app_config, load).await?;
        }
    }

    Ok(())
}
