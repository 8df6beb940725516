use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use choromap::config::AppConfig;
use choromap::session::MapSession;
use choromap::types::{selection_from, CategorySelection};
use choromap::{data, export, index, server};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join, aggregate, and write the styled GeoJSON
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the map state and breakdown API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Export { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let session = build_session(&app_config)?;
            export::write_geojson(&session, &app_config.output.geojson)?;
            info!("export complete");
        }
        Commands::Serve { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let session = build_session(&app_config)?;
            server::start_server(app_config, session).await?;
        }
    }

    Ok(())
}

fn build_session(config: &AppConfig) -> Result<MapSession> {
    let rows = data::load_attribute_rows(config)?;
    let features = data::load_region_features(config)?;
    let region_index = index::RegionIndex::build(features)?;

    let selection: CategorySelection = match &config.map.default_selection {
        Some(categories) => selection_from(categories.iter().cloned()),
        // No explicit default: start with everything, like a fresh page load.
        None => data::all_categories(&rows),
    };

    let palette = config.map.palette_colors()?;
    let session = MapSession::new(region_index, rows, palette, selection)?;
    info!(
        regions = session.index().len(),
        categories = session.categories().len(),
        "session ready"
    );
    Ok(session)
}
