//! Smartlink cache command line driver.
//!
//! Runs eligibility and ephemeris requests against the configured
//! repository and prints the JSON responses on stdout.
//!
//! # Usage
//!
//! ```bash
//! # In-memory repository, registering a catalog first
//! smartlink-cache --catalog catalog.json eligibilities request.json
//!
//! # PostgreSQL repository configured in repository.toml
//! smartlink-cache --config repository.toml ephemeris request.json
//!
//! # Horizons cached for every listed satellite
//! smartlink-cache horizons 1 2 3
//! ```
//!
//! # Environment Variables
//!
//! - `REPOSITORY_TYPE`, `DATABASE_URL`: used when no `repository.toml` is found
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use smartlink_rust::api::{self, EligibilityRequest, EligibilityResponse, EphemerisRequest};
use smartlink_rust::db::{services, FullRepository, RepositoryConfig, RepositoryFactory};
use smartlink_rust::models::{Constellation, OrbitParameters, Satellite, SatelliteId, Station};
use smartlink_rust::services::{
    ephemeris::common_horizons, BatchComputeOrchestrator, EligibilityBatch, EphemerisBatch,
};

const USAGE: &str = "usage: smartlink-cache [--config <repository.toml>] [--catalog <catalog.json>] \
<eligibilities <request.json> | ephemeris <request.json> | horizons <satellite-id>...>";

/// Entities to register before running the command.
#[derive(Debug, Default, Deserialize)]
struct Catalog {
    #[serde(default)]
    satellites: Vec<Satellite>,
    #[serde(default)]
    stations: Vec<Station>,
    #[serde(default)]
    constellations: Vec<ConstellationSpec>,
}

#[derive(Debug, Deserialize)]
struct ConstellationSpec {
    name: String,
    n_planes: usize,
    n_per_plane: usize,
    parameters: OrbitParameters,
}

enum Command {
    Eligibilities(String),
    Ephemeris(String),
    Horizons(Vec<SatelliteId>),
}

struct Options {
    config: Option<String>,
    catalog: Option<String>,
    command: Command,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let mut config = None;
    let mut catalog = None;

    let command = loop {
        let arg = args.next().ok_or_else(|| anyhow!(USAGE))?;
        match arg.as_str() {
            "--config" => config = Some(args.next().ok_or_else(|| anyhow!(USAGE))?),
            "--catalog" => catalog = Some(args.next().ok_or_else(|| anyhow!(USAGE))?),
            "eligibilities" => {
                break Command::Eligibilities(args.next().ok_or_else(|| anyhow!(USAGE))?)
            }
            "ephemeris" => break Command::Ephemeris(args.next().ok_or_else(|| anyhow!(USAGE))?),
            "horizons" => {
                let ids = args
                    .by_ref()
                    .map(|s| {
                        s.parse::<i64>()
                            .map(SatelliteId)
                            .with_context(|| format!("invalid satellite id '{}'", s))
                    })
                    .collect::<Result<Vec<_>>>()?;
                if ids.is_empty() {
                    bail!(USAGE);
                }
                break Command::Horizons(ids);
            }
            other => bail!("unknown argument '{}'\n{}", other, USAGE),
        }
    };

    Ok(Options {
        config,
        catalog,
        command,
    })
}

fn load_config(path: Option<&str>) -> Result<Option<RepositoryConfig>> {
    match path {
        Some(path) => Ok(Some(RepositoryConfig::from_file(path)?)),
        None => Ok(RepositoryConfig::from_default_location().ok()),
    }
}

async fn register_catalog(repo: &dyn FullRepository, path: &str) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read catalog {}", path))?;
    let catalog: Catalog = api::parse_json(&content)?;

    for satellite in &catalog.satellites {
        let stored = services::store_or_load(repo, satellite).await?;
        info!("Satellite '{}' registered as {:?}", stored.name, stored.id);
    }
    for station in &catalog.stations {
        let stored = services::store_or_load(repo, station).await?;
        info!("Station '{}' registered as {:?}", stored.city, stored.id);
    }
    for spec in &catalog.constellations {
        let mut constellation =
            Constellation::build(&spec.name, spec.n_planes, spec.n_per_plane, &spec.parameters)?;
        services::register_constellation(repo, &mut constellation).await?;
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args(env::args().skip(1))?;

    let config = load_config(options.config.as_deref())?;
    let repo: Arc<dyn FullRepository> = match &config {
        Some(config) => RepositoryFactory::from_repository_config(config).await?,
        None => RepositoryFactory::from_env().await?,
    };
    let settings = config.map(|c| c.compute).unwrap_or_default();
    info!("Repository initialized (compute settings: {:?})", settings);

    if let Some(catalog) = &options.catalog {
        register_catalog(repo.as_ref(), catalog).await?;
    }

    let orchestrator = BatchComputeOrchestrator::with_defaults(settings);
    match options.command {
        Command::Eligibilities(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read request {}", path))?;
            let request: EligibilityRequest = api::parse_json(&content)?;
            let batch = EligibilityBatch::try_from(request)?;
            let outcome = orchestrator
                .compute_eligibilities(repo.as_ref(), &batch)
                .await?;
            print_json(&EligibilityResponse::from(outcome))?;
        }
        Command::Ephemeris(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read request {}", path))?;
            let request: EphemerisRequest = api::parse_json(&content)?;
            let with_velocity = request.velocity;
            let outcome = orchestrator
                .compute_ephemeris(repo.as_ref(), &EphemerisBatch::from(request))
                .await?;
            print_json(&api::EphemerisResponse::from_outcome(&outcome, with_velocity))?;
        }
        Command::Horizons(ids) => {
            let horizons = common_horizons(repo.as_ref(), &ids).await?;
            print_json(&horizons)?;
        }
    }

    Ok(())
}
