use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use skyguide::{
    AltAzProvider, CallerId, ConstellationService, InMemoryObservationStore,
    JsonLinesObservationStore, LocationRequest, ObservationStore, SelectionStrategy,
    SkyguideConfig, StarCatalog, VisibilitySelector, VisibleOutcome,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    First,
    Random,
    Named,
}

#[derive(Parser)]
#[command(name = "skyguide")]
#[command(about = "Find a constellation high in the sky and the star to look for")]
struct Cli {
    /// Star table (CSV); the bundled bright-star table when omitted
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick one visible constellation and record it
    Visible {
        /// Latitude in degrees, north positive
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in degrees, east positive
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Observation time (RFC 3339); now when omitted
        #[arg(long)]
        time: Option<String>,
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Seed for the random strategy
        #[arg(long)]
        seed: Option<u64>,
        /// Constellation for the named strategy
        #[arg(long)]
        constellation: Option<String>,
        /// Caller recorded in the observation log
        #[arg(long, default_value = "cli")]
        user: String,
        /// Observation log (JSON lines); overrides the config file
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// List every visible constellation with its guide star
    Survey {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(long)]
        time: Option<String>,
    },
    /// Show a caller's recorded observations, newest first
    History {
        #[arg(long)]
        user: String,
        #[arg(long)]
        log: PathBuf,
    },
    /// Identify the constellation in a sky photo
    #[cfg(feature = "image")]
    Photo {
        path: PathBuf,
        /// Constellation the photo is claimed to show
        #[arg(long)]
        claim: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_catalog(cli_path: Option<&PathBuf>, config: &SkyguideConfig) -> Result<StarCatalog> {
    let catalog = match cli_path {
        Some(path) => StarCatalog::from_csv_path(path, &config.catalog)?,
        None => StarCatalog::bundled_with(&config.catalog)?,
    };
    Ok(catalog)
}

fn strategy_from_args(
    strategy: Option<StrategyArg>,
    seed: Option<u64>,
    constellation: Option<String>,
) -> Result<Option<SelectionStrategy>> {
    Ok(match strategy {
        None => seed.map(|s| SelectionStrategy::Random { seed: Some(s) }),
        Some(StrategyArg::First) => Some(SelectionStrategy::First),
        Some(StrategyArg::Random) => Some(SelectionStrategy::Random { seed }),
        Some(StrategyArg::Named) => Some(SelectionStrategy::Named {
            constellation: constellation
                .context("--strategy named requires --constellation")?,
        }),
    })
}

fn open_store(path: Option<&PathBuf>) -> Result<Arc<dyn ObservationStore>> {
    let store: Arc<dyn ObservationStore> = match path {
        Some(path) => Arc::new(JsonLinesObservationStore::open(path)?),
        None => Arc::new(InMemoryObservationStore::new()),
    };
    Ok(store)
}

fn request(lat: f64, lon: f64, time: Option<String>) -> LocationRequest {
    let timestamp =
        time.unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    LocationRequest::new(lat, lon, timestamp)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SkyguideConfig::from_json_file(path)?,
        None => SkyguideConfig::default(),
    };

    match cli.command {
        Commands::Visible {
            lat,
            lon,
            time,
            strategy,
            seed,
            constellation,
            user,
            log,
        } => {
            let catalog = Arc::new(load_catalog(cli.catalog.as_ref(), &config)?);
            let store = open_store(log.as_ref().or(config.observation_log.as_ref()))?;
            let selector = VisibilitySelector::new(
                catalog,
                AltAzProvider::default(),
                config.selector.clone(),
            )?;
            let service = ConstellationService::new(selector, store);

            let mut req = request(lat, lon, time);
            req.strategy = strategy_from_args(strategy, seed, constellation)?;
            match service.visible(&CallerId::new(user), &req)? {
                VisibleOutcome::Visible(response) => print_json(&response)?,
                VisibleOutcome::NoneVisible => {
                    print_json(&serde_json::json!({ "message": "No constellations visible" }))?
                }
            }
        }
        Commands::Survey { lat, lon, time } => {
            let catalog = Arc::new(load_catalog(cli.catalog.as_ref(), &config)?);
            let selector = VisibilitySelector::new(
                catalog,
                AltAzProvider::default(),
                config.selector.clone(),
            )?;
            let service =
                ConstellationService::new(selector, Arc::new(InMemoryObservationStore::new()));
            print_json(&service.survey(&request(lat, lon, time))?)?;
        }
        Commands::History { user, log } => {
            let store = JsonLinesObservationStore::open(&log)?;
            let views: Vec<skyguide::ObservationView> = store
                .history(&CallerId::new(user))?
                .into_iter()
                .map(Into::into)
                .collect();
            print_json(&serde_json::json!({ "observations": views }))?;
        }
        #[cfg(feature = "image")]
        Commands::Photo { path, claim } => {
            use skyguide::photo::{
                analyze_photo, ConstellationMatcher, ExtractionConfig, MatchConfig,
            };

            let catalog = load_catalog(cli.catalog.as_ref(), &config)?;
            let matcher = ConstellationMatcher::from_catalog(&catalog, MatchConfig::default());
            let report = analyze_photo(
                &path,
                &matcher,
                &ExtractionConfig::default(),
                claim.as_deref(),
            )?;
            print_json(&report)?;
        }
    }
    Ok(())
}
