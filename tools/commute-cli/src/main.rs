use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

mod board;

use commute_core::ledger::profile::Preferences;
use commute_core::transit::{
    find_nearby_stops, lines_near, loader, ArrivalEstimator, Coordinate, LineIdentifier, PlannerConfig,
    RoutePlanner, StaticCatalog, SystemClock,
};
use commute_core::{FileStore, TripLedger};

#[derive(Parser, Debug)]
#[command(
    name = "commute-cli",
    author,
    version,
    about = "Query a transit catalogue and keep a commuter's trip ledger",
    long_about = "Finds stops and lines near a point, plans single-line trips and shows \
                  simulated arrival countdowns from a JSON line catalogue.\n\n\
                  Trip statistics, points, badges, favorites and saved routes are kept \
                  as JSON documents in the data directory. Coordinates are written as \
                  `lat,lng`."
)]
struct Args {
    /// Line catalogue JSON file
    #[arg(short, long, global = true)]
    catalog: Option<PathBuf>,

    /// Directory holding the ledger documents
    #[arg(short, long, global = true, default_value = ".commute")]
    data_dir: PathBuf,

    /// Seed for arrival estimates, for reproducible output
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Verbose output (show debug messages)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stops within walking distance, nearest first
    Nearby {
        #[arg(value_parser = parse_coordinate, allow_hyphen_values = true)]
        at: Coordinate,

        /// Search radius in meters (defaults to the saved preference)
        #[arg(short, long)]
        radius: Option<f64>,
    },

    /// Lines whose path passes near a point
    Lines {
        #[arg(value_parser = parse_coordinate, allow_hyphen_values = true)]
        at: Coordinate,

        #[arg(short, long)]
        radius: Option<f64>,
    },

    /// Best single-line routes between two points
    Plan {
        #[arg(value_parser = parse_coordinate, allow_hyphen_values = true)]
        from: Coordinate,

        #[arg(value_parser = parse_coordinate, allow_hyphen_values = true)]
        to: Coordinate,

        /// Walking limit at each end in meters (defaults to the saved preference)
        #[arg(long)]
        max_walk: Option<f64>,

        /// Planner settings as a JSON file; missing fields keep their defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Arrival countdowns at nearby stops, refreshed periodically
    Board {
        #[arg(value_parser = parse_coordinate, allow_hyphen_values = true)]
        at: Coordinate,

        #[arg(short, long)]
        radius: Option<f64>,

        /// Seconds between refreshes (defaults to the saved preference)
        #[arg(long)]
        interval: Option<u64>,

        /// Number of refreshes to print after the first board; 0 runs until interrupted
        #[arg(long, default_value_t = 3)]
        refreshes: u32,
    },

    /// Record a completed trip
    RecordTrip {
        #[arg(long)]
        distance_km: f64,

        #[arg(long)]
        minutes: f64,
    },

    /// Grant bonus points
    AddPoints { amount: u64 },

    /// Remember a searched route, or bump its use count
    SaveRoute { from: String, to: String },

    /// Saved routes, most used first
    Routes,

    /// Add or remove a favorite line
    FavoriteLine { id: String },

    /// Show or change saved preferences
    Prefs {
        #[arg(long)]
        search_radius: Option<f64>,

        #[arg(long)]
        max_walk: Option<f64>,

        #[arg(long)]
        refresh_secs: Option<u64>,
    },

    /// Trip statistics, points and badges
    Stats,

    /// Forget trip statistics (points and badges are kept)
    ClearStats,
}

fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lng`, got `{s}`"))?;

    let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("longitude: {e}"))?;

    Coordinate::new(lat, lng).map_err(|e| e.to_string())
}

fn setup_logging(verbose: bool) {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{filter::FilterFn, fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt};

    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = FilterFn::new(|meta| meta.module_path().unwrap_or_default().starts_with("commute"));
    let layer = tracing_subscriber::fmt::layer()
        .event_format(Format::default().without_time())
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .with(level)
        .init();
}

fn load_catalog(path: Option<&Path>) -> Result<StaticCatalog> {
    let Some(path) = path else {
        bail!("This command needs a line catalogue, pass it with --catalog");
    };

    let file = File::open(path).with_context(|| format!("Failed to open catalogue {}", path.display()))?;
    let catalog = loader::from_json_reader(BufReader::new(file))
        .with_context(|| format!("Failed to load catalogue {}", path.display()))?;

    tracing::info!("Loaded {} lines from {}", catalog.len(), path.display());
    Ok(catalog)
}

fn load_planner_config(path: &Path) -> Result<PlannerConfig> {
    let file = File::open(path).with_context(|| format!("Failed to open planner config {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse planner config {}", path.display()))
}

fn estimator(seed: Option<u64>) -> ArrivalEstimator<StdRng, SystemClock> {
    match seed {
        Some(seed) => ArrivalEstimator::seeded(seed, SystemClock),
        None => ArrivalEstimator::system(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{out}");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let ledger = TripLedger::new(FileStore::new(args.data_dir.clone()));
    let preferences = ledger.preferences().context("Failed to read preferences")?;

    match args.command {
        Command::Nearby { at, radius } => {
            let catalog = load_catalog(args.catalog.as_deref())?;
            let radius = radius.unwrap_or(preferences.search_radius_meters);
            print_json(&find_nearby_stops(&catalog, at, radius)?)?;
        }

        Command::Lines { at, radius } => {
            let catalog = load_catalog(args.catalog.as_deref())?;
            let radius = radius.unwrap_or(preferences.search_radius_meters);
            print_json(&lines_near(&catalog, at, radius)?)?;
        }

        Command::Plan {
            from,
            to,
            max_walk,
            config,
        } => {
            let catalog = load_catalog(args.catalog.as_deref())?;

            let mut planner_config = match config {
                Some(path) => load_planner_config(&path)?,
                None => PlannerConfig {
                    max_walk_meters: preferences.max_walk_meters,
                    ..PlannerConfig::default()
                },
            };
            if let Some(max_walk) = max_walk {
                planner_config.max_walk_meters = max_walk;
            }

            let planner = RoutePlanner::new(planner_config)?;
            let routes = planner.plan_route(&catalog, from, to, &mut estimator(args.seed))?;
            if routes.is_empty() {
                tracing::warn!("No single line connects these points within walking distance");
            }
            print_json(&routes)?;
        }

        Command::Board {
            at,
            radius,
            interval,
            refreshes,
        } => {
            let catalog = load_catalog(args.catalog.as_deref())?;
            let options = board::BoardOptions {
                origin: at,
                radius_meters: radius.unwrap_or(preferences.search_radius_meters),
                interval_secs: interval.unwrap_or(preferences.refresh_interval_secs),
                refreshes,
            };
            board::run(catalog, options, estimator(args.seed))?;
        }

        Command::RecordTrip { distance_km, minutes } => {
            print_json(&ledger.record_trip(distance_km, minutes)?)?;
        }

        Command::AddPoints { amount } => {
            let new_badges = ledger.add_points(amount)?;
            print_json(&serde_json::json!({
                "points": ledger.points()?,
                "new_badges": new_badges,
            }))?;
        }

        Command::SaveRoute { from, to } => {
            print_json(&ledger.save_route(&from, &to)?)?;
        }

        Command::Routes => {
            print_json(&ledger.saved_routes()?)?;
        }

        Command::FavoriteLine { id } => {
            let favorite = ledger.toggle_favorite_line(LineIdentifier::new(id.as_str()))?;
            print_json(&serde_json::json!({
                "line": id,
                "favorite": favorite,
            }))?;
        }

        Command::Prefs {
            search_radius,
            max_walk,
            refresh_secs,
        } => {
            let updated = Preferences {
                search_radius_meters: search_radius.unwrap_or(preferences.search_radius_meters),
                max_walk_meters: max_walk.unwrap_or(preferences.max_walk_meters),
                refresh_interval_secs: refresh_secs.unwrap_or(preferences.refresh_interval_secs),
            };
            if updated != preferences {
                ledger.set_preferences(updated.clone())?;
            }
            print_json(&updated)?;
        }

        Command::Stats => {
            print_json(&serde_json::json!({
                "statistics": ledger.statistics()?,
                "points": ledger.points()?,
                "badges": ledger.badges()?,
                "favorites": ledger.favorites()?,
            }))?;
        }

        Command::ClearStats => {
            ledger.clear_statistics()?;
            tracing::info!("Trip statistics cleared");
        }
    }

    for key in ledger.recovered_keys() {
        tracing::warn!("{key} is unreadable and was read as empty; the next write replaces it");
    }

    Ok(())
}
