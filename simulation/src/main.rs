//! fogmap-sim - drive the fog-of-war discovery engine from the command line
//!
//! Walk randomly or replay a recorded track through the same tile store,
//! persistence and mode lifecycle a device would use, then inspect what
//! was stored.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fogmap_logging::FogmapSubscriberBuilder;

use fogmap_simulation::{
    RandomWalk, Session, SimulationConfig, inspect, load_track, open_store,
};

#[derive(Parser)]
#[command(
    name = "fogmap-sim",
    about = "Fog-of-war discovery simulation",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// redb database file; tiles are kept in memory when omitted
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print every renderer message as a JSON line
    #[arg(long, global = true)]
    emit_messages: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reveal along a random walk
    Walk {
        /// Number of position samples
        #[arg(short, long)]
        steps: Option<usize>,

        /// Seed for a reproducible walk
        #[arg(long)]
        seed: Option<u64>,

        /// Starting position as LAT,LON
        #[arg(long, value_parser = parse_position, allow_hyphen_values = true)]
        start: Option<(f64, f64)>,
    },

    /// Reveal along a recorded track (one LAT,LON per line)
    Replay {
        track: PathBuf,
    },

    /// List the tiles in storage
    Inspect {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_position(raw: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| "expected LAT,LON".to_string())?;
    let lat = lat.trim().parse().map_err(|_| format!("bad latitude: {lat}"))?;
    let lon = lon.trim().parse().map_err(|_| format!("bad longitude: {lon}"))?;
    Ok((lat, lon))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimulationConfig::default(),
    };

    // Keep stdout clean for JSON output
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.default_level = "debug".to_string();
    }
    if cli.emit_messages || matches!(cli.command, Commands::Inspect { json: true }) {
        logging.console.enabled = false;
    }
    let _log_guard = FogmapSubscriberBuilder::new().with_config(logging).init()?;

    let store = open_store(cli.db.as_deref())?;

    match cli.command {
        Commands::Walk { steps, seed, start } => {
            if let Some(steps) = steps {
                config.walk.steps = steps;
            }
            if seed.is_some() {
                config.walk.seed = seed;
            }
            if let Some((lat, lon)) = start {
                config.walk.start_latitude = lat;
                config.walk.start_longitude = lon;
            }
            config.validate()?;

            let walk = RandomWalk::new(&config.walk);
            let seed = walk.seed();
            let samples: Vec<_> = walk.collect();

            let session = Session::new(config, store, samples.first().copied(), cli.emit_messages);
            let report = session.run(samples).await?;
            if !cli.emit_messages {
                println!("Walk seed: {seed}");
                println!("{report}");
            }
        }
        Commands::Replay { track } => {
            let samples =
                load_track(&track).with_context(|| format!("loading {}", track.display()))?;

            let session = Session::new(config, store, samples.first().copied(), cli.emit_messages);
            let report = session.run(samples).await?;
            if !cli.emit_messages {
                println!("{report}");
            }
        }
        Commands::Inspect { json } => {
            let tiles = inspect(store, &config.discovery.storage_key_prefix).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tiles)?);
            } else {
                println!("{} stored tiles", tiles.len());
                for tile in &tiles {
                    println!("  {:<24} {:>5} points", tile.id.as_str(), tile.points);
                }
            }
        }
    }

    Ok(())
}
