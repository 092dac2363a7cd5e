//! Faction War Simulation
//!
//! Runs the demo frontier scenario against the grid host and writes the
//! event stream as JSONL.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use war_core::config::{default_config_toml, SimConfig};
use war_core::events::EventLogger;
use war_core::setup::demo_world;
use war_core::snapshot::SimulationSnapshot;
use war_core::Simulation;
use war_events::{SimTimestamp, TICKS_PER_DAY};

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "war_sim")]
#[command(about = "Tick-driven faction war simulation")]
struct Args {
    /// Random seed for reproducibility (a resumed run uses the snapshot's)
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 600_000)]
    ticks: u64,

    /// Tuning file (defaults to war_sim.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSONL event log output
    #[arg(long, default_value = "output/events.jsonl")]
    events_out: PathBuf,

    /// Write a snapshot of the final state
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Resume from a saved snapshot
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Print the default configuration file and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print!("{}", default_config_toml());
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match &args.config {
        Some(path) => match SimConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Could not load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => SimConfig::load_or_default(),
    };

    println!("Faction War Simulation");
    println!("======================");
    println!("Seed: {}", args.seed);
    println!("Ticks: {}", args.ticks);
    println!("Maintenance interval: {}", config.cadence.maintenance_interval);
    println!();

    let mut world = demo_world();

    let (mut sim, start) = match &args.resume {
        Some(path) => match SimulationSnapshot::load(path) {
            Ok(snapshot) => {
                let start = snapshot.state.tick + 1;
                println!("Resuming {} from tick {}", path.display(), snapshot.state.tick);
                (Simulation::restore(config, snapshot, &world), start)
            }
            Err(e) => {
                eprintln!("Could not load snapshot {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => (Simulation::new(config, args.seed), 0),
    };

    if let Some(parent) = args.events_out.parent() {
        std::fs::create_dir_all(parent).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create output directory: {}", e);
        });
    }
    // A resumed run continues the log it was saved from
    let opened = if args.resume.is_some() {
        EventLogger::append(&args.events_out)
    } else {
        EventLogger::new(&args.events_out)
    };
    let mut logger = match opened {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Warning: Could not open {}: {}. Events will not be written.", args.events_out.display(), e);
            EventLogger::null()
        }
    };

    let end = start + args.ticks;
    for tick in start..end {
        sim.tick(&mut world, tick);

        if let Err(e) = logger.write_tick(&mut sim.events) {
            eprintln!("Warning: Could not write events at tick {}: {}", tick, e);
        }

        if tick > start && tick % TICKS_PER_DAY == 0 {
            println!(
                "[{}] {} agents abroad, {} settlements, {} total power",
                SimTimestamp::from_tick(tick),
                sim.state.agents.len(),
                sim.state.settlement_count(),
                sim.state.total_power()
            );
        }
        if sim.is_game_over() {
            println!("Victory achieved at tick {}", tick);
            break;
        }
    }

    if let Err(e) = logger.flush() {
        eprintln!("Warning: Could not flush event log: {}", e);
    }

    if let Some(path) = &args.snapshot_out {
        match sim.snapshot().save(path) {
            Ok(()) => println!("Wrote snapshot to {}", path.display()),
            Err(e) => eprintln!("Warning: Could not write snapshot: {}", e),
        }
    }

    println!();
    println!("Simulation complete at tick {}.", sim.state.tick);
    let stats = logger.stats();
    println!("Logged {} events to {}", stats.written, args.events_out.display());
    for (category, count) in &stats.by_category {
        println!("  {}: {}", category, count);
    }
    for profile in sim.state.profiles.values() {
        println!(
            "  {} ({}): {} settlements, {} power",
            profile.def_name,
            profile.behavior,
            profile.settlements.len(),
            profile.total_power()
        );
    }
}
