//! ReplayLab CLI: headless replay, config validation, and plugin listing.
//!
//! Commands:
//! - `run`: replay a session from a TOML file, printing each frame as a JSON line
//! - `validate`: load data and build every plugin without replaying
//! - `plugins`: list the registered indicator and trader modules

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use replaylab_core::data::{generate, SeriesSource, SyntheticSpec};
use replaylab_core::domain::{Frame, OrderStatus};
use replaylab_core::engine::{
    ChannelRenderer, Controller, RendererEvent, ReplayFile, SimState, SimulationConfig, Simulator,
};

#[derive(Parser)]
#[command(name = "replaylab", about = "ReplayLab: candle/tick replay with indicators and traders")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a session and print every frame as a JSON line.
    Run {
        /// Path to a replay TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Replace the configured CSV sources with seeded synthetic data.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Stop after this many frames.
        #[arg(long)]
        max_frames: Option<u64>,
    },
    /// Load data and build every plugin, reporting configuration errors.
    Validate {
        /// Path to a replay TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Validate against synthetic data instead of the configured CSVs.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// List registered plugin modules and their parameters.
    Plugins,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            synthetic,
            seed,
            max_frames,
        } => run_replay(&config, synthetic.then_some(seed), max_frames),
        Commands::Validate { config, synthetic } => run_validate(&config, synthetic),
        Commands::Plugins => run_plugins(),
    }
}

// ── Session loading ──────────────────────────────────────────────────

/// Load the replay file and register its plugins on a fresh simulator.
fn load_session(path: &Path, synthetic_seed: Option<u64>) -> Result<(Simulator, SimulationConfig)> {
    let file = ReplayFile::load(path).with_context(|| format!("loading {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let config = match synthetic_seed {
        Some(seed) => synthetic_config(&file, seed)?,
        None => file.to_config(base_dir)?,
    };

    let mut sim = Simulator::with_builtins();
    for section in &file.indicators {
        sim.add_indicator(&section.name, &section.module, &section.params)
            .with_context(|| format!("indicator '{}'", section.name))?;
    }
    for section in &file.traders {
        sim.add_trader(&section.name, &section.module, &section.params)
            .with_context(|| format!("trader '{}'", section.name))?;
    }
    Ok((sim, config))
}

/// Hourly synthetic candles covering the configured window, with ticks.
fn synthetic_config(file: &ReplayFile, seed: u64) -> Result<SimulationConfig> {
    let sim = &file.simulation;
    let hours = (sim.stop - sim.start).num_hours();
    if hours < 1 {
        bail!("synthetic data needs a window of at least one hour");
    }
    let mut spec = SyntheticSpec::new(sim.start, hours as usize + 1);
    spec.seed = seed;
    let (candles, ticks) = generate(&spec)?;

    let mut config = SimulationConfig::new(SeriesSource::memory(candles), sim.start, sim.stop)
        .with_interval(sim.interval)
        .with_trigger_policy(sim.trigger_policy)
        .with_lookback(sim.lookback);
    config.ticks = Some(SeriesSource::memory(ticks));
    config.use_ticks = sim.use_ticks;
    Ok(config)
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct FrameLine<'a> {
    seq: u64,
    initial: bool,
    #[serde(flatten)]
    frame: &'a Frame,
}

#[derive(Serialize)]
struct TraderSummary {
    name: String,
    balance: f64,
    orders: usize,
    closed: usize,
}

fn run_replay(path: &Path, synthetic_seed: Option<u64>, max_frames: Option<u64>) -> Result<()> {
    let (sim, config) = load_session(path, synthetic_seed)?;
    let (renderer, events) = ChannelRenderer::new();
    let ctl = Controller::new(sim, Box::new(renderer)).context("spawning replay worker")?;
    ctl.setup(config)?;
    ctl.start()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut seq = 0u64;
    loop {
        let event = match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) if ctl.state() == SimState::Running => continue,
            Err(_) => break,
        };
        let (frame, ack, initial) = match event {
            RendererEvent::Initial(frame) => (frame, None, true),
            RendererEvent::Frame(frame, ack) => (frame, Some(ack), false),
        };
        seq += 1;
        serde_json::to_writer(&mut out, &FrameLine { seq, initial, frame: &frame })?;
        writeln!(out)?;
        if let Some(ack) = ack {
            ack.ack();
        }
        if max_frames.is_some_and(|max| seq >= max) {
            if ctl.state() == SimState::Running {
                ctl.pause()?;
            }
            break;
        }
    }
    out.flush()?;

    let summary: Vec<TraderSummary> = ctl.with_simulator(|sim| {
        sim.trader_names()
            .map(|name| {
                let book = sim.order_book(name);
                TraderSummary {
                    name: name.to_string(),
                    balance: sim.balance(Some(name)),
                    orders: book.map_or(0, |b| b.len()),
                    closed: book.map_or(0, |b| {
                        b.orders().iter().filter(|o| o.status == OrderStatus::Closed).count()
                    }),
                }
            })
            .collect()
    });
    tracing::info!(frames = seq, "replay finished");
    println!("{}", serde_json::to_string(&serde_json::json!({ "summary": summary }))?);
    Ok(())
}

fn run_validate(path: &Path, synthetic: bool) -> Result<()> {
    let (mut sim, config) = load_session(path, synthetic.then_some(42))?;
    let frame = sim.setup(config)?;
    let indicators: Vec<&str> = sim.indicator_names().collect();
    let traders: Vec<&str> = sim.trader_names().collect();
    println!("OK: start index {} at {}", frame.core_data_idx, frame.time);
    println!("  indicators: {}", indicators.join(", "));
    println!("  traders:    {}", traders.join(", "));
    Ok(())
}

fn run_plugins() -> Result<()> {
    let sim = Simulator::with_builtins();
    for descriptor in sim.registry().descriptors() {
        let params: Vec<String> = descriptor
            .parameters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let warm_up = if descriptor.has_initialize { " [warm-up]" } else { "" };
        println!(
            "{:<10} {:<16} {}{}",
            format!("{:?}", descriptor.kind).to_lowercase(),
            descriptor.module,
            descriptor.summary,
            warm_up
        );
        println!("{:<27} {}", "", params.join(" "));
    }
    Ok(())
}
