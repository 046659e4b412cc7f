use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use beat_sync_core::{
    AnalysisModel, AppConfig, ManualClock, Snapshot, SyncDriver, TickOutcome, Tier,
    TimelineTracker, WallClock,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> beat_sync_core::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::default(),
    };
    init_tracing(&config.log.filter);

    match cli.command {
        Commands::Play {
            analysis,
            tick_rate,
            seconds,
        } => run_play(&analysis, config, tick_rate, seconds),
        Commands::Simulate {
            analysis,
            tick_rate,
            ndjson,
        } => run_simulate(&analysis, config, tick_rate, ndjson),
        Commands::Tempo {
            analysis,
            min_confidence,
        } => run_tempo(&analysis, min_confidence),
    }
}

fn load_model(path: &Path) -> beat_sync_core::Result<Arc<AnalysisModel>> {
    let model = AnalysisModel::from_path(path)?;
    tracing::info!(
        ?path,
        bars = model.sequence(Tier::Bar).len(),
        beats = model.sequence(Tier::Beat).len(),
        segments = model.sequence(Tier::Segment).len(),
        length_seconds = model.end_seconds(),
        "analysis loaded"
    );
    Ok(Arc::new(model))
}

fn run_play(
    analysis: &Path,
    mut config: AppConfig,
    tick_rate: Option<f64>,
    seconds: Option<f64>,
) -> beat_sync_core::Result<()> {
    if let Some(rate) = tick_rate {
        config.sync.tick_rate_hz = rate;
    }
    let model = load_model(analysis)?;
    let tracker = TimelineTracker::primed(model);

    let stop = Arc::new(AtomicBool::new(false));
    if let Some(seconds) = seconds {
        let stop = Arc::clone(&stop);
        let limit = Duration::try_from_secs_f64(seconds).map_err(|err| {
            beat_sync_core::BeatSyncError::msg(format!("invalid --seconds value: {err}"))
        })?;
        thread::spawn(move || {
            thread::sleep(limit);
            stop.store(true, Ordering::Relaxed);
        });
    }

    let mut driver = SyncDriver::new(WallClock::start(), tracker, log_changes, &config.sync)?;
    driver.run(&stop);
    Ok(())
}

fn log_changes(snapshot: &Snapshot) {
    if snapshot.bar.changed {
        tracing::info!(
            bar = snapshot.bar.index,
            next_in_ms = snapshot.bar.ms_until_next,
            "bar"
        );
    }
    if snapshot.beat.changed {
        tracing::debug!(
            beat = snapshot.beat.index,
            confidence = snapshot.beat.span.confidence,
            "beat"
        );
    }
    if snapshot.segment.changed {
        tracing::trace!(
            segment = snapshot.segment.index,
            remaining = ?snapshot.segment.remaining_fraction(),
            "segment"
        );
    }
}

fn run_simulate(
    analysis: &Path,
    mut config: AppConfig,
    tick_rate: Option<f64>,
    ndjson: bool,
) -> beat_sync_core::Result<()> {
    if let Some(rate) = tick_rate {
        config.sync.tick_rate_hz = rate;
    }
    config.sync.stop_at_end = true;

    let model = load_model(analysis)?;
    let tracker = TimelineTracker::primed(model);

    let mut changes = [0u64; 3];
    let mut indeterminate = 0u64;
    let mut encode_error = None;
    let sink = |snapshot: &Snapshot| {
        for tier in snapshot.changed_tiers() {
            changes[tier as usize] += 1;
        }
        if Tier::ALL
            .iter()
            .any(|tier| snapshot.tier(*tier).remaining_fraction().is_none())
        {
            indeterminate += 1;
        }
        if ndjson && encode_error.is_none() {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{line}"),
                Err(err) => encode_error = Some(err),
            }
        }
    };

    let mut driver = SyncDriver::new(ManualClock::new(), tracker, sink, &config.sync)?;
    let period = driver.tick_period();
    while driver.tick() != TickOutcome::Finished {
        driver.clock_mut().advance(period);
    }
    let ticks = driver.rendered_ticks();
    drop(driver);

    if let Some(err) = encode_error {
        return Err(err.into());
    }

    tracing::info!(
        ticks,
        bar_changes = changes[Tier::Bar as usize],
        beat_changes = changes[Tier::Beat as usize],
        segment_changes = changes[Tier::Segment as usize],
        indeterminate,
        "simulation finished"
    );
    Ok(())
}

fn run_tempo(analysis: &Path, min_confidence: f64) -> beat_sync_core::Result<()> {
    let model = load_model(analysis)?;
    match model.estimated_tempo(min_confidence) {
        Some(bpm) => println!("{bpm:.1}bpm"),
        None => println!("tempo unknown"),
    }
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive visuals from a precomputed song analysis", long_about = None)]
struct Cli {
    /// Optional JSON config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow the analysis in real time and log bar, beat and segment changes.
    Play {
        /// Path to the analysis JSON document.
        #[arg(short, long)]
        analysis: PathBuf,
        /// Override the configured tick rate.
        #[arg(long)]
        tick_rate: Option<f64>,
        /// Stop after this many seconds instead of at the end of the song.
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// Replay the whole analysis on a simulated clock without sleeping.
    Simulate {
        /// Path to the analysis JSON document.
        #[arg(short, long)]
        analysis: PathBuf,
        /// Override the configured tick rate.
        #[arg(long)]
        tick_rate: Option<f64>,
        /// Print every snapshot as a JSON line on stdout.
        #[arg(long)]
        ndjson: bool,
    },
    /// Print the estimated tempo of the analysed song.
    Tempo {
        /// Path to the analysis JSON document.
        #[arg(short, long)]
        analysis: PathBuf,
        /// Sections at or below this tempo confidence are ignored.
        #[arg(long, default_value_t = 0.5)]
        min_confidence: f64,
    },
}
