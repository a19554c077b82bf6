// src/main.rs
//
// run_pipeline: replays per-frame perception dumps through the tracking and
// event pipeline, one independent stream per input file.

use anyhow::{Context, Result};
use batting_tracker::export::{write_detections_csv, write_events_json, write_frames_json};
use batting_tracker::pipeline::{run_live, FrameQueue, PipelineCoordinator, PushOutcome};
use batting_tracker::types::{Config, FrameInput};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Process every frame in order, then flush
    Batch,
    /// Pace frames through the bounded live queue
    Live,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Track players and derive contact/swing events from frame dumps")]
struct Args {
    /// YAML config; defaults apply when the file is missing
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Frame dump (JSON array of frames) or a directory of them
    #[arg(short, long, default_value = "input")]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    out: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Mode::Batch)]
    mode: Mode,
}

struct StreamStats {
    frames: usize,
    contacts: usize,
    swings: usize,
    np_swings: u64,
    rejected: u64,
    queue_drops: u64,
    elapsed_secs: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = if Path::new(&args.config).exists() {
        Config::load(&args.config)?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "batting_tracker={level},run_pipeline={level}",
            level = config.logging.level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🏏 Batting tracker starting ({:?} mode)", args.mode);
    info!(
        "Tracker: {:?} | contact IoU > {:.2} | swing > {:.0} px/s at {:.0} fps",
        config.tracker.strategy,
        config.contact.iou_threshold,
        config.swing.velocity_threshold,
        config.swing.fps
    );

    let inputs = find_frame_dumps(&args.input)?;
    if inputs.is_empty() {
        error!("No frame dumps found in {}", args.input.display());
        return Ok(());
    }
    info!("Found {} frame dump(s) to process", inputs.len());

    // One Ctrl-C listener for the whole run; live streams share its receiver
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if args.mode == Mode::Live {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Ctrl-C received, draining queue");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    // Keep the sender alive: a dropped sender reads as shutdown
                    warn!("Ctrl-C handler unavailable: {}", e);
                    std::future::pending::<()>().await;
                    drop(shutdown_tx);
                }
            }
        });
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output dir {}", args.out.display()))?;

    for (idx, path) in inputs.iter().enumerate() {
        if *shutdown_rx.borrow() {
            warn!("Shutdown requested, skipping remaining streams");
            break;
        }
        info!("========================================");
        info!(
            "Processing stream {}/{}: {}",
            idx + 1,
            inputs.len(),
            path.display()
        );

        match process_stream(path, &args.out, &config, args.mode, shutdown_rx.clone()).await {
            Ok(stats) => {
                info!("✓ Stream processed");
                info!("  Frames: {}", stats.frames);
                info!("  Contacts: {}", stats.contacts);
                info!("  Swings: {} ({} NP)", stats.swings, stats.np_swings);
                if stats.rejected > 0 {
                    warn!("  Out-of-order frames rejected: {}", stats.rejected);
                }
                if stats.queue_drops > 0 {
                    warn!("  Frames dropped at queue: {}", stats.queue_drops);
                }
                info!(
                    "  Processing speed: {:.1} FPS",
                    stats.frames as f64 / stats.elapsed_secs.max(1e-6)
                );
            }
            Err(e) => error!("Failed to process {}: {:#}", path.display(), e),
        }
    }

    Ok(())
}

fn find_frame_dumps(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut dumps: Vec<PathBuf> = WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map_or(false, |e| e.eq_ignore_ascii_case("json"))
        })
        .collect();
    dumps.sort();
    Ok(dumps)
}

fn load_frames(path: &Path) -> Result<Vec<FrameInput>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing frames from {}", path.display()))
}

async fn process_stream(
    path: &Path,
    out_dir: &Path,
    config: &Config,
    mode: Mode,
    shutdown: watch::Receiver<bool>,
) -> Result<StreamStats> {
    let started = Instant::now();
    let frames = load_frames(path)?;
    info!("Loaded {} frame(s)", frames.len());

    // One coordinator per stream: no track or swing state crosses files
    let mut coordinator = PipelineCoordinator::new(config)?;

    match mode {
        Mode::Batch => {
            coordinator.run_batch(frames);
        }
        Mode::Live => {
            let (producer, consumer) =
                FrameQueue::new(config.live.queue_capacity, coordinator.metrics())?.split();

            let frame_interval = Duration::from_secs_f64(1.0 / config.swing.fps);
            let feeder = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(frame_interval);
                for frame in frames {
                    ticker.tick().await;
                    if producer.push(frame) == PushOutcome::Closed {
                        break;
                    }
                }
            });

            let report = run_live(consumer, &mut coordinator, &config.live, shutdown).await?;
            if let Err(e) = feeder.await {
                warn!("Frame feeder task failed: {}", e);
            }
            info!(
                "Live replay: {} received, {} sampled out, {} drained at shutdown",
                report.received, report.sampled_out, report.drained
            );
        }
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stream");
    write_outputs(out_dir, stem, &coordinator)?;

    let summary = coordinator.metrics().summary();
    let events = coordinator.events();
    Ok(StreamStats {
        frames: coordinator.aggregator().len(),
        contacts: events
            .iter()
            .filter(|e| e.kind == batting_tracker::EventKind::Contact)
            .count(),
        swings: events
            .iter()
            .filter(|e| e.kind == batting_tracker::EventKind::Swing)
            .count(),
        np_swings: summary.np_swings,
        rejected: summary.frames_rejected,
        queue_drops: summary.queue_drops,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}

fn write_outputs(out_dir: &Path, stem: &str, coordinator: &PipelineCoordinator) -> Result<()> {
    let create = |suffix: &str| -> Result<BufWriter<File>> {
        let path = out_dir.join(format!("{}_{}", stem, suffix));
        let file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        Ok(BufWriter::new(file))
    };

    let frames = coordinator.aggregator().frames();
    write_frames_json(create("frames.json")?, frames)?;
    write_events_json(create("events.json")?, coordinator.events())?;
    let rows = write_detections_csv(create("detections.csv")?, frames)?;

    info!(
        "💾 Wrote {} frame(s), {} event(s), {} detection row(s) to {}",
        frames.len(),
        coordinator.events().len(),
        rows,
        out_dir.display()
    );
    Ok(())
}
