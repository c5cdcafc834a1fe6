use anyhow::{Context, Result};
use clap::Parser;
use det_tracking::{config::Config, invoke::parse_invoke_message, ChangeFilter, Tracker};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Replay a detector log through the tracker and print the summaries that
/// pass the change filter, one JSON object per line.
#[derive(Parser, Debug)]
#[command(name = "det-replay")]
struct Args {
    /// Log file with one detector message per line.
    input: PathBuf,
    /// JSON5 tracker config. Defaults are used when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Frame rate used to stamp the frames, starting at 0 ms.
    #[arg(long, default_value_t = 10.0)]
    fps: f64,
    /// Print every summary instead of only the changed ones.
    #[arg(long)]
    no_filter: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("det_tracking=info,det_replay=info")),
        )
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    anyhow::ensure!(
        args.fps.is_finite() && args.fps > 0.0,
        "fps must be positive, got {}",
        args.fps
    );

    let config = match &args.config {
        Some(path) => Config::from_json5_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    let mut tracker = Tracker::new(&config).context("Invalid tracker config")?;
    let mut filter = ChangeFilter::new();

    let input = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let mut output = BufWriter::new(io::stdout().lock());

    let frame_interval_ms = 1000.0 / args.fps;
    let mut frame_count: u64 = 0;
    let mut tracker_time = Duration::ZERO;
    let mut filter_time = Duration::ZERO;

    for (line_no, line) in BufReader::new(input).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        let timestamp_ms = (frame_count as f64 * frame_interval_ms).round() as u64;
        frame_count += 1;

        let detections = match parse_invoke_message(&line) {
            Ok(Some(detections)) => detections,
            Ok(None) => continue,
            Err(err) => {
                warn!("skipping line {}: {}", line_no + 1, err);
                continue;
            }
        };

        let start = Instant::now();
        let summary = match tracker.process_frame(&detections, timestamp_ms) {
            Ok(summary) => summary,
            Err(err) => {
                warn!("skipping line {}: {}", line_no + 1, err);
                continue;
            }
        };
        tracker_time += start.elapsed();

        let start = Instant::now();
        let emitted = if args.no_filter {
            Some(summary)
        } else {
            filter.filter(summary)
        };
        filter_time += start.elapsed();

        if let Some(summary) = emitted {
            serde_json::to_writer(&mut output, &summary)?;
            output.write_all(b"\n")?;
        }
    }
    output.flush()?;

    let per_frame = |total: Duration| {
        if frame_count == 0 {
            0.0
        } else {
            total.as_secs_f64() * 1000.0 / frame_count as f64
        }
    };
    info!("Total frames processed: {}", frame_count);
    info!(
        "Tracker total time: {:.3} ms, average {:.4} ms",
        tracker_time.as_secs_f64() * 1000.0,
        per_frame(tracker_time)
    );
    info!(
        "Filter total time: {:.3} ms, average {:.4} ms",
        filter_time.as_secs_f64() * 1000.0,
        per_frame(filter_time)
    );
    info!("Tracks alive at end of log: {}", tracker.len());

    Ok(())
}
