//! # pitchtrack
//!
//! Terminal front end for the streaming pitch tracker. Audio comes either from
//! the default input device or from a raw PCM file (signed 16-bit little-endian
//! mono at the configured sample rate). One line is printed per analysis frame.
//!
//! ## Threads (live mode)
//! - **Capture**: cpal callback, converts to `i16` chunks
//! - **Analysis**: owns the analyzer, sends readings back
//! - **Main**: prints readings, waits for Enter to stop

mod args;
mod display;
mod worker;

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::thread;

use anyhow::{Context, Result};
use pitchtrack_core::{Analyzer, AnalyzerConfig, PitchReading, audio};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use args::{Options, USAGE};
use display::format_reading;
use worker::AudioWorker;

/// Bytes read from a PCM file per step.
const READ_BLOCK: usize = 8192;

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only readings.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let Some(options) = Options::parse(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = load_config(options.config.as_deref())?;
    let analyzer = Analyzer::new(config).context("invalid analyzer configuration")?;
    info!(
        sample_rate = analyzer.config().sample_rate,
        transform_size = analyzer.transform_size(),
        interval_secs = analyzer.config().interval_secs(),
        "Pitch tracker starting"
    );

    let analyzer = match &options.input {
        Some(path) => run_file(analyzer, path)?,
        None => run_live(analyzer, options.gain)?,
    };

    if let Some(path) = &options.history_out {
        save_history(&analyzer, path)?;
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig> {
    let Some(path) = path else {
        return Ok(AnalyzerConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))?;
    debug!(?config, "Loaded config");
    Ok(config)
}

fn save_history(analyzer: &Analyzer, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &analyzer.history_snapshot())
        .with_context(|| format!("failed to write history to {}", path.display()))?;
    info!(path = %path.display(), "Pitch history saved");
    Ok(())
}

/// Feeds a raw PCM file through the analyzer, printing every frame.
fn run_file(mut analyzer: Analyzer, path: &Path) -> Result<Analyzer> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut stdout = io::stdout().lock();

    let mut block = vec![0u8; READ_BLOCK];
    // Holds the low byte of a sample split across reads.
    let mut carry: Option<u8> = None;

    loop {
        let read = reader.read(&mut block).context("failed to read PCM input")?;
        if read == 0 {
            break;
        }
        let mut bytes = block[..read].iter().copied();
        if let Some(low) = carry.take() {
            if let Some(high) = bytes.next() {
                feed(&mut analyzer, i16::from_le_bytes([low, high]), &mut stdout)?;
            }
        }
        loop {
            match (bytes.next(), bytes.next()) {
                (Some(low), Some(high)) => feed(&mut analyzer, i16::from_le_bytes([low, high]), &mut stdout)?,
                (Some(low), None) => carry = Some(low),
                _ => break,
            }
        }
    }

    if carry.is_some() {
        warn!("Ignoring trailing odd byte in PCM input");
    }
    info!(frames = analyzer.total_analyze_count(), "Input finished");
    Ok(analyzer)
}

fn feed(analyzer: &mut Analyzer, sample: i16, out: &mut impl Write) -> Result<()> {
    let before = analyzer.total_analyze_count();
    analyzer.add_data(sample);
    if analyzer.total_analyze_count() != before {
        writeln!(out, "{}", format_reading(&PitchReading::from_analyzer(analyzer)))?;
    }
    Ok(())
}

fn run_live(analyzer: Analyzer, gain: f32) -> Result<Analyzer> {
    let (readings_tx, readings_rx) = crossbeam_channel::unbounded::<PitchReading>();
    // Fails here, before waiting on stdin, when no capture can be opened.
    let worker = AudioWorker::spawn(analyzer, readings_tx, move |sender, sample_rate| {
        audio::start_audio_capture(sender, sample_rate, gain)
    })?;

    let printer = thread::spawn(move || {
        for reading in readings_rx {
            println!("{}", format_reading(&reading));
        }
    });

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("failed to read stdin")?;

    // Dropping the worker's sender ends the printer loop.
    let analyzer = worker.stop()?;
    let _ = printer.join();
    Ok(analyzer)
}
