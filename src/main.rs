// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use smfrec::config::{ConfigError, RecorderConfig};
use smfrec::midi::{print_ports, MidiInputSource};
use smfrec::recording::{CaptureLoop, SmfWriter, StopToken};
use smfrec::shutdown::listen_for_shutdown;
use smfrec::timing::QueueTempo;

#[derive(Parser, Debug)]
#[command(
    name = "smfrec",
    version,
    about = "Record a MIDI input port to a Standard MIDI File"
)]
struct Cli {
    /// File to record to
    output: Option<PathBuf>,

    /// List input ports
    #[arg(short, long)]
    list: bool,

    /// Source port (index or name)
    #[arg(short, long)]
    port: Option<String>,

    /// Tempo in beats per minute
    #[arg(short, long, conflicts_with = "fps")]
    bpm: Option<u32>,

    /// Resolution in frames per second (SMPTE)
    #[arg(short, long)]
    fps: Option<u32>,

    /// Resolution in ticks per beat or frame
    #[arg(short, long)]
    ticks: Option<u32>,

    /// Time signature
    #[arg(short = 'i', long = "timesig", value_name = "NN:DD")]
    timesig: Option<String>,

    /// Stop recording this many milliseconds after the last event
    #[arg(short = 'T', long, value_name = "MS")]
    timeout: Option<u64>,

    /// Create a track for each channel (not supported)
    #[arg(short, long)]
    split_channels: bool,

    /// Dump events (not supported)
    #[arg(short, long)]
    dump: bool,

    /// Configuration file (TOML or YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Config file settings with command-line flags applied on top
    fn into_config(self) -> Result<RecorderConfig> {
        let mut config = match &self.config {
            Some(path) => RecorderConfig::load(path)?,
            None => RecorderConfig::default(),
        };

        if self.port.is_some() {
            config.port = self.port;
        }
        if self.output.is_some() {
            config.output = self.output;
        }
        if let Some(bpm) = self.bpm {
            config.bpm = Some(bpm);
            config.fps = None;
        }
        if let Some(fps) = self.fps {
            config.fps = Some(fps);
        }
        if let Some(ticks) = self.ticks {
            config.ticks = Some(ticks);
        }
        if self.timesig.is_some() {
            config.time_signature = self.timesig;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
        config.split_channels |= self.split_channels;

        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.dump {
        eprintln!("The --dump option isn't supported anymore, use a MIDI monitor instead.");
    }

    if cli.list {
        print_ports()?;
        return Ok(());
    }

    let config = cli.into_config()?;
    if config.split_channels {
        warn!("--split-channels is not supported, recording a single track");
    }

    let settings = config.validate()?;
    let port = config
        .port
        .as_deref()
        .ok_or(ConfigError::MissingPort)
        .context("Please specify a source port with --port")?;
    let output = config
        .output
        .as_ref()
        .ok_or(ConfigError::MissingOutput)
        .context("Please specify a file to record to")?;

    let source = MidiInputSource::connect(port, QueueTempo::new(settings.tempo, settings.ticks))?;
    let writer = SmfWriter::create(output)
        .with_context(|| format!("Cannot open {}", output.display()))?;

    // Signal handling runs on its own worker while the capture loop blocks here
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Cannot start signal handler")?;
    let stop = StopToken::new();
    let listener = {
        let _context = runtime.enter();
        listen_for_shutdown(stop.clone()).context("Cannot listen for Ctrl+C")?
    };
    runtime.spawn(listener);

    println!(
        "Recording from {} to {} (press Ctrl+C to stop)...",
        source.port_name(),
        output.display()
    );

    let finished = CaptureLoop::new(source, writer, settings, stop).run()?;
    drop(finished.output);

    println!(
        "Recorded {} events ({} bytes of track data) to {}",
        finished.summary.events,
        finished.summary.track_bytes,
        output.display()
    );

    runtime.shutdown_background();
    Ok(())
}
