use std::{
    fs::{File, OpenOptions},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use edgetap::{
    device::{DeviceSink, DeviceSource, GrabbedDevice},
    dispatch::{LogSink, OutputSink},
    error::MalformedStreamError,
    event::{Frame, Frames},
    gesture::GestureConfig,
    pipeline::Pipeline,
    synth::TrajectoryGenerator,
    trace::{TraceReader, TraceWriter},
};

#[derive(Debug, Parser)]
#[command(name = "edgetap")]
#[command(about = "Double-tap edge gestures for touchscreen readers")]
#[command(group(ArgGroup::new("source").required(true).args(["device", "replay", "generate"])))]
struct Cli {
    /// Touch input device to read live events from.
    #[arg(long)]
    device: Option<PathBuf>,
    /// Recorded trace to replay.
    #[arg(long)]
    replay: Option<PathBuf>,
    /// Synthetic trajectory to run, e.g. `double_tap_left`.
    #[arg(long)]
    generate: Option<String>,
    /// Write every frame read to this trace file.
    #[arg(long)]
    record: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Device receiving synthetic swipes. Defaults to the input device.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Log gestures instead of writing swipes.
    #[arg(long)]
    dry_run: bool,
    /// Take the input device exclusively, e.g. while recording.
    #[arg(long, requires = "device")]
    grab: bool,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

type FrameStream = Box<dyn Iterator<Item = Result<Frame, MalformedStreamError>>>;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(level);
    builder.parse_default_env();
    builder.init();
}

fn load_config(path: Option<&Path>) -> Result<GestureConfig> {
    match path {
        Some(path) => GestureConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(GestureConfig::default()),
    }
}

fn open_source(
    cli: &Cli,
    config: &GestureConfig,
    grabbed: Option<&GrabbedDevice>,
) -> Result<FrameStream> {
    if let Some(path) = &cli.device {
        let file = match grabbed {
            Some(device) => device.handle(),
            None => File::open(path),
        }
        .with_context(|| format!("opening {}", path.display()))?;
        log::info!("reading touch events from {}", path.display());
        return Ok(Box::new(Frames::new(DeviceSource::new(file))));
    }
    if let Some(path) = &cli.replay {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        log::info!("replaying {}", path.display());
        return Ok(Box::new(TraceReader::new(BufReader::new(file))));
    }
    let name = cli
        .generate
        .as_deref()
        .context("one of --device, --replay or --generate is required")?;
    let frames = TrajectoryGenerator::new(config).generate(name)?;
    log::info!("generated {} frames for {name}", frames.len());
    Ok(Box::new(frames.into_iter().map(Ok)))
}

fn open_sink(cli: &Cli, grabbed: Option<&GrabbedDevice>) -> Result<Box<dyn OutputSink>> {
    if grabbed.is_some() && cli.output.is_none() && !cli.dry_run {
        log::warn!("input device is grabbed, swipes would only reach edgetap; logging them instead");
        return Ok(Box::new(LogSink::new()));
    }
    let target = cli.output.as_ref().or(cli.device.as_ref());
    match target {
        Some(path) if !cli.dry_run => {
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .with_context(|| format!("opening {} for writing", path.display()))?;
            log::info!("writing swipes to {}", path.display());
            Ok(Box::new(DeviceSink::paced(file)))
        }
        _ => Ok(Box::new(LogSink::new())),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let grabbed = match (&cli.device, cli.grab) {
        (Some(path), true) => Some(
            GrabbedDevice::open(path).with_context(|| format!("grabbing {}", path.display()))?,
        ),
        _ => None,
    };
    let frames = open_source(&cli, &config, grabbed.as_ref())?;
    let mut sink = open_sink(&cli, grabbed.as_ref())?;
    let mut pipeline = Pipeline::new(&config);

    match &cli.record {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut recorder = TraceWriter::new(BufWriter::new(file));
            let result = pipeline.run(frames, sink.as_mut(), Some(&mut recorder));
            let written = recorder.frames_written();
            recorder
                .finish()
                .with_context(|| format!("finishing {}", path.display()))?;
            log::info!("recorded {written} frames to {}", path.display());
            result?;
        }
        None => {
            pipeline.run(frames, sink.as_mut(), None::<&mut TraceWriter<File>>)?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
