//! bw-frames CLI
//!
//! Decodes a video with ffmpeg (or reads raw RGB24 from stdin), reduces
//! every frame to black/white pixels and writes the sequence as JSON.

use bw_frames::{
    metrics::MetricsRegistry,
    pipeline::{AbortPolicy, Interruption, Pipeline, PipelineError},
    reduction::RowMode,
    sink::{FrameSink, JsonFileSink, OutputFormat, StreamInfo},
    source::{ByteSource, FfmpegSource, FileConfig, MockSource, ReaderSource, ThresholdFilter},
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "bw-frames", version, about)]
struct Cli {
    /// Video file to decode with ffmpeg
    input: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Frame width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Output frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Averages below this become 0
    #[arg(long)]
    threshold: Option<u8>,

    /// Bytes averaged per pixel (3 for RGB24)
    #[arg(long)]
    window: Option<usize>,

    /// Assembly buffer headroom in bytes
    #[arg(long)]
    slack: Option<usize>,

    /// Drop the last pixel of every row like older output
    #[arg(long)]
    legacy_rows: bool,

    /// ffmpeg executable
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Force the input frame rate
    #[arg(long)]
    input_fps: Option<u32>,

    /// Binarise in ffmpeg; value is the source video size, e.g. 480x360
    #[arg(long, value_name = "WxH")]
    threshold_filter: Option<ThresholdFilter>,

    /// Read raw RGB24 frames from stdin instead of running ffmpeg
    #[arg(long, conflicts_with = "input")]
    stdin: bool,

    /// Use N synthetic frames instead of a real source
    #[arg(long, value_name = "N", conflicts_with_all = ["input", "stdin"])]
    mock: Option<usize>,

    /// Output layout: frames or document
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,

    /// On upstream failure or Ctrl-C: flush or discard
    #[arg(long)]
    on_abort: Option<AbortPolicy>,

    /// Serve Prometheus metrics on this port (needs the `metrics` feature)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Loads the config file (if any) and applies flag overrides.
    fn resolve(&self) -> Result<FileConfig, PipelineError> {
        let mut config = match &self.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };

        let stream = &mut config.stream;
        stream.width = self.width.unwrap_or(stream.width);
        stream.height = self.height.unwrap_or(stream.height);
        stream.fps = self.fps.unwrap_or(stream.fps);
        stream.slack_bytes = self.slack.unwrap_or(stream.slack_bytes);

        let reduction = &mut config.reduction;
        reduction.threshold = self.threshold.unwrap_or(reduction.threshold);
        reduction.window = self.window.unwrap_or(reduction.window);
        if self.legacy_rows {
            reduction.row_mode = RowMode::Legacy;
        }

        let source = &mut config.source;
        if let Some(input) = &self.input {
            source.input = Some(input.clone());
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            source.ffmpeg = ffmpeg.clone();
        }
        source.input_fps = self.input_fps.or(source.input_fps);
        source.threshold_filter = self.threshold_filter.or(source.threshold_filter);

        let output = &mut config.output;
        if let Some(path) = &self.output {
            output.path = path.clone();
        }
        output.format = self.format.unwrap_or(output.format);
        output.pretty |= self.pretty;
        output.on_abort = self.on_abort.unwrap_or(output.on_abort);
        output.metrics_port = self.metrics_port.unwrap_or(output.metrics_port);

        config.validate()?;
        Ok(config)
    }

    fn source(&self, config: &FileConfig) -> Box<dyn ByteSource> {
        if let Some(frames) = self.mock {
            return Box::new(MockSource::new(
                config.stream.width,
                config.stream.height,
                frames,
            ));
        }
        if self.stdin {
            return Box::new(ReaderSource::stdin());
        }
        match FfmpegSource::from_config(&config.source, &config.stream) {
            Some(ffmpeg) => Box::new(ffmpeg),
            None => {
                info!("No input file given, reading raw RGB24 from stdin");
                Box::new(ReaderSource::stdin())
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

/// Returns whether the server is up; the registry is only worth
/// updating if it is.
#[cfg(feature = "metrics")]
fn start_metrics_server(port: u16, registry: &MetricsRegistry) -> bool {
    use bw_frames::metrics::{MetricsServer, MetricsServerConfig};

    match MetricsServer::new(MetricsServerConfig::with_port(port), registry.clone()).spawn() {
        Ok(_) => true,
        Err(e) => {
            warn!(port, "Metrics server disabled: {}", e);
            false
        }
    }
}

#[cfg(not(feature = "metrics"))]
fn start_metrics_server(port: u16, _registry: &MetricsRegistry) -> bool {
    warn!(port, "Built without the `metrics` feature; metrics server disabled");
    false
}

fn run(cli: &Cli, cancel: &AtomicBool) -> Result<ExitCode, PipelineError> {
    let config = cli.resolve()?;
    info!(
        width = config.stream.width,
        height = config.stream.height,
        threshold = config.reduction.threshold,
        output = %config.output.path.display(),
        "Starting run"
    );

    let mut pipeline = Pipeline::from_config(&config)?;
    if config.output.metrics_port != 0 {
        match MetricsRegistry::new() {
            Ok(registry) => {
                if start_metrics_server(config.output.metrics_port, &registry) {
                    pipeline = pipeline.with_metrics(registry);
                }
            }
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    let mut source = cli.source(&config);
    let outcome = pipeline.run(source.as_mut(), cancel, config.output.on_abort)?;

    if let Some(frames) = outcome.frames_to_write() {
        let mut sink = JsonFileSink::new(&config.output.path)
            .with_format(config.output.format)
            .pretty(config.output.pretty)
            .with_stream_info(StreamInfo {
                width: config.stream.width,
                height: config.stream.height,
                fps: config.stream.fps,
                threshold: config.reduction.threshold,
                row_mode: config.reduction.row_mode,
            });
        sink.write(frames, &outcome.report)?;
    } else {
        warn!(
            discarded = outcome.report.frames_discarded,
            "Run interrupted; frames discarded"
        );
    }

    Ok(match &outcome.interruption {
        None => ExitCode::SUCCESS,
        Some(Interruption::Cancelled) => ExitCode::from(130),
        Some(Interruption::Upstream(e)) => {
            error!("Upstream failed: {}", e);
            ExitCode::FAILURE
        }
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("bw-frames v{}", bw_frames::VERSION);

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    match run(&cli, &cancel) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
