use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{debug, error, info};
use vibe_go::HostError;
#[cfg(not(feature = "cpal"))]
use vibe_go::audio::Drain;
use vibe_go::audio::QueuedAudioSink;
use vibe_go::config::{self, HostConfig, VideoSource};
use vibe_go::demo::{GradientCore, PaletteCore};
use vibe_go::panel::VirtualPanel;
use vibe_go_core::{EmulationCore, Pipeline, PipelineEvent, Settings};

#[derive(Parser)]
struct Args {
    /// Number of frames to run; runs until killed when omitted
    #[arg(long)]
    frames: Option<u64>,

    /// Draw frames 1:1 in the centre of the panel
    #[arg(long)]
    no_scale: bool,

    /// Present every tenth frame and mute audio
    #[arg(long)]
    speedup: bool,

    /// Render the 256x224 indexed source instead of the 160x144 LCD
    #[arg(long)]
    indexed: bool,

    /// Write the panel contents to this PNG on exit
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Pipeline config file (defaults to the per-user location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut cfg = config::load_from_file(&path);
    debug!("config from {}: {cfg:?}", path.display());
    if args.indexed {
        cfg.display.source = VideoSource::Indexed;
    }

    match run(&args, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, cfg: &HostConfig) -> Result<(), HostError> {
    let settings = Arc::new(cfg.settings());
    if args.no_scale {
        settings.set_scaling(false);
    }
    settings.set_speedup(args.speedup);

    let sample_rate = cfg.audio.sample_rate;
    match cfg.display.source {
        VideoSource::Rgb565 => drive(GradientCore::new(sample_rate), args, cfg, settings),
        VideoSource::Indexed => drive(PaletteCore::new(sample_rate), args, cfg, settings),
    }
}

fn drive<C: EmulationCore>(
    core: C,
    args: &Args,
    cfg: &HostConfig,
    settings: Arc<Settings>,
) -> Result<(), HostError> {
    let panel = VirtualPanel::new(cfg.screen());
    let mut pipeline = Pipeline::<C::Pixel, _>::new(cfg.pipeline(), panel, settings)?;
    let events = pipeline.events();
    let shared = Arc::clone(pipeline.shared());

    let (sink, reader) = QueuedAudioSink::new(cfg.audio.latency_frames);
    #[cfg(feature = "cpal")]
    let output = match vibe_go::audio::start_stream(reader) {
        Ok(stream) => Output::Device(stream),
        Err(e) => {
            log::warn!("{e}; audio disabled");
            Output::None
        }
    };
    #[cfg(not(feature = "cpal"))]
    let output = Output::Drain(Drain::spawn(reader, cfg.audio.sample_rate)?);

    pipeline.start(sink)?;
    let mut producer = pipeline.producer(core);
    let result = producer.run(args.frames);
    info!("stopped after {} frames", producer.frame());
    pipeline.shutdown()?;
    result?;
    output.stop();

    for event in events.try_iter() {
        match event {
            PipelineEvent::Stats(stats) => debug!("{:?}", stats),
            PipelineEvent::ConsumerExited { consumer } => debug!("{consumer} consumer exited"),
        }
    }

    let panel = shared.bus.lock().map_err(|_| HostError::Poisoned("panel"))?;
    let stats = panel.stats();
    info!(
        "panel: {} sessions, {} rects ({} polled), {} pixels",
        stats.sessions, stats.rects, stats.polled_rects, stats.pixels
    );
    if let Some(path) = &args.snapshot {
        panel.write_png(path)?;
        info!("snapshot written to {}", path.display());
    }
    Ok(())
}

enum Output {
    #[cfg(feature = "cpal")]
    Device(cpal::Stream),
    #[cfg(feature = "cpal")]
    None,
    #[cfg(not(feature = "cpal"))]
    Drain(Drain),
}

impl Output {
    fn stop(self) {
        match self {
            #[cfg(feature = "cpal")]
            Output::Device(stream) => drop(stream),
            #[cfg(feature = "cpal")]
            Output::None => {}
            #[cfg(not(feature = "cpal"))]
            Output::Drain(drain) => debug!("drained {} audio frames", drain.stop()),
        }
    }
}
