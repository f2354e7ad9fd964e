//! Pipeline context: the double buffers, both mailboxes, the display bus and
//! the consumer threads.

use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel as cb;
use log::{error, info};

use crate::buffers::{SampleBuffer, VideoSlot};
use crate::bus::DisplayBus;
use crate::config::PipelineConfig;
use crate::consumer::{self, AudioSink};
use crate::emulation::EmulationCore;
use crate::error::PipelineError;
use crate::frame::Pixel;
use crate::mailbox::{Handoff, Mailbox};
use crate::pacing::FrameStats;
use crate::producer::Producer;
use crate::settings::Settings;

const EVENT_CAPACITY: usize = 64;
/// Room kept free for one `ConsumerExited` per consumer.
pub(crate) const RESERVED_EVENTS: usize = 2;

/// Notifications for whoever hosts the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    /// Frame-rate report, once per pacing report interval.
    Stats(FrameStats),
    /// A consumer left its loop after `Shutdown`.
    ConsumerExited { consumer: &'static str },
}

/// State shared by the producer and both consumers.
///
/// The locks around the buffers are never contended: the handoff protocol
/// orders every producer write after the consumer has released the buffer.
pub struct Shared<P, B> {
    pub config: PipelineConfig,
    pub settings: Arc<Settings>,
    pub video: [RwLock<VideoSlot<P>>; 2],
    pub audio: [Mutex<SampleBuffer>; 2],
    pub video_mailbox: Mailbox<usize>,
    pub audio_mailbox: Mailbox<usize>,
    pub bus: Mutex<B>,
}

impl<P: Pixel, B: DisplayBus> Shared<P, B> {
    pub fn new(config: PipelineConfig, bus: B, settings: Arc<Settings>) -> Result<Self, PipelineError> {
        let video = config.video;
        let slot = || VideoSlot::new(video.width, video.height, video.palette_len).map(RwLock::new);
        let samples = || SampleBuffer::new(config.audio.buffer_frames).map(Mutex::new);
        let video = [slot()?, slot()?];
        let audio = [samples()?, samples()?];

        Ok(Self {
            config,
            settings,
            video,
            audio,
            video_mailbox: Mailbox::new(),
            audio_mailbox: Mailbox::new(),
            bus: Mutex::new(bus),
        })
    }
}

pub struct Pipeline<P, B> {
    shared: Arc<Shared<P, B>>,
    display: Option<JoinHandle<()>>,
    audio: Option<JoinHandle<()>>,
    event_tx: cb::Sender<PipelineEvent>,
    event_rx: cb::Receiver<PipelineEvent>,
}

impl<P: Pixel, B: DisplayBus + 'static> Pipeline<P, B> {
    /// Allocate all four buffers. Nothing runs until [`Pipeline::start`].
    pub fn new(config: PipelineConfig, bus: B, settings: Arc<Settings>) -> Result<Self, PipelineError> {
        let shared = Arc::new(Shared::new(config, bus, settings)?);
        let (event_tx, event_rx) = cb::bounded(EVENT_CAPACITY);
        info!(
            "pipeline: {}x{} video, {} Hz audio ({} frames per buffer)",
            config.video.width,
            config.video.height,
            config.audio.sample_rate,
            config.audio.buffer_frames
        );
        Ok(Self {
            shared,
            display: None,
            audio: None,
            event_tx,
            event_rx,
        })
    }

    pub fn shared(&self) -> &Arc<Shared<P, B>> {
        &self.shared
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.shared.settings
    }

    pub fn bus(&self) -> &Mutex<B> {
        &self.shared.bus
    }

    pub fn events(&self) -> cb::Receiver<PipelineEvent> {
        self.event_rx.clone()
    }

    /// Spawn the display and audio consumers.
    pub fn start<S: AudioSink + 'static>(&mut self, mut sink: S) -> Result<(), PipelineError> {
        if self.display.is_none() {
            let shared = Arc::clone(&self.shared);
            self.display = Some(spawn_consumer("display", self.event_tx.clone(), move || {
                consumer::run_display(&shared)
            })?);
        }
        if self.audio.is_none() {
            let shared = Arc::clone(&self.shared);
            self.audio = Some(spawn_consumer("audio", self.event_tx.clone(), move || {
                consumer::run_audio(&shared, &mut sink)
            })?);
        }
        Ok(())
    }

    /// Producer driving `core` into this pipeline's buffers.
    pub fn producer<C: EmulationCore<Pixel = P>>(&self, core: C) -> Producer<C, B> {
        Producer::new(Arc::clone(&self.shared), core, self.event_tx.clone())
    }

    /// Stop audio first, then video, waiting for each consumer to exit.
    ///
    /// Must be called from the producer side once it stopped publishing.
    pub fn shutdown(mut self) -> Result<(), PipelineError> {
        info!("pipeline: stopping audio");
        if let Some(handle) = self.audio.take() {
            self.shared.audio_mailbox.send(Handoff::Shutdown)?;
            join("audio", handle)?;
        }

        info!("pipeline: stopping display");
        if let Some(handle) = self.display.take() {
            self.shared.video_mailbox.send(Handoff::Shutdown)?;
            join("display", handle)?;
        }
        Ok(())
    }
}

/// Run a consumer loop on a named thread.
///
/// A consumer that fails leaves the producer blocked on its mailbox with no
/// way to recover, so any error ends the process.
fn spawn_consumer<F>(
    name: &'static str,
    events: cb::Sender<PipelineEvent>,
    body: F,
) -> Result<JoinHandle<()>, PipelineError>
where
    F: FnOnce() -> Result<(), PipelineError> + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || match body() {
            Ok(()) => {
                let _ = events.try_send(PipelineEvent::ConsumerExited { consumer: name });
            }
            Err(err) => {
                error!("{name} consumer: {err}");
                std::process::abort();
            }
        })
        .map_err(|source| PipelineError::Spawn { name, source })
}

fn join(consumer: &'static str, handle: JoinHandle<()>) -> Result<(), PipelineError> {
    handle
        .join()
        .map_err(|_| PipelineError::ConsumerPanicked { consumer })
}
