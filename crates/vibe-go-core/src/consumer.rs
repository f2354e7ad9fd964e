//! Display and audio consumer loops.
//!
//! Both follow the same protocol: peek the mailbox, work on the named
//! buffer, release the buffer, then receive the token so the producer may
//! reuse it.

use log::{debug, info};

use crate::bus::DisplayBus;
use crate::dispatch::Dispatcher;
use crate::error::{AudioError, PipelineError};
use crate::frame::{GB_HEIGHT, GB_WIDTH, Pixel, PixelFormat};
use crate::mailbox::Handoff;
use crate::pipeline::Shared;
use crate::scale::ScaleParams;

/// PCM output device.
pub trait AudioSink: Send {
    /// Queue one buffer of interleaved stereo samples.
    fn submit(&mut self, samples: &[i16]) -> Result<(), AudioError>;

    /// Stop output. Called once when the audio consumer exits.
    fn terminate(&mut self) {}
}

/// Present every published video slot until `Shutdown`.
pub fn run_display<P: Pixel, B: DisplayBus>(shared: &Shared<P, B>) -> Result<(), PipelineError> {
    let video = shared.config.video;
    let screen = shared.config.dispatch.screen;
    let fitted = ScaleParams::fit(screen, video.width, video.height, video.aspect);
    let identity = ScaleParams::identity(screen, video.width, video.height);
    let expand = video.expand_native
        && P::FORMAT == PixelFormat::Rgb565
        && video.width == GB_WIDTH
        && video.height == GB_HEIGHT;

    let mut dispatcher = Dispatcher::new(shared.config.dispatch);
    let mut shown_scaling: Option<bool> = None;

    loop {
        let index = match shared.video_mailbox.peek()? {
            Handoff::Payload(index) => index,
            Handoff::Shutdown => break,
            Handoff::Fatal => return Err(PipelineError::FatalToken { consumer: "display" }),
        };
        let slot = shared
            .video
            .get(index)
            .ok_or(PipelineError::FatalToken { consumer: "display" })?;

        let scaling = shared.settings.scaling();
        let redraw = shown_scaling != Some(scaling);
        if redraw && shown_scaling.is_some() {
            debug!("scaling {}: clearing panel", if scaling { "on" } else { "off" });
            dispatcher.clear(&shared.bus)?;
        }

        {
            let slot = slot
                .read()
                .map_err(|_| PipelineError::Poisoned("video slot"))?;
            if scaling && expand {
                dispatcher.write_expanded(&shared.bus, &slot.frame)?;
            } else {
                let diff = if redraw { None } else { slot.diff() };
                let scale = if scaling { &fitted } else { &identity };
                dispatcher.write_frame(
                    &shared.bus,
                    &slot.frame,
                    diff,
                    slot.palette(),
                    video.options,
                    scale,
                )?;
            }
        }
        shown_scaling = Some(scaling);

        // Fatal may have displaced the token while the frame was drawn.
        if let Handoff::Fatal = shared.video_mailbox.receive()? {
            return Err(PipelineError::FatalToken { consumer: "display" });
        }
    }

    info!("display consumer: shutting down");
    shared
        .bus
        .lock()
        .map_err(|_| PipelineError::Poisoned("display bus"))?
        .show_idle();
    Ok(())
}

/// Submit every published audio buffer until `Shutdown`. Buffers are
/// skipped while speed-up is active.
pub fn run_audio<P, B, S: AudioSink>(
    shared: &Shared<P, B>,
    sink: &mut S,
) -> Result<(), PipelineError> {
    loop {
        let index = match shared.audio_mailbox.peek()? {
            Handoff::Payload(index) => index,
            Handoff::Shutdown => break,
            Handoff::Fatal => return Err(PipelineError::FatalToken { consumer: "audio" }),
        };
        let buffer = shared
            .audio
            .get(index)
            .ok_or(PipelineError::FatalToken { consumer: "audio" })?;

        if !shared.settings.speedup() {
            let buffer = buffer
                .lock()
                .map_err(|_| PipelineError::Poisoned("audio buffer"))?;
            sink.submit(buffer.samples())?;
        }

        if let Handoff::Fatal = shared.audio_mailbox.receive()? {
            return Err(PipelineError::FatalToken { consumer: "audio" });
        }
    }

    info!("audio consumer: exiting");
    sink.terminate();
    Ok(())
}
