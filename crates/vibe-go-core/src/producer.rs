use std::sync::Arc;

use crossbeam_channel as cb;
use log::{debug, info, warn};

use crate::bus::DisplayBus;
use crate::emulation::{CoreOutput, EmulationCore};
use crate::error::PipelineError;
use crate::mailbox::Handoff;
use crate::pacing::{CycleCounter, FpsMeter, FrameStats, MonotonicCounter, elapsed_cycles};
use crate::pipeline::{PipelineEvent, RESERVED_EVENTS, Shared};
use crate::scanline::{self, InterlacedPalettes, PalettePair};

/// Whether frame `frame` is handed to the display.
///
/// Every other frame at normal speed, every tenth while speeding up.
pub fn should_publish(frame: u64, speedup: bool) -> bool {
    (frame % 2 == 0 && !speedup) || frame % 10 == 0
}

/// Drives the emulation core and owns the write side of both double
/// buffers.
pub struct Producer<C: EmulationCore, B> {
    shared: Arc<Shared<C::Pixel, B>>,
    core: C,
    counter: Box<dyn CycleCounter>,
    meter: FpsMeter,
    events: cb::Sender<PipelineEvent>,
    current_video: usize,
    current_audio: usize,
    /// Slot of the last frame sent to the display.
    published: Option<usize>,
    /// Interlace field of the next published frame.
    field: usize,
    frame: u64,
}

impl<C: EmulationCore, B: DisplayBus> Producer<C, B> {
    pub(crate) fn new(
        shared: Arc<Shared<C::Pixel, B>>,
        core: C,
        events: cb::Sender<PipelineEvent>,
    ) -> Self {
        let pacing = shared.config.pacing;
        Self {
            shared,
            core,
            counter: Box::new(MonotonicCounter::default()),
            meter: FpsMeter::new(pacing.report_interval, pacing.counter_hz),
            events,
            current_video: 0,
            current_audio: 0,
            published: None,
            field: 0,
            frame: 0,
        }
    }

    /// Replace the frame timer, e.g. with a hardware cycle counter.
    /// `counter_hz` in the pacing config must match its rate.
    pub fn with_counter(mut self, counter: Box<dyn CycleCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    /// Frames emulated so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Field the next interlaced publish redraws.
    pub fn field(&self) -> usize {
        self.field
    }

    /// Run `f` with the core and the buffers it currently writes to.
    fn with_output<R>(
        &mut self,
        f: impl FnOnce(&mut C, &mut CoreOutput<'_, C::Pixel>) -> R,
    ) -> Result<R, PipelineError> {
        let mut slot = self.shared.video[self.current_video]
            .write()
            .map_err(|_| PipelineError::Poisoned("video slot"))?;
        let mut audio = self.shared.audio[self.current_audio]
            .lock()
            .map_err(|_| PipelineError::Poisoned("audio buffer"))?;

        let slot = &mut *slot;
        let mut out = CoreOutput {
            frame: &mut slot.frame,
            palette: &mut slot.palette,
            audio: &mut audio,
        };
        Ok(f(&mut self.core, &mut out))
    }

    /// Emulate one frame and hand its output to the consumers.
    pub fn run_frame(&mut self) -> Result<(), PipelineError> {
        let pacing = self.shared.config.pacing;
        let speedup = self.shared.settings.speedup();
        let start = self.counter.now();

        self.with_output(|core, out| {
            core.emulate(pacing.visible_cycles, out);
            while core.line() > 0 && core.line() < pacing.visible_lines {
                core.step(out);
            }
        })?;

        if should_publish(self.frame, speedup) {
            self.publish()?;
        }

        self.with_output(|core, out| core.end_of_frame(out))?;
        self.swap_audio()?;

        self.with_output(|core, out| {
            if !core.lcd_enabled() {
                core.emulate(pacing.vblank_cycles, out);
            }
            while core.line() > 0 {
                core.step(out);
            }
        })?;

        let stop = self.counter.now();
        self.frame += 1;
        if let Some(stats) = self.meter.record(elapsed_cycles(start, stop)) {
            info!("FPS:{:.2} over {} frames", stats.fps, stats.frames);
            self.report(stats);
        }
        Ok(())
    }

    /// Queue a stats event unless that would leave no room for the
    /// consumers' exit events.
    fn report(&self, stats: FrameStats) {
        let capacity = self.events.capacity().unwrap_or(usize::MAX);
        if self.events.len() + RESERVED_EVENTS < capacity {
            let _ = self.events.try_send(PipelineEvent::Stats(stats));
        } else {
            debug!("event queue full, stats dropped");
        }
    }

    /// Run `frames` frames, or forever when `None`.
    pub fn run(&mut self, frames: Option<u64>) -> Result<(), PipelineError> {
        let mut remaining = frames;
        while remaining != Some(0) {
            if let Err(err) = self.run_frame() {
                if matches!(err, PipelineError::Poisoned(_)) {
                    self.fail();
                }
                return Err(err);
            }
            remaining = remaining.map(|n| n - 1);
        }
        Ok(())
    }

    /// Diff the current slot against the last published one, send it and
    /// move on to the other slot.
    fn publish(&mut self) -> Result<(), PipelineError> {
        let current = self.current_video;
        let video = self.shared.config.video;
        {
            let mut slot = self.shared.video[current]
                .write()
                .map_err(|_| PipelineError::Poisoned("video slot"))?;
            let previous = match self.published {
                Some(index) => Some(
                    self.shared.video[index]
                        .read()
                        .map_err(|_| PipelineError::Poisoned("video slot"))?,
                ),
                None => None,
            };
            let previous = previous.as_deref();
            let slot = &mut *slot;
            let indexed = video.palette_len > 0;

            if video.interlaced {
                let palettes = match previous {
                    Some(prev) if indexed => Some(InterlacedPalettes {
                        current: &mut slot.palette[..],
                        previous: &prev.palette[..],
                    }),
                    _ => None,
                };
                scanline::diff_interlaced(
                    &mut slot.frame,
                    previous.map(|p| &p.frame),
                    palettes,
                    video.options,
                    self.field,
                    &mut slot.diff,
                    previous.map_or(&[][..], |p| &p.diff[..]),
                )?;
            } else {
                let palettes = match previous {
                    Some(prev) if indexed => Some(PalettePair {
                        current: &slot.palette[..],
                        previous: &prev.palette[..],
                    }),
                    _ => None,
                };
                scanline::diff(
                    &slot.frame,
                    previous.map(|p| &p.frame),
                    palettes,
                    video.options,
                    &mut slot.diff,
                )?;
            }
            slot.diff_valid = true;
            debug!(
                "frame {}: slot {current}, {} px changed",
                self.frame,
                scanline::diff_count(&slot.diff)
            );
        }

        self.shared.video_mailbox.send(Handoff::Payload(current))?;
        self.published = Some(current);
        if video.interlaced {
            self.field ^= 1;
        }
        self.current_video = current ^ 1;

        // The core only rewrites its palette when it changes.
        let published = self.shared.video[current]
            .read()
            .map_err(|_| PipelineError::Poisoned("video slot"))?;
        let mut next = self.shared.video[self.current_video]
            .write()
            .map_err(|_| PipelineError::Poisoned("video slot"))?;
        next.palette.copy_from_slice(&published.palette);
        Ok(())
    }

    fn swap_audio(&mut self) -> Result<(), PipelineError> {
        self.shared
            .audio_mailbox
            .send(Handoff::Payload(self.current_audio))?;
        self.current_audio ^= 1;
        self.shared.audio[self.current_audio]
            .lock()
            .map_err(|_| PipelineError::Poisoned("audio buffer"))?
            .clear();
        Ok(())
    }

    /// Tell both consumers the shared state can no longer be trusted.
    pub fn fail(&self) {
        warn!("producer: sending fatal token");
        self.shared.audio_mailbox.replace(Handoff::Fatal);
        self.shared.video_mailbox.replace(Handoff::Fatal);
    }
}
