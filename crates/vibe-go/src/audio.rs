use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel as cb;
use log::{debug, info, warn};
use vibe_go_core::{AudioError, AudioSink};

use crate::HostError;
use crate::audio_queue::{RingReader, RingWriter, sample_ring};

/// Audio sink that hands PCM to an output device through a [`sample_ring`].
pub struct QueuedAudioSink {
    writer: RingWriter,
    reported_drops: u64,
}

impl QueuedAudioSink {
    /// Creates the sink and the reader end for the output side. The ring holds
    /// `latency_frames` stereo frames.
    pub fn new(latency_frames: usize) -> (Self, RingReader) {
        let (writer, reader) = sample_ring(latency_frames);
        (
            Self {
                writer,
                reported_drops: 0,
            },
            reader,
        )
    }

    pub fn queued(&self) -> usize {
        self.writer.len()
    }

    pub fn dropped(&self) -> u64 {
        self.writer.dropped()
    }
}

impl AudioSink for QueuedAudioSink {
    fn submit(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        if samples.len() % 2 != 0 {
            return Err(AudioError(format!(
                "{} samples is not a whole number of stereo frames",
                samples.len()
            )));
        }
        self.writer.push_interleaved(samples);

        let dropped = self.writer.dropped();
        if dropped != self.reported_drops {
            debug!("audio queue full, {} frames dropped so far", dropped);
            self.reported_drops = dropped;
        }
        Ok(())
    }

    fn terminate(&mut self) {
        info!(
            "audio sink closed with {} frames queued, {} dropped",
            self.writer.len(),
            self.writer.dropped()
        );
    }
}

/// Output side used when no audio device is opened: consumes the ring at the
/// nominal sample rate so the queue behaves as it would in front of a device.
pub struct Drain {
    stop: cb::Sender<()>,
    handle: JoinHandle<u64>,
}

const DRAIN_PERIOD: Duration = Duration::from_millis(10);

impl Drain {
    pub fn spawn(reader: RingReader, sample_rate: u32) -> Result<Self, HostError> {
        let (stop, stopped) = cb::bounded::<()>(1);
        let per_tick = (sample_rate as usize / 100).max(1);
        let handle = thread::Builder::new()
            .name("audio-drain".into())
            .spawn(move || {
                let mut consumed = 0u64;
                loop {
                    match stopped.recv_timeout(DRAIN_PERIOD) {
                        Err(cb::RecvTimeoutError::Timeout) => {
                            consumed += reader.skip(per_tick) as u64;
                        }
                        Ok(()) | Err(cb::RecvTimeoutError::Disconnected) => break,
                    }
                }
                consumed + reader.skip(usize::MAX) as u64
            })
            .map_err(HostError::Io)?;
        Ok(Self { stop, handle })
    }

    /// Stops the thread and returns the frames it consumed.
    pub fn stop(self) -> u64 {
        let _ = self.stop.send(());
        match self.handle.join() {
            Ok(consumed) => consumed,
            Err(_) => {
                warn!("audio drain thread panicked");
                0
            }
        }
    }
}

/// Start playback of the ring on the default output device.
#[cfg(feature = "cpal")]
pub fn start_stream(reader: RingReader) -> Result<cpal::Stream, HostError> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| HostError::AudioOutput("no output device".into()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| HostError::AudioOutput(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let channels = config.channels as usize;
    let err_fn = |err| warn!("cpal stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _| {
                for frame in data.chunks_mut(channels) {
                    let (left, right) = reader.pop_stereo().unwrap_or((0, 0));
                    frame[0] = left;
                    if channels > 1 {
                        frame[1] = right;
                    }
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _| {
                for frame in data.chunks_mut(channels) {
                    let (left, right) = reader.pop_stereo().unwrap_or((0, 0));
                    frame[0] = left as f32 / 32768.0;
                    if channels > 1 {
                        frame[1] = right as f32 / 32768.0;
                    }
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(HostError::AudioOutput(format!(
                "unsupported sample format {other:?}"
            )));
        }
    }
    .map_err(|e| HostError::AudioOutput(e.to_string()))?;

    stream
        .play()
        .map_err(|e| HostError::AudioOutput(e.to_string()))?;
    Ok(stream)
}
