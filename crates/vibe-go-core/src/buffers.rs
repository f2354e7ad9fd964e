use crate::error::PipelineError;
use crate::frame::{Frame, Pixel, alloc_palette};
use crate::scanline::Scanline;

/// One of the two video buffers handed to the display consumer.
#[derive(Debug)]
pub struct VideoSlot<P> {
    pub frame: Frame<P>,
    /// Palette the frame was rendered with. Empty for direct-colour frames.
    pub palette: Vec<u16>,
    /// Changes against the slot published before this one.
    pub diff: Vec<Scanline>,
    /// `false` until a diff has been computed; the frame is then redrawn in
    /// full.
    pub diff_valid: bool,
}

impl<P: Pixel> VideoSlot<P> {
    pub fn new(width: usize, height: usize, palette_len: usize) -> Result<Self, PipelineError> {
        let mut diff = Vec::new();
        diff.try_reserve_exact(height)
            .map_err(|_| PipelineError::Alloc {
                what: "diff",
                bytes: height * std::mem::size_of::<Scanline>(),
            })?;
        diff.resize(height, Scanline::full(width));

        Ok(Self {
            frame: Frame::new(width, height)?,
            palette: alloc_palette(palette_len)?,
            diff,
            diff_valid: false,
        })
    }

    /// Diff to present with, `None` meaning a full redraw.
    pub fn diff(&self) -> Option<&[Scanline]> {
        self.diff_valid.then_some(&self.diff[..])
    }

    pub fn palette(&self) -> Option<&[u16]> {
        (!self.palette.is_empty()).then_some(&self.palette[..])
    }
}

/// Interleaved stereo PCM of one emulated frame.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Vec<i16>,
    capacity: usize,
}

impl SampleBuffer {
    /// Buffer holding up to `frames` stereo frames.
    pub fn new(frames: usize) -> Result<Self, PipelineError> {
        let capacity = frames * 2;
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(capacity)
            .map_err(|_| PipelineError::Alloc {
                what: "audio buffer",
                bytes: capacity * 2,
            })?;
        Ok(Self { samples, capacity })
    }

    /// Append one stereo frame. Returns `false` once the buffer is full.
    pub fn push_stereo(&mut self, left: i16, right: i16) -> bool {
        if self.samples.len() + 2 > self.capacity {
            return false;
        }
        self.samples.extend_from_slice(&[left, right]);
        true
    }

    /// Append interleaved samples, dropping whatever does not fit.
    /// Returns the number of 16-bit samples accepted.
    pub fn extend_interleaved(&mut self, samples: &[i16]) -> usize {
        let room = (self.capacity - self.samples.len()) & !1;
        let take = samples.len().min(room) & !1;
        self.samples.extend_from_slice(&samples[..take]);
        take
    }

    /// Written samples, `pos` entries long.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn pos(&self) -> usize {
        self.samples.len()
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity / 2
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
