use crate::dispatch::DispatchConfig;
use crate::frame::{GB_HEIGHT, GB_WIDTH};
use crate::pacing::PacingConfig;
use crate::scanline::DiffOptions;

/// Geometry and colour handling of the emulated video output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoConfig {
    pub width: usize,
    pub height: usize,
    /// Entries per palette. Zero for direct-colour output.
    pub palette_len: usize,
    pub options: DiffOptions,
    /// Pixel aspect ratio used when scaling.
    pub aspect: f32,
    /// Diff one field per frame instead of the whole frame.
    pub interlaced: bool,
    /// Use the blended 3:5 path for native 160x144 direct-colour frames
    /// when scaling is enabled.
    pub expand_native: bool,
}

impl VideoConfig {
    /// Direct RGB565 output of the 160x144 LCD.
    pub fn gb() -> Self {
        Self {
            width: GB_WIDTH,
            height: GB_HEIGHT,
            palette_len: 0,
            options: DiffOptions::direct(),
            aspect: 1.0,
            interlaced: false,
            expand_native: true,
        }
    }

    /// Palette-indexed output with `pixel_mask + 1` colours, plus the shift
    /// half when `palette_shift_mask` is set.
    pub fn indexed(width: usize, height: usize, options: DiffOptions) -> Self {
        Self {
            width,
            height,
            palette_len: options.palette_len(),
            options,
            aspect: 1.0,
            interlaced: false,
            expand_native: false,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self::gb()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Stereo frames each audio buffer holds.
    pub buffer_frames: usize,
}

impl AudioConfig {
    /// Buffers sized for a tenth of a second, plus one frame of slack.
    pub fn with_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffer_frames: sample_rate as usize / 10 + 1,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::with_rate(32000)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PipelineConfig {
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub dispatch: DispatchConfig,
    pub pacing: PacingConfig,
}
