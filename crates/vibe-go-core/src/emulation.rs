use crate::buffers::SampleBuffer;
use crate::frame::{Frame, Pixel};

/// Buffers the core renders into during one call.
///
/// `frame` and `palette` belong to the video slot being drawn, `audio` to
/// the sample buffer being filled. Both change identity between frames.
pub struct CoreOutput<'a, P> {
    pub frame: &'a mut Frame<P>,
    pub palette: &'a mut [u16],
    pub audio: &'a mut SampleBuffer,
}

/// The emulated machine as seen by the producer.
///
/// Only the frame pacing contract lives here: run a budget, step until a
/// line boundary, report the current line. CPU/PPU/APU semantics are the
/// implementor's business.
pub trait EmulationCore {
    type Pixel: Pixel;

    /// Run for roughly `cycles` cycles.
    fn emulate(&mut self, cycles: u32, out: &mut CoreOutput<'_, Self::Pixel>);

    /// Advance by the smallest unit that can move [`EmulationCore::line`].
    fn step(&mut self, out: &mut CoreOutput<'_, Self::Pixel>);

    /// Scanline currently being rendered; 0 at the start of a frame.
    fn line(&self) -> u32;

    /// `false` while the emulated LCD is switched off.
    fn lcd_enabled(&self) -> bool {
        true
    }

    /// Per-frame bookkeeping after the video handoff (sound mix, clocks).
    fn end_of_frame(&mut self, out: &mut CoreOutput<'_, Self::Pixel>);
}
