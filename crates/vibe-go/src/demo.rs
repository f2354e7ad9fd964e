//! Synthetic emulation cores that exercise the pipeline without a ROM.
//!
//! Both cores follow the handheld's line timing (456 cycles per line, 144
//! visible lines out of 154) so the producer's pacing sees the same line
//! counter progression as with a real machine.

use vibe_go_core::frame::{GB_HEIGHT, GB_WIDTH};
use vibe_go_core::{CoreOutput, EmulationCore, Frame, Pixel};

pub const CYCLES_PER_LINE: u32 = 456;
pub const VISIBLE_LINES: u32 = 144;
pub const TOTAL_LINES: u32 = 154;

pub const INDEXED_WIDTH: usize = 256;
pub const INDEXED_HEIGHT: usize = 224;

const FRAME_RATE: u32 = 60;
const SPRITE: usize = 16;
const AMPLITUDE: i16 = 0x0C00;
/// Square-wave periods in samples, cycled every half second.
const NOTES: [u32; 4] = [73, 61, 49, 37];

#[derive(Debug, Clone, Default)]
struct LineClock {
    line: u32,
    cycle: u32,
}

impl LineClock {
    /// Advance by `cycles`, calling `finished` with every line completed.
    fn advance(&mut self, cycles: u32, mut finished: impl FnMut(u32)) {
        let mut remaining = cycles;
        while remaining > 0 {
            let left = CYCLES_PER_LINE - self.cycle;
            if remaining < left {
                self.cycle += remaining;
                return;
            }
            remaining -= left;
            finished(self.line);
            self.cycle = 0;
            self.line = (self.line + 1) % TOTAL_LINES;
        }
    }

    fn to_next_line(&mut self, finished: impl FnMut(u32)) {
        self.advance(CYCLES_PER_LINE - self.cycle, finished);
    }
}

/// Frame rows produced when `line` completes.
fn rows_for_line(line: u32, height: usize) -> std::ops::Range<usize> {
    if line >= VISIBLE_LINES {
        return 0..0;
    }
    let visible = VISIBLE_LINES as usize;
    let line = line as usize;
    line * height / visible..(line + 1) * height / visible
}

#[derive(Debug, Clone)]
struct SquareWave {
    sample_rate: u32,
    carry: u32,
    phase: u32,
}

impl SquareWave {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            carry: 0,
            phase: 0,
        }
    }

    /// One frame's worth of samples.
    fn render(&mut self, frame: u64, out: &mut CoreOutput<'_, impl Pixel>) {
        self.carry += self.sample_rate;
        let samples = self.carry / FRAME_RATE;
        self.carry %= FRAME_RATE;

        let period = NOTES[(frame / 30) as usize % NOTES.len()];
        for _ in 0..samples {
            let level = if self.phase < period / 2 {
                AMPLITUDE
            } else {
                -AMPLITUDE
            };
            if !out.audio.push_stereo(level, level) {
                break;
            }
            self.phase = (self.phase + 1) % period;
        }
    }
}

/// Position of a sprite bouncing across `span` pixels.
fn bounce(frame: u64, speed: u64, span: usize) -> usize {
    let span = span.max(1) as u64;
    let t = (frame * speed) % (2 * span);
    (if t < span { t } else { 2 * span - t }) as usize
}

#[inline]
fn rgb565(r: u16, g: u16, b: u16) -> u16 {
    (r << 11) | (g << 5) | b
}

/// 160x144 RGB565 core: a static gradient with a bouncing white square.
#[derive(Debug, Clone)]
pub struct GradientCore {
    clock: LineClock,
    tone: SquareWave,
    frame: u64,
}

impl GradientCore {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            clock: LineClock::default(),
            tone: SquareWave::new(sample_rate),
            frame: 0,
        }
    }

    pub fn pixel(frame: u64, x: usize, y: usize) -> u16 {
        let sx = bounce(frame, 2, GB_WIDTH - SPRITE);
        let sy = bounce(frame, 1, GB_HEIGHT - SPRITE);
        if (sx..sx + SPRITE).contains(&x) && (sy..sy + SPRITE).contains(&y) {
            return 0xFFFF;
        }
        let r = (x * 31 / (GB_WIDTH - 1)) as u16;
        let g = (y * 63 / (GB_HEIGHT - 1)) as u16;
        rgb565(r, g, 0x0C)
    }

    fn render_line(frame: u64, line: u32, out: &mut Frame<u16>) {
        for y in rows_for_line(line, out.height()) {
            for x in 0..out.width() {
                out.set(x, y, Self::pixel(frame, x, y));
            }
        }
    }
}

impl EmulationCore for GradientCore {
    type Pixel = u16;

    fn emulate(&mut self, cycles: u32, out: &mut CoreOutput<'_, u16>) {
        let frame = self.frame;
        self.clock
            .advance(cycles, |line| Self::render_line(frame, line, out.frame));
    }

    fn step(&mut self, out: &mut CoreOutput<'_, u16>) {
        let frame = self.frame;
        self.clock
            .to_next_line(|line| Self::render_line(frame, line, out.frame));
    }

    fn line(&self) -> u32 {
        self.clock.line
    }

    fn end_of_frame(&mut self, out: &mut CoreOutput<'_, u16>) {
        self.tone.render(self.frame, out);
        self.frame += 1;
    }
}

/// 256x224 indexed core: a 16-colour tile pattern whose palette rotates every
/// half second, with a bouncing sprite drawn in colour 15.
#[derive(Debug, Clone)]
pub struct PaletteCore {
    clock: LineClock,
    tone: SquareWave,
    frame: u64,
}

/// Base colours of the tile pattern.
const BASE_PALETTE: [u16; 16] = [
    0x0000, 0x8000, 0x0400, 0x8400, 0x0010, 0x8010, 0x0410, 0xC618, 0x8410, 0xF800, 0x07E0,
    0xFFE0, 0x001F, 0xF81F, 0x07FF, 0xFFFF,
];

impl PaletteCore {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            clock: LineClock::default(),
            tone: SquareWave::new(sample_rate),
            frame: 0,
        }
    }

    pub fn index(frame: u64, x: usize, y: usize) -> u8 {
        let sx = bounce(frame, 3, INDEXED_WIDTH - SPRITE);
        let sy = bounce(frame, 2, INDEXED_HEIGHT - SPRITE);
        if (sx..sx + SPRITE).contains(&x) && (sy..sy + SPRITE).contains(&y) {
            return 15;
        }
        ((x / 32 + y / 32) % 14) as u8 + 1
    }

    /// Colour `entry` of the palette shown on `frame`.
    pub fn colour(frame: u64, entry: usize) -> u16 {
        match entry {
            1..=14 => BASE_PALETTE[1 + (entry - 1 + (frame / 30) as usize) % 14],
            _ => BASE_PALETTE[entry % 16],
        }
    }

    fn render_line(frame: u64, line: u32, out: &mut CoreOutput<'_, u8>) {
        if line == 0 {
            for (entry, colour) in out.palette.iter_mut().take(16).enumerate() {
                *colour = Self::colour(frame, entry);
            }
        }
        for y in rows_for_line(line, out.frame.height()) {
            for x in 0..out.frame.width() {
                out.frame.set(x, y, Self::index(frame, x, y));
            }
        }
    }
}

impl EmulationCore for PaletteCore {
    type Pixel = u8;

    fn emulate(&mut self, cycles: u32, out: &mut CoreOutput<'_, u8>) {
        let frame = self.frame;
        self.clock
            .advance(cycles, |line| Self::render_line(frame, line, out));
    }

    fn step(&mut self, out: &mut CoreOutput<'_, u8>) {
        let frame = self.frame;
        self.clock
            .to_next_line(|line| Self::render_line(frame, line, out));
    }

    fn line(&self) -> u32 {
        self.clock.line
    }

    fn end_of_frame(&mut self, out: &mut CoreOutput<'_, u8>) {
        self.tone.render(self.frame, out);
        self.frame += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_reports_each_finished_line_once() {
        let mut clock = LineClock::default();
        let mut finished = Vec::new();
        clock.advance(2280, |line| finished.push(line));
        assert_eq!(finished, vec![0, 1, 2, 3, 4]);
        assert_eq!(clock.line, 5);

        clock.advance(100, |line| finished.push(line));
        clock.to_next_line(|line| finished.push(line));
        assert_eq!(finished.last(), Some(&5));
        assert_eq!((clock.line, clock.cycle), (6, 0));
    }

    #[test]
    fn line_counter_wraps_after_the_blanking_lines() {
        let mut clock = LineClock::default();
        clock.advance(CYCLES_PER_LINE * TOTAL_LINES, |_| {});
        assert_eq!((clock.line, clock.cycle), (0, 0));
    }

    #[test]
    fn visible_lines_cover_every_row() {
        for height in [GB_HEIGHT, INDEXED_HEIGHT] {
            let mut next = 0;
            for line in 0..TOTAL_LINES {
                let rows = rows_for_line(line, height);
                if !rows.is_empty() {
                    assert_eq!(rows.start, next);
                    next = rows.end;
                }
            }
            assert_eq!(next, height);
        }
    }

    #[test]
    fn sprite_stays_inside_the_frame() {
        for frame in 0..600 {
            assert!(bounce(frame, 2, GB_WIDTH - SPRITE) + SPRITE <= GB_WIDTH);
            assert!(bounce(frame, 3, INDEXED_WIDTH - SPRITE) + SPRITE <= INDEXED_WIDTH);
        }
    }

    #[test]
    fn palette_rotation_keeps_the_sprite_colour() {
        for frame in [0, 30, 450] {
            assert_eq!(PaletteCore::colour(frame, 15), 0xFFFF);
            assert_eq!(PaletteCore::colour(frame, 0), 0x0000);
        }
        assert_ne!(PaletteCore::colour(0, 1), PaletteCore::colour(30, 1));
    }
}
