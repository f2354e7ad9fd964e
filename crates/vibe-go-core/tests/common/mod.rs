#![allow(dead_code)]

use vibe_go_core::{BusError, DisplayBus, Frame, TransferMode};

struct OpenRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    written: u32,
}

/// Display bus that paints into an in-memory panel and records every
/// transaction.
pub struct PaintBus {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u16>,
    pub rects: Vec<(u32, u32, u32, u32, TransferMode)>,
    pub pixels_written: usize,
    pub sessions: usize,
    pub idle: bool,
    mode: TransferMode,
    open: Option<OpenRect>,
}

impl PaintBus {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
            rects: Vec::new(),
            pixels_written: 0,
            sessions: 0,
            idle: false,
            mode: TransferMode::default(),
            open: None,
        }
    }

    pub fn ili9341() -> Self {
        Self::new(320, 240)
    }

    pub fn pixel(&self, x: u32, y: u32) -> u16 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Panel region at (`x`, `y`) as a frame of `width` x `height`.
    pub fn region(&self, x: u32, y: u32, width: usize, height: usize) -> Frame<u16> {
        let mut frame = Frame::new(width, height).unwrap();
        for row in 0..height {
            for col in 0..width {
                frame.set(col, row, self.pixel(x + col as u32, y + row as u32));
            }
        }
        frame
    }
}

impl DisplayBus for PaintBus {
    fn acquire(&mut self) {
        self.sessions += 1;
    }

    fn set_transfer_mode(&mut self, mode: TransferMode) {
        self.mode = mode;
    }

    fn begin_rectangle(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), BusError> {
        if x + width > self.width || y + height > self.height {
            return Err(BusError::OutOfBounds {
                x,
                y,
                w: width,
                h: height,
            });
        }
        self.rects.push((x, y, width, height, self.mode));
        self.open = Some(OpenRect {
            x,
            y,
            width,
            height,
            written: 0,
        });
        Ok(())
    }

    fn continue_line(&mut self, line: &[u16], width: u32, line_count: u32) -> Result<(), BusError> {
        let rect = self.open.as_mut().ok_or(BusError::NoRectangle)?;
        assert_eq!(width, rect.width, "line width differs from the open rectangle");

        for &colour in &line[..(width * line_count) as usize] {
            if rect.written >= rect.width * rect.height {
                return Err(BusError::Transfer("rectangle overrun".into()));
            }
            let px = rect.x + rect.written % rect.width;
            let py = rect.y + rect.written / rect.width;
            self.pixels[(py * self.width + px) as usize] = colour;
            rect.written += 1;
            self.pixels_written += 1;
        }
        Ok(())
    }

    fn show_idle(&mut self) {
        self.idle = true;
    }
}

/// Deterministic pseudo-random bytes for frame contents.
pub struct Lcg(u32);

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self(seed)
    }

    pub fn next_u8(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.0 >> 24) as u8
    }

    pub fn below(&mut self, bound: usize) -> usize {
        self.next_u8() as usize * bound / 256
    }
}
