use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::trace;
use vibe_go_core::bus::{DisplayBus, TransferMode};
use vibe_go_core::error::BusError;
use vibe_go_core::scale::Screen;

use crate::HostError;

/// Transaction counters of a [`VirtualPanel`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PanelStats {
    pub sessions: u64,
    pub rects: u64,
    pub polled_rects: u64,
    pub pixels: u64,
}

#[derive(Clone, Copy, Debug)]
struct OpenRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    /// Pixels already written into the rectangle.
    filled: u64,
}

/// In-memory RGB565 panel standing in for the SPI display.
///
/// Pixels are stored the way the controller receives them, row-major from
/// the top-left corner. A rectangle is filled sequentially by
/// `continue_line` and closes once its last pixel arrives.
#[derive(Debug, Clone)]
pub struct VirtualPanel {
    screen: Screen,
    pixels: Vec<u16>,
    mode: TransferMode,
    open: Option<OpenRect>,
    stats: PanelStats,
    idle: bool,
}

const HOURGLASS: [&str; 12] = [
    "##########",
    "#........#",
    ".#......#.",
    "..#....#..",
    "...#..#...",
    "....##....",
    "....##....",
    "...#..#...",
    "..#.##.#..",
    ".#.####.#.",
    "#.######.#",
    "##########",
];
const HOURGLASS_ZOOM: u32 = 3;

impl VirtualPanel {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            pixels: vec![0; screen.pixels()],
            mode: TransferMode::default(),
            open: None,
            stats: PanelStats::default(),
            idle: false,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn stats(&self) -> PanelStats {
        self.stats
    }

    pub fn pixel(&self, x: u32, y: u32) -> u16 {
        self.pixels[(y * self.screen.width + x) as usize]
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Whether the idle indicator is up.
    pub fn is_idle(&self) -> bool {
        self.idle
    }

    /// Panel contents expanded to 8-bit RGB.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 3);
        for &px in &self.pixels {
            let r = (px >> 11) & 0x1F;
            let g = (px >> 5) & 0x3F;
            let b = px & 0x1F;
            out.push(((r << 3) | (r >> 2)) as u8);
            out.push(((g << 2) | (g >> 4)) as u8);
            out.push(((b << 3) | (b >> 2)) as u8);
        }
        out
    }

    pub fn write_png(&self, path: &Path) -> Result<(), HostError> {
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = png::Encoder::new(file, self.screen.width, self.screen.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.to_rgb())?;
        writer.finish()?;
        Ok(())
    }

    fn draw_hourglass(&mut self) {
        let w = HOURGLASS[0].len() as u32 * HOURGLASS_ZOOM;
        let h = HOURGLASS.len() as u32 * HOURGLASS_ZOOM;
        if w > self.screen.width || h > self.screen.height {
            return;
        }
        let left = (self.screen.width - w) / 2;
        let top = (self.screen.height - h) / 2;
        for y in 0..h {
            let row = HOURGLASS[(y / HOURGLASS_ZOOM) as usize].as_bytes();
            for x in 0..w {
                let colour = if row[(x / HOURGLASS_ZOOM) as usize] == b'#' {
                    0xFFFF
                } else {
                    0x0000
                };
                self.pixels[((top + y) * self.screen.width + left + x) as usize] = colour;
            }
        }
    }
}

impl DisplayBus for VirtualPanel {
    fn acquire(&mut self) {
        self.stats.sessions += 1;
        self.idle = false;
    }

    fn release(&mut self) {
        self.open = None;
    }

    fn set_transfer_mode(&mut self, mode: TransferMode) {
        self.mode = mode;
    }

    fn begin_rectangle(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), BusError> {
        let fits = x.checked_add(width).is_some_and(|r| r <= self.screen.width)
            && y.checked_add(height).is_some_and(|b| b <= self.screen.height);
        if !fits {
            return Err(BusError::OutOfBounds {
                x,
                y,
                w: width,
                h: height,
            });
        }
        trace!("rect {width}x{height} at ({x},{y}) {:?}", self.mode);

        self.stats.rects += 1;
        if self.mode == TransferMode::Polling {
            self.stats.polled_rects += 1;
        }
        self.open = (width > 0 && height > 0).then_some(OpenRect {
            x,
            y,
            width,
            height,
            filled: 0,
        });
        Ok(())
    }

    fn continue_line(&mut self, line: &[u16], width: u32, line_count: u32) -> Result<(), BusError> {
        let count = width as usize * line_count as usize;
        let Some(data) = line.get(..count) else {
            return Err(BusError::Transfer(format!(
                "{} pixels supplied for {width}x{line_count}",
                line.len()
            )));
        };
        let mut rect = self.open.ok_or(BusError::NoRectangle)?;
        let area = rect.width as u64 * rect.height as u64;
        if rect.filled + count as u64 > area {
            return Err(BusError::Transfer(format!(
                "{} pixels overrun the {}x{} rectangle",
                rect.filled + count as u64 - area,
                rect.width,
                rect.height
            )));
        }

        for &px in data {
            let col = rect.x + (rect.filled % rect.width as u64) as u32;
            let row = rect.y + (rect.filled / rect.width as u64) as u32;
            self.pixels[(row * self.screen.width + col) as usize] = px;
            rect.filled += 1;
        }
        self.stats.pixels += count as u64;
        self.open = (rect.filled < area).then_some(rect);
        Ok(())
    }

    fn show_idle(&mut self) {
        self.draw_hourglass();
        self.idle = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_fill_the_rectangle_row_by_row() {
        let mut panel = VirtualPanel::new(Screen::new(8, 4));
        panel.begin_rectangle(2, 1, 3, 2).unwrap();
        panel.continue_line(&[1, 2, 3], 3, 1).unwrap();
        panel.continue_line(&[4, 5, 6, 99], 3, 1).unwrap();

        assert_eq!(panel.pixel(2, 1), 1);
        assert_eq!(panel.pixel(4, 1), 3);
        assert_eq!(panel.pixel(2, 2), 4);
        assert_eq!(panel.pixel(4, 2), 6);
        assert_eq!(panel.pixel(5, 2), 0);
        assert_eq!(panel.stats().pixels, 6);
        assert_eq!(
            panel.continue_line(&[7], 1, 1),
            Err(BusError::NoRectangle)
        );
    }

    #[test]
    fn rectangles_past_the_edge_are_rejected() {
        let mut panel = VirtualPanel::new(Screen::ILI9341);
        assert!(panel.begin_rectangle(300, 0, 21, 1).is_err());
        assert!(panel.begin_rectangle(0, 239, 1, 2).is_err());
        assert!(panel.begin_rectangle(u32::MAX, 0, 2, 1).is_err());
        assert!(panel.begin_rectangle(0, 0, 320, 240).is_ok());
    }

    #[test]
    fn overrun_is_an_error() {
        let mut panel = VirtualPanel::new(Screen::new(4, 4));
        panel.begin_rectangle(0, 0, 2, 2).unwrap();
        assert!(panel.continue_line(&[0; 6], 2, 3).is_err());
    }

    #[test]
    fn polled_rectangles_are_counted() {
        let mut panel = VirtualPanel::new(Screen::ILI9341);
        panel.acquire();
        panel.set_transfer_mode(TransferMode::Polling);
        panel.begin_rectangle(0, 0, 1, 1).unwrap();
        panel.set_transfer_mode(TransferMode::Interrupt);
        panel.begin_rectangle(0, 0, 1, 1).unwrap();
        panel.release();

        let stats = panel.stats();
        assert_eq!((stats.sessions, stats.rects, stats.polled_rects), (1, 2, 1));
    }

    #[test]
    fn rgb_expansion_reaches_full_scale() {
        let mut panel = VirtualPanel::new(Screen::new(2, 1));
        panel.begin_rectangle(0, 0, 2, 1).unwrap();
        panel.continue_line(&[0xFFFF, 0xF800], 2, 1).unwrap();
        assert_eq!(panel.to_rgb(), vec![255, 255, 255, 255, 0, 0]);
    }

    #[test]
    fn idle_indicator_is_centred() {
        let mut panel = VirtualPanel::new(Screen::ILI9341);
        panel.show_idle();
        assert!(panel.is_idle());
        // Top-left corner of the 30x36 glyph.
        assert_eq!(panel.pixel(145, 102), 0xFFFF);
        assert_eq!(panel.pixel(0, 0), 0x0000);
    }
}
