//! Frame transfer to the panel over an exclusively owned [`DisplayBus`].
//!
//! Small runs go out first in [`TransferMode::Polling`], large runs after in
//! [`TransferMode::Interrupt`], so the expensive interrupt setup is only paid
//! where it is amortised over many pixels.

use std::sync::Mutex;

use crate::bus::{BusSession, DisplayBus, TransferMode};
use crate::error::{BusError, DispatchError};
use crate::expand::{self, BLOCK_ROWS, EXPANDED_HEIGHT, EXPANDED_LEFT, EXPANDED_WIDTH};
use crate::frame::{Frame, GB_HEIGHT, GB_WIDTH, Pixel};
use crate::merge;
use crate::scale::{ScaleParams, Screen};
use crate::scanline::{DiffOptions, Scanline};

#[cfg(feature = "dispatch-trace")]
macro_rules! dispatch_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "dispatch-trace"))]
macro_rules! dispatch_trace {
    ($($arg:tt)*) => {};
}

/// Panel lines the line buffer holds by default.
pub const DEFAULT_LINE_COUNT: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub screen: Screen,
    /// Panel rows one `continue_line` may carry at full screen width.
    pub line_count: u32,
    /// Runs transforming to fewer panel pixels than this are polled.
    pub polling_threshold: u32,
}

impl DispatchConfig {
    pub fn new(screen: Screen, line_count: u32) -> Self {
        let line_count = line_count.max(1);
        Self {
            screen,
            line_count,
            polling_threshold: screen.width * line_count,
        }
    }

    /// Entries of the line buffer shared by every transfer.
    pub fn line_buffer_len(&self) -> usize {
        (self.screen.width as usize * self.line_count as usize)
            .max(EXPANDED_WIDTH * BLOCK_ROWS)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new(Screen::ILI9341, DEFAULT_LINE_COUNT)
    }
}

/// What one dispatch pushed to the bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Source pixels covered by the transferred runs.
    pub pixels: usize,
    /// Rectangles opened on the bus.
    pub rects: usize,
    pub polled: usize,
    pub interrupt: usize,
}

/// Source pixel to RGB565, masking the index before every palette lookup.
struct Resolver<'a> {
    palette: Option<&'a [u16]>,
    mask: u16,
    shift: u16,
    half: usize,
}

impl<'a> Resolver<'a> {
    fn new(palette: Option<&'a [u16]>, options: DiffOptions) -> Self {
        Self {
            palette,
            mask: options.pixel_mask,
            shift: options.palette_shift_mask,
            half: options.palette_half(),
        }
    }

    #[inline]
    fn colour(&self, raw: u16) -> u16 {
        let Some(palette) = self.palette else {
            return raw;
        };
        let mut index = (raw & self.mask) as usize;
        if self.shift != 0 && raw & self.shift != 0 {
            index += self.half;
        }
        palette.get(index).copied().unwrap_or(0)
    }
}

pub struct Dispatcher {
    config: DispatchConfig,
    line: Vec<u16>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            line: vec![0; config.line_buffer_len()],
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Transfer the runs of `diff` (or the whole frame when `diff` is `None`).
    ///
    /// `palette` is required for indexed frames and ignored when `None`,
    /// in which case the raw pixel bits are sent as colours.
    pub fn write_frame<B: DisplayBus, P: Pixel>(
        &mut self,
        bus: &Mutex<B>,
        frame: &Frame<P>,
        diff: Option<&[Scanline]>,
        palette: Option<&[u16]>,
        options: DiffOptions,
        scale: &ScaleParams,
    ) -> Result<DispatchStats, DispatchError> {
        let mut session = BusSession::open(bus)?;
        let resolver = Resolver::new(palette, options);
        let threshold = self.config.polling_threshold;
        let mut stats = DispatchStats::default();
        let mut need_interrupt = false;

        session.set_transfer_mode(TransferMode::Polling);
        for (top, run) in frame_runs(frame, diff) {
            if run.is_empty() {
                continue;
            }
            stats.pixels += run.width as usize * run.repeat as usize;

            let n_pixels = scale.transformed_pixels(run.width as usize, run.repeat as usize);
            if n_pixels < threshold {
                if self.write_rect(&mut session, frame, &resolver, scale, top, run)? {
                    stats.rects += 1;
                    stats.polled += 1;
                }
            } else {
                need_interrupt = true;
            }
        }
        session.set_transfer_mode(TransferMode::Interrupt);

        if need_interrupt {
            for (top, run) in frame_runs(frame, diff) {
                if run.is_empty() {
                    continue;
                }
                let n_pixels = scale.transformed_pixels(run.width as usize, run.repeat as usize);
                if n_pixels >= threshold
                    && self.write_rect(&mut session, frame, &resolver, scale, top, run)?
                {
                    stats.rects += 1;
                    stats.interrupt += 1;
                }
            }
        }

        dispatch_trace!(
            "frame {}x{}: {} px in {} rects ({} polled)",
            frame.width(),
            frame.height(),
            stats.pixels,
            stats.rects,
            stats.polled
        );
        Ok(stats)
    }

    /// Returns `false` when the run maps to an empty panel rectangle.
    fn write_rect<B: DisplayBus, P: Pixel>(
        &mut self,
        bus: &mut BusSession<'_, B>,
        frame: &Frame<P>,
        resolver: &Resolver<'_>,
        scale: &ScaleParams,
        top: usize,
        run: Scanline,
    ) -> Result<bool, DispatchError> {
        let left = run.left as usize;
        let rect = scale.dest_rect(left, top, run.width as usize, run.repeat as usize);
        if rect.is_empty() {
            return Ok(false);
        }

        let x = panel_coord(scale.x_origin, rect.x);
        let y = panel_coord(scale.y_origin, rect.y);
        let (Some(x), Some(y)) = (x, y) else {
            return Err(BusError::OutOfBounds {
                x: rect.x,
                y: rect.y,
                w: rect.width,
                h: rect.height,
            }
            .into());
        };

        dispatch_trace!(
            "rect src ({left},{top}) {}x{} -> ({x},{y}) {}x{}",
            run.width,
            run.repeat,
            rect.width,
            rect.height
        );
        bus.begin_rectangle(x, y, rect.width, rect.height)?;

        let width = rect.width as usize;
        if self.line.len() < width {
            self.line.resize(width, 0);
        }
        let lines_per_chunk = (self.line.len() / width).max(1);
        let last_row = frame.height().saturating_sub(1);

        let mut lines = 0;
        for src_y in scale.rows(&rect, top).take(rect.height as usize) {
            let row = frame.row(src_y.min(last_row));
            let dst = &mut self.line[lines * width..(lines + 1) * width];
            for (out, src_x) in dst.iter_mut().zip(scale.columns(&rect, left)) {
                *out = row
                    .get(src_x)
                    .map_or(0, |&p| resolver.colour(p.bits()));
            }

            lines += 1;
            if lines == lines_per_chunk {
                bus.continue_line(&self.line[..lines * width], rect.width, lines as u32)?;
                lines = 0;
            }
        }
        if lines > 0 {
            bus.continue_line(&self.line[..lines * width], rect.width, lines as u32)?;
        }
        Ok(true)
    }

    /// Draw a 160x144 direct-colour frame expanded 3:5 to 265x240.
    pub fn write_expanded<B: DisplayBus, P: Pixel>(
        &mut self,
        bus: &Mutex<B>,
        frame: &Frame<P>,
    ) -> Result<DispatchStats, DispatchError> {
        if frame.width() != GB_WIDTH || frame.height() != GB_HEIGHT {
            return Err(DispatchError::UnsupportedGeometry {
                w: frame.width(),
                h: frame.height(),
                expected_w: GB_WIDTH,
                expected_h: GB_HEIGHT,
            });
        }

        let mut session = BusSession::open(bus)?;
        session.set_transfer_mode(TransferMode::Interrupt);
        session.begin_rectangle(
            EXPANDED_LEFT,
            0,
            EXPANDED_WIDTH as u32,
            EXPANDED_HEIGHT as u32,
        )?;

        let block = BLOCK_ROWS * EXPANDED_WIDTH;
        for top in (0..GB_HEIGHT).step_by(3) {
            expand::expand_block(frame, top, &mut self.line[..block]);
            session.continue_line(
                &self.line[..block],
                EXPANDED_WIDTH as u32,
                BLOCK_ROWS as u32,
            )?;
        }

        Ok(DispatchStats {
            pixels: EXPANDED_WIDTH * EXPANDED_HEIGHT,
            rects: 1,
            polled: 0,
            interrupt: 1,
        })
    }

    /// Fill the whole panel with black.
    pub fn clear<B: DisplayBus>(&mut self, bus: &Mutex<B>) -> Result<(), DispatchError> {
        let Screen { width, height } = self.config.screen;
        if width == 0 || height == 0 {
            return Ok(());
        }

        let mut session = BusSession::open(bus)?;
        session.set_transfer_mode(TransferMode::Interrupt);
        session.begin_rectangle(0, 0, width, height)?;

        let lines_per_chunk = (self.line.len() / width as usize).max(1) as u32;
        if self.line.len() < width as usize {
            self.line.resize(width as usize, 0);
        }
        self.line.fill(0);

        let mut y = 0;
        while y < height {
            let lines = lines_per_chunk.min(height - y);
            let len = (lines * width) as usize;
            session.continue_line(&self.line[..len], width, lines)?;
            y += lines;
        }
        Ok(())
    }
}

fn panel_coord(origin: i32, offset: u32) -> Option<u32> {
    u32::try_from(origin as i64 + offset as i64).ok()
}

/// Runs of a diff, or a single run covering the frame when there is none.
fn frame_runs<'a, P: Pixel>(
    frame: &Frame<P>,
    diff: Option<&'a [Scanline]>,
) -> Box<dyn Iterator<Item = (usize, Scanline)> + 'a> {
    let width = frame.width();
    match diff {
        Some(diff) => Box::new(merge::runs(&diff[..diff.len().min(frame.height())], width)),
        None => Box::new(std::iter::once((
            0,
            Scanline {
                left: 0,
                width: width as u16,
                repeat: frame.height() as u16,
            },
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Mode(TransferMode),
        Rect(u32, u32, u32, u32),
        Lines(Vec<u16>, u32, u32),
    }

    #[derive(Default)]
    struct RecordingBus {
        ops: Vec<Op>,
        released: usize,
    }

    impl DisplayBus for RecordingBus {
        fn release(&mut self) {
            self.released += 1;
        }

        fn set_transfer_mode(&mut self, mode: TransferMode) {
            self.ops.push(Op::Mode(mode));
        }

        fn begin_rectangle(&mut self, x: u32, y: u32, w: u32, h: u32) -> Result<(), BusError> {
            self.ops.push(Op::Rect(x, y, w, h));
            Ok(())
        }

        fn continue_line(&mut self, line: &[u16], width: u32, count: u32) -> Result<(), BusError> {
            self.ops.push(Op::Lines(line.to_vec(), width, count));
            Ok(())
        }
    }

    fn rects(bus: &Mutex<RecordingBus>) -> Vec<(u32, u32, u32, u32)> {
        bus.lock()
            .unwrap()
            .ops
            .iter()
            .filter_map(|op| match *op {
                Op::Rect(x, y, w, h) => Some((x, y, w, h)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn small_runs_are_polled_before_large_runs() {
        let screen = Screen::new(32, 8);
        let mut dispatcher = Dispatcher::new(DispatchConfig::new(screen, 1));
        let bus = Mutex::new(RecordingBus::default());
        let frame = Frame::<u16>::new(32, 8).unwrap();
        let scale = ScaleParams::identity(screen, 32, 8);

        let mut diff = [Scanline::unchanged(32); 8];
        diff[0] = Scanline { left: 0, width: 32, repeat: 2 };
        diff[5] = Scanline { left: 4, width: 2, repeat: 1 };

        let stats = dispatcher
            .write_frame(&bus, &frame, Some(&diff), None, DiffOptions::direct(), &scale)
            .unwrap();

        assert_eq!(stats.pixels, 64 + 2);
        assert_eq!((stats.polled, stats.interrupt), (1, 1));
        assert_eq!(rects(&bus), vec![(4, 5, 2, 1), (0, 0, 32, 2)]);

        let bus = bus.lock().unwrap();
        assert_eq!(bus.ops[0], Op::Mode(TransferMode::Polling));
        assert_eq!(bus.released, 1);
    }

    #[test]
    fn lines_are_chunked_to_the_line_buffer() {
        let screen = Screen::new(8, 8);
        let mut config = DispatchConfig::new(screen, 2);
        config.polling_threshold = 0;
        let mut dispatcher = Dispatcher::new(config);
        dispatcher.line.truncate(16);

        let bus = Mutex::new(RecordingBus::default());
        let frame = Frame::<u16>::new(8, 8).unwrap();
        let scale = ScaleParams::identity(screen, 8, 8);
        dispatcher
            .write_frame(&bus, &frame, None, None, DiffOptions::direct(), &scale)
            .unwrap();

        let counts: Vec<u32> = bus
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Lines(_, _, n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![2, 2, 2, 2]);
    }

    #[test]
    fn palette_lookups_mask_the_index() {
        let screen = Screen::new(4, 1);
        let mut dispatcher = Dispatcher::new(DispatchConfig::new(screen, 1));
        let bus = Mutex::new(RecordingBus::default());
        let mut frame = Frame::<u8>::new(4, 1).unwrap();
        frame.row_mut(0).copy_from_slice(&[0, 1, 0x82, 0x43]);
        let palette = [0x0000, 0x1111, 0x2222, 0x3333, 0x4444, 0x5555, 0x6666, 0x7777];

        dispatcher
            .write_frame(
                &bus,
                &frame,
                None,
                Some(&palette),
                DiffOptions::new(0x03, 0x40),
                &ScaleParams::identity(screen, 4, 1),
            )
            .unwrap();

        let bus = bus.lock().unwrap();
        let line = bus.ops.iter().find_map(|op| match op {
            Op::Lines(line, _, _) => Some(line.clone()),
            _ => None,
        });
        assert_eq!(line, Some(vec![0x0000, 0x1111, 0x2222, 0x7777]));
    }

    #[test]
    fn doubled_scale_repeats_source_pixels() {
        let screen = Screen::new(8, 4);
        let mut dispatcher = Dispatcher::new(DispatchConfig::new(screen, 4));
        let bus = Mutex::new(RecordingBus::default());
        let mut frame = Frame::<u16>::new(4, 2).unwrap();
        frame.row_mut(0).copy_from_slice(&[1, 2, 3, 4]);
        frame.row_mut(1).copy_from_slice(&[5, 6, 7, 8]);
        let scale = ScaleParams::fit(screen, 4, 2, 1.0);

        dispatcher
            .write_frame(&bus, &frame, None, None, DiffOptions::direct(), &scale)
            .unwrap();

        let bus = bus.lock().unwrap();
        assert!(bus.ops.contains(&Op::Rect(0, 0, 8, 4)));
        let line = bus.ops.iter().find_map(|op| match op {
            Op::Lines(line, 8, 4) => Some(line.clone()),
            _ => None,
        });
        let expected: Vec<u16> = [1, 1, 2, 2, 3, 3, 4, 4]
            .repeat(2)
            .into_iter()
            .chain([5, 5, 6, 6, 7, 7, 8, 8].repeat(2))
            .collect();
        assert_eq!(line, Some(expected));
    }

    #[test]
    fn clear_covers_the_whole_panel() {
        let mut dispatcher = Dispatcher::new(DispatchConfig::default());
        let bus = Mutex::new(RecordingBus::default());
        dispatcher.clear(&bus).unwrap();

        let bus = bus.lock().unwrap();
        assert!(bus.ops.contains(&Op::Rect(0, 0, 320, 240)));
        let rows: u32 = bus
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Lines(line, 320, n) => {
                    assert!(line.iter().all(|&p| p == 0));
                    Some(*n)
                }
                _ => None,
            })
            .sum();
        assert_eq!(rows, 240);
    }

    #[test]
    fn expanded_output_needs_native_geometry() {
        let mut dispatcher = Dispatcher::new(DispatchConfig::default());
        let bus = Mutex::new(RecordingBus::default());
        let frame = Frame::<u16>::new(100, 100).unwrap();
        assert!(matches!(
            dispatcher.write_expanded(&bus, &frame),
            Err(DispatchError::UnsupportedGeometry { .. })
        ));
    }

    #[test]
    fn expanded_output_sends_48_blocks() {
        let mut dispatcher = Dispatcher::new(DispatchConfig::default());
        let bus = Mutex::new(RecordingBus::default());
        let frame = Frame::<u16>::new(GB_WIDTH, GB_HEIGHT).unwrap();
        dispatcher.write_expanded(&bus, &frame).unwrap();

        let bus = bus.lock().unwrap();
        assert!(bus.ops.contains(&Op::Rect(26, 0, 265, 240)));
        let blocks = bus
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Lines(_, 265, 5)))
            .count();
        assert_eq!(blocks, 48);
    }
}
