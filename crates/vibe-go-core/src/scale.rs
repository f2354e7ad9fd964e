//! Fixed-point mapping from emulated resolution to panel resolution.
//!
//! Increments are expressed as source units per destination pixel with the
//! panel dimension as denominator: `x_inc == screen.width` is a 1:1 mapping,
//! `x_inc == screen.width / 2` doubles every source column.

use log::debug;

/// Physical panel geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
}

impl Screen {
    /// 320x240 ILI9341 panel of the handheld.
    pub const ILI9341: Screen = Screen {
        width: 320,
        height: 240,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::ILI9341
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleParams {
    pub screen: Screen,
    pub x_inc: u32,
    pub y_inc: u32,
    pub x_origin: i32,
    pub y_origin: i32,
    pub x_scale: f32,
    pub y_scale: f32,
}

/// Destination rectangle of a source region, relative to the scale origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Accumulator values at the first destination column / row.
    pub x_acc: u32,
    pub y_acc: u32,
}

impl DestRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl ScaleParams {
    /// Unscaled output centred on the panel.
    pub fn identity(screen: Screen, width: usize, height: usize) -> Self {
        Self {
            screen,
            x_inc: screen.width.max(1),
            y_inc: screen.height.max(1),
            x_origin: (screen.width as i32 - width as i32) / 2,
            y_origin: (screen.height as i32 - height as i32) / 2,
            x_scale: 1.0,
            y_scale: 1.0,
        }
    }

    /// Largest output that fits the panel while keeping the pixel `aspect`.
    ///
    /// Increments are rounded to nearest so the output never spills past
    /// the panel edge.
    pub fn fit(screen: Screen, width: usize, height: usize, aspect: f32) -> Self {
        if width == 0 || height == 0 {
            return Self::identity(screen, width, height);
        }

        let buffer_aspect = (width as f32 * aspect) / height as f32;
        let screen_aspect = screen.width as f32 / screen.height as f32;

        let (x_scale, y_scale) = if buffer_aspect < screen_aspect {
            let y_scale = screen.height as f32 / height as f32;
            (y_scale * aspect, y_scale)
        } else {
            let x_scale = screen.width as f32 / width as f32;
            (x_scale, x_scale / aspect)
        };

        let params = Self {
            screen,
            x_inc: ((screen.width as f32 / x_scale).round() as u32).max(1),
            y_inc: ((screen.height as f32 / y_scale).round() as u32).max(1),
            x_origin: ((screen.width as f32 - width as f32 * x_scale) / 2.0) as i32,
            y_origin: ((screen.height as f32 - height as f32 * y_scale) / 2.0) as i32,
            x_scale,
            y_scale,
        };

        debug!(
            "{width}x{height}@{aspect:.3} x_inc:{} y_inc:{} x_scale:{:.3} y_scale:{:.3} x_origin:{} y_origin:{}",
            params.x_inc,
            params.y_inc,
            params.x_scale,
            params.y_scale,
            params.x_origin,
            params.y_origin
        );
        params
    }

    pub fn is_identity(&self) -> bool {
        self.x_inc == self.screen.width && self.y_inc == self.screen.height
    }

    /// Panel pixels a `width` x `rows` source region turns into.
    pub fn transformed_pixels(&self, width: usize, rows: usize) -> u32 {
        ((width as f32 * self.x_scale) * (rows as f32 * self.y_scale)) as u32
    }

    /// Map a source rectangle to the panel.
    ///
    /// Edges are rounded up, so two source regions sharing an edge map to
    /// destination rectangles sharing an edge: no gaps and no overlap.
    pub fn dest_rect(&self, left: usize, top: usize, width: usize, height: usize) -> DestRect {
        let sw = self.screen.width.max(1) as u64;
        let sh = self.screen.height.max(1) as u64;
        let x_inc = self.x_inc as u64;
        let y_inc = self.y_inc as u64;

        let x = (sw * left as u64).div_ceil(x_inc);
        let right = (sw * (left + width) as u64).div_ceil(x_inc);
        let y = (sh * top as u64).div_ceil(y_inc);
        let bottom = (sh * (top + height) as u64).div_ceil(y_inc);

        DestRect {
            x: x as u32,
            y: y as u32,
            width: (right - x) as u32,
            height: (bottom - y) as u32,
            x_acc: ((x_inc * x) % sw) as u32,
            y_acc: ((y_inc * y) % sh) as u32,
        }
    }

    /// Source column for each destination column of `rect`.
    pub fn columns(&self, rect: &DestRect, left: usize) -> Stepper {
        Stepper::new(rect.x_acc, self.x_inc, self.screen.width, left)
    }

    /// Source row for each destination row of `rect`.
    pub fn rows(&self, rect: &DestRect, top: usize) -> Stepper {
        Stepper::new(rect.y_acc, self.y_inc, self.screen.height, top)
    }
}

/// Bresenham-style accumulator walking source indices.
///
/// Each call to `next` yields the source index for the current destination
/// sample, then adds `inc` to the accumulator and advances the source by one
/// for every `denom` the accumulator holds. The iterator never ends; take as
/// many samples as the destination has.
#[derive(Clone, Debug)]
pub struct Stepper {
    acc: u32,
    inc: u32,
    denom: u32,
    index: usize,
}

impl Stepper {
    pub fn new(acc: u32, inc: u32, denom: u32, start: usize) -> Self {
        Self {
            acc,
            inc,
            denom: denom.max(1),
            index: start,
        }
    }
}

impl Iterator for Stepper {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        let index = self.index;
        self.acc += self.inc;
        while self.acc >= self.denom {
            self.acc -= self.denom;
            self.index += 1;
        }
        Some(index)
    }
}
