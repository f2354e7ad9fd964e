//! Per-row change detection between two frames.
//!
//! The engine produces one [`Scanline`] per row describing the smallest
//! contiguous span whose *resolved* colour changed. Progressive diffs are
//! post-processed by [`crate::merge::optimize`]; interlaced diffs only cover
//! the field that was rendered this frame.

use crate::error::ScanError;
use crate::frame::{Frame, Pixel};
use crate::merge;

/// Changed span of one row, optionally valid for `repeat` consecutive rows.
///
/// `width == 0` means the row is unchanged. Before merging `repeat` is always
/// 1; after merging a record at row `y` covers rows `y..y + repeat`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Scanline {
    pub left: u16,
    pub width: u16,
    pub repeat: u16,
}

impl Scanline {
    /// Span covering a whole row of `width` pixels.
    pub const fn full(width: usize) -> Self {
        Self {
            left: 0,
            width: width as u16,
            repeat: 1,
        }
    }

    /// Record for a row with no changed pixels.
    pub const fn unchanged(width: usize) -> Self {
        Self {
            left: width as u16,
            width: 0,
            repeat: 1,
        }
    }

    /// One past the last covered column.
    #[inline]
    pub fn right(&self) -> u16 {
        self.left + self.width
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    /// Whether this span covers every column of `other`.
    pub fn covers(&self, other: &Scanline) -> bool {
        other.is_empty() || (self.left <= other.left && self.right() >= other.right())
    }
}

/// Current and previous palette of a progressive diff.
#[derive(Clone, Copy, Debug)]
pub struct PalettePair<'a> {
    pub current: &'a [u16],
    pub previous: &'a [u16],
}

/// Palettes of an interlaced diff. The shift half of `current` may be
/// rewritten when the palette changed between frames.
#[derive(Debug)]
pub struct InterlacedPalettes<'a> {
    pub current: &'a mut [u16],
    pub previous: &'a [u16],
}

/// Index masks applied at every comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffOptions {
    /// Bits of a stored pixel that select a palette entry.
    pub pixel_mask: u16,
    /// Bit marking a pixel that resolves against the second palette half.
    pub palette_shift_mask: u16,
}

impl DiffOptions {
    pub const fn new(pixel_mask: u16, palette_shift_mask: u16) -> Self {
        Self {
            pixel_mask,
            palette_shift_mask,
        }
    }

    /// Masks for direct-colour frames: every bit is significant.
    pub const fn direct() -> Self {
        Self::new(0xFFFF, 0)
    }

    /// Number of entries one palette half holds.
    #[inline]
    pub fn palette_half(&self) -> usize {
        self.pixel_mask as usize + 1
    }

    /// Entries a palette needs so that every masked index resolves.
    pub fn palette_len(&self) -> usize {
        if self.palette_shift_mask != 0 {
            self.palette_half() * 2
        } else {
            self.palette_half()
        }
    }

    /// Drop palette resolution: with identical palettes, comparing resolved
    /// colours is the same as comparing the raw masked index, shift bit
    /// included.
    fn folded(self) -> Self {
        Self::new(self.pixel_mask | self.palette_shift_mask, 0)
    }
}

/// Whether the first `len` entries of two palettes differ.
pub fn palette_differs(a: &[u16], b: &[u16], len: usize) -> bool {
    let len = len.min(a.len()).min(b.len());
    a[..len] != b[..len]
}

/// Diff `current` against `previous`, then merge adjacent rows into runs.
///
/// `previous == None` requests a full redraw. `out` must hold at least
/// `current.height()` records; only that prefix is written.
pub fn diff<P: Pixel>(
    current: &Frame<P>,
    previous: Option<&Frame<P>>,
    palettes: Option<PalettePair<'_>>,
    options: DiffOptions,
    out: &mut [Scanline],
) -> Result<(), ScanError> {
    diff_rows(current, previous, palettes, options, out)?;
    merge::optimize(&mut out[..current.height()]);
    Ok(())
}

/// Per-row spans without run merging.
pub fn diff_rows<P: Pixel>(
    current: &Frame<P>,
    previous: Option<&Frame<P>>,
    palettes: Option<PalettePair<'_>>,
    options: DiffOptions,
    out: &mut [Scanline],
) -> Result<(), ScanError> {
    check_out(out, current.height())?;
    let Some(previous) = previous else {
        out[..current.height()].fill(Scanline::full(current.width()));
        return Ok(());
    };
    check_geometry(current, previous)?;

    let mut options = options;
    let mut palettes = palettes;
    if let Some(pair) = palettes {
        check_palette(pair.current, options)?;
        check_palette(pair.previous, options)?;
        if !palette_differs(pair.current, pair.previous, options.palette_half()) {
            options = options.folded();
            palettes = None;
        }
    }

    let cmp = Comparator::new(palettes, options);
    for (y, span) in out[..current.height()].iter_mut().enumerate() {
        *span = cmp.span(current.row(y), previous.row(y));
    }
    Ok(())
}

/// Diff only the rows of `field` (0 = even rows, 1 = odd rows).
///
/// Rows of the other field are reported unchanged. Their contents are carried
/// forward from `previous` so the next frame diffs against what is actually
/// on the panel:
///
/// * palette unchanged: the previous buffer is copied over `old_diff`'s span
///   of each untouched row;
/// * palette changed (only checked when a shift mask is set): the shift half
///   of `palettes.current` receives the old colours and every untouched row
///   is copied with the shift bit set, so it keeps resolving to the colours
///   it was drawn with.
#[allow(clippy::too_many_arguments)]
pub fn diff_interlaced<P: Pixel>(
    current: &mut Frame<P>,
    previous: Option<&Frame<P>>,
    palettes: Option<InterlacedPalettes<'_>>,
    options: DiffOptions,
    field: usize,
    out: &mut [Scanline],
    old_diff: &[Scanline],
) -> Result<(), ScanError> {
    if field > 1 {
        return Err(ScanError::InvalidField(field));
    }
    let height = current.height();
    let width = current.width();
    check_out(out, height)?;

    let mut options = options;
    let mut palettes = palettes;
    let mut palette_changed = false;

    if let Some(previous) = previous {
        check_geometry(current, previous)?;
        check_out(old_diff, height)?;

        if let Some(pair) = palettes.as_mut() {
            check_palette(pair.current, options)?;
            check_palette(pair.previous, options)?;
            if options.palette_shift_mask != 0 {
                palette_changed =
                    palette_differs(pair.current, pair.previous, options.palette_half());
            }
            if palette_changed {
                let half = options.palette_half();
                pair.current[half..half * 2].copy_from_slice(&pair.previous[..half]);
            }
        }

        if palette_changed {
            let keep = options.pixel_mask;
            let shift = options.palette_shift_mask;
            for y in ((1 - field)..height).step_by(2) {
                for (dst, src) in current.row_mut(y).iter_mut().zip(previous.row(y)) {
                    *dst = P::from_bits((src.bits() & keep) | shift);
                }
            }
        } else {
            options = options.folded();
            palettes = None;
        }
    }

    let field_rows = (height + 1 - field) / 2;
    match previous {
        None => out[..field_rows].fill(Scanline::full(width)),
        Some(previous) => {
            let pair = palettes.as_ref().map(|p| PalettePair {
                current: &*p.current,
                previous: p.previous,
            });
            let cmp = Comparator::new(pair, options);
            for (k, span) in out[..field_rows].iter_mut().enumerate() {
                let y = field + k * 2;
                *span = cmp.span(current.row(y), previous.row(y));
            }
        }
    }

    for y in (0..height).rev() {
        if (y % 2) ^ field == 1 {
            out[y] = Scanline::unchanged(width);
            if let (false, Some(previous)) = (palette_changed, previous) {
                let span = old_diff[y];
                let left = (span.left as usize).min(width);
                let right = (span.right() as usize).min(width);
                current.row_mut(y)[left..right].copy_from_slice(&previous.row(y)[left..right]);
            }
        } else {
            out[y] = out[y / 2];
        }
    }
    Ok(())
}

/// Pixels a diff asks to redraw: `sum(width * repeat)` over its runs.
pub fn diff_count(diff: &[Scanline]) -> usize {
    let mut pixels = 0;
    let mut y = 0;
    while y < diff.len() {
        let span = diff[y];
        pixels += span.width as usize * span.repeat as usize;
        y += span.repeat.max(1) as usize;
    }
    pixels
}

struct Comparator<'a> {
    palettes: Option<PalettePair<'a>>,
    mask: u16,
    shift: u16,
    half: usize,
}

impl<'a> Comparator<'a> {
    fn new(palettes: Option<PalettePair<'a>>, options: DiffOptions) -> Self {
        Self {
            palettes,
            mask: options.pixel_mask,
            shift: options.palette_shift_mask,
            half: options.palette_half(),
        }
    }

    #[inline]
    fn resolve(&self, raw: u16) -> usize {
        let mut index = (raw & self.mask) as usize;
        if self.shift != 0 && raw & self.shift != 0 {
            index += self.half;
        }
        index
    }

    #[inline]
    fn differs(&self, a: u16, b: u16) -> bool {
        match self.palettes {
            None => a & self.mask != b & self.mask,
            Some(pair) => pair.current[self.resolve(a)] != pair.previous[self.resolve(b)],
        }
    }

    fn span<P: Pixel>(&self, current: &[P], previous: &[P]) -> Scanline {
        let width = current.len();
        let differs = |(a, b): (&P, &P)| self.differs(a.bits(), b.bits());

        let Some(left) = current.iter().zip(previous).position(differs) else {
            return Scanline::unchanged(width);
        };
        let right = current
            .iter()
            .zip(previous)
            .rposition(differs)
            .unwrap_or(left);

        Scanline {
            left: left as u16,
            width: (right - left + 1) as u16,
            repeat: 1,
        }
    }
}

fn check_out(out: &[Scanline], height: usize) -> Result<(), ScanError> {
    if out.len() < height {
        return Err(ScanError::DiffTooShort {
            len: out.len(),
            height,
        });
    }
    Ok(())
}

fn check_geometry<P: Pixel>(current: &Frame<P>, previous: &Frame<P>) -> Result<(), ScanError> {
    if current.width() != previous.width() || current.height() != previous.height() {
        return Err(ScanError::GeometryMismatch {
            current_w: current.width(),
            current_h: current.height(),
            previous_w: previous.width(),
            previous_h: previous.height(),
        });
    }
    Ok(())
}

fn check_palette(palette: &[u16], options: DiffOptions) -> Result<(), ScanError> {
    let needed = options.palette_len();
    if palette.len() < needed {
        return Err(ScanError::PaletteTooShort {
            needed,
            len: palette.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: usize, height: usize) -> Frame<u8> {
        Frame::new(width, height).unwrap()
    }

    #[test]
    fn direct_compare_is_exact_to_the_pixel() {
        let old = frame(16, 1);
        let mut cur = old.clone();
        cur.set(5, 0, 1);
        cur.set(9, 0, 1);

        let mut out = [Scanline::default(); 1];
        diff_rows(&cur, Some(&old), None, DiffOptions::new(0xFF, 0), &mut out).unwrap();
        assert_eq!(out[0], Scanline { left: 5, width: 5, repeat: 1 });
    }

    #[test]
    fn masked_bits_are_ignored() {
        let old = frame(8, 1);
        let mut cur = old.clone();
        cur.set(3, 0, 0x80);

        let mut out = [Scanline::default(); 1];
        diff_rows(&cur, Some(&old), None, DiffOptions::new(0x3F, 0), &mut out).unwrap();
        assert!(out[0].is_empty());
    }

    #[test]
    fn palette_change_marks_pixels_using_changed_entry() {
        let mut old = frame(8, 1);
        old.set(2, 0, 1);
        old.set(6, 0, 1);
        let cur = old.clone();

        let old_palette = [0x0000, 0x1111, 0x2222, 0x3333];
        let mut new_palette = old_palette;
        new_palette[1] = 0xFFFF;

        let mut out = [Scanline::default(); 1];
        let pair = PalettePair {
            current: &new_palette,
            previous: &old_palette,
        };
        diff_rows(&cur, Some(&old), Some(pair), DiffOptions::new(0x03, 0), &mut out).unwrap();
        assert_eq!(out[0], Scanline { left: 2, width: 5, repeat: 1 });
    }

    #[test]
    fn different_indices_with_equal_colours_are_unchanged() {
        let old = frame(4, 1);
        let mut cur = old.clone();
        cur.set(1, 0, 2);

        // Entry 0 and entry 2 resolve to the same colour, but the palettes
        // differ elsewhere so the palette path is taken.
        let old_palette = [0x1234, 0x0000, 0x1234, 0x0000];
        let new_palette = [0x1234, 0x0000, 0x1234, 0x5555];
        let pair = PalettePair {
            current: &new_palette,
            previous: &old_palette,
        };

        let mut out = [Scanline::default(); 1];
        diff_rows(&cur, Some(&old), Some(pair), DiffOptions::new(0x03, 0), &mut out).unwrap();
        assert!(out[0].is_empty());
    }

    #[test]
    fn identical_palettes_fold_shift_bit_into_mask() {
        let old = frame(4, 1);
        let mut cur = old.clone();
        cur.set(0, 0, 0x40);

        let palette = [0u16; 8];
        let pair = PalettePair {
            current: &palette,
            previous: &palette,
        };
        let mut out = [Scanline::default(); 1];
        diff_rows(&cur, Some(&old), Some(pair), DiffOptions::new(0x03, 0x40), &mut out).unwrap();
        // All entries are equal, but the raw index changed once the shift
        // bit is part of the mask.
        assert_eq!(out[0], Scanline { left: 0, width: 1, repeat: 1 });
    }

    #[test]
    fn short_palette_is_rejected() {
        let old = frame(4, 1);
        let cur = old.clone();
        let palette = [0u16; 4];
        let pair = PalettePair {
            current: &palette,
            previous: &palette,
        };
        let mut out = [Scanline::default(); 1];
        let err = diff_rows(&cur, Some(&old), Some(pair), DiffOptions::new(0x0F, 0), &mut out)
            .unwrap_err();
        assert_eq!(err, ScanError::PaletteTooShort { needed: 16, len: 4 });
    }

    #[test]
    fn geometry_mismatch_is_rejected() {
        let old = frame(4, 2);
        let cur = frame(4, 3);
        let mut out = [Scanline::default(); 3];
        assert!(matches!(
            diff_rows(&cur, Some(&old), None, DiffOptions::direct(), &mut out),
            Err(ScanError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn diff_count_steps_by_repeat() {
        let diff = [
            Scanline { left: 0, width: 4, repeat: 2 },
            Scanline { left: 1, width: 2, repeat: 1 },
            Scanline { left: 0, width: 3, repeat: 1 },
        ];
        assert_eq!(diff_count(&diff), 4 * 2 + 3);
    }

    #[test]
    fn interlaced_rejects_bad_field() {
        let mut cur = frame(4, 4);
        let mut out = [Scanline::default(); 4];
        assert_eq!(
            diff_interlaced(&mut cur, None, None, DiffOptions::direct(), 2, &mut out, &[]),
            Err(ScanError::InvalidField(2))
        );
    }
}
