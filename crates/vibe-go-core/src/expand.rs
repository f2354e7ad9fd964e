//! Fixed 3:5 expansion of the native 160x144 LCD to 265x240.
//!
//! Every three source columns become `a, a|b, b, b|c, c` and every three
//! source rows become `r0, r0|r1, r1, r1|r2, r2`, where `|` is a per-channel
//! RGB565 average. 53 column groups fit the output, so the last source
//! column is not shown.

use crate::frame::{Frame, GB_HEIGHT, GB_WIDTH, Pixel};

pub const EXPANDED_WIDTH: usize = 265;
pub const EXPANDED_HEIGHT: usize = 240;
/// Panel column of the first expanded pixel.
pub const EXPANDED_LEFT: u32 = 26;
/// Output rows produced by one block of three source rows.
pub const BLOCK_ROWS: usize = 5;

const GROUPS: usize = EXPANDED_WIDTH / 5;

/// Average two RGB565 colours channel by channel.
#[inline]
pub fn blend565(a: u16, b: u16) -> u16 {
    let r = (((a >> 11) & 0x1F) + ((b >> 11) & 0x1F)) >> 1;
    let g = (((a >> 5) & 0x3F) + ((b >> 5) & 0x3F)) >> 1;
    let bl = ((a & 0x1F) + (b & 0x1F)) >> 1;
    (r << 11) | (g << 5) | bl
}

fn expand_row<P: Pixel>(src: &[P], out: &mut [u16]) {
    for (group, dst) in src
        .chunks_exact(3)
        .zip(out.chunks_exact_mut(5))
        .take(GROUPS)
    {
        let (a, b, c) = (group[0].bits(), group[1].bits(), group[2].bits());
        dst.copy_from_slice(&[a, blend565(a, b), b, blend565(b, c), c]);
    }
}

/// Render source rows `top..top + 3` into five consecutive output rows.
///
/// `out` must hold at least `BLOCK_ROWS * EXPANDED_WIDTH` entries; `frame`
/// must be 160x144 direct colour.
pub fn expand_block<P: Pixel>(frame: &Frame<P>, top: usize, out: &mut [u16]) {
    const W: usize = EXPANDED_WIDTH;
    debug_assert!(frame.width() == GB_WIDTH && frame.height() == GB_HEIGHT);

    let out = &mut out[..BLOCK_ROWS * W];
    expand_row(frame.row(top), &mut out[0..W]);
    expand_row(frame.row(top + 1), &mut out[2 * W..3 * W]);
    expand_row(frame.row(top + 2), &mut out[4 * W..5 * W]);

    let (upper, lower) = out.split_at_mut(2 * W);
    let (row0, mid0) = upper.split_at_mut(W);
    let (row1, rest) = lower.split_at_mut(W);
    let (mid1, row2) = rest.split_at_mut(W);

    for x in 0..W {
        mid0[x] = blend565(row0[x], row1[x]);
        mid1[x] = blend565(row1[x], row2[x]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_averages_each_channel() {
        let red = 0b11111_000000_00000;
        let blue = 0b00000_000000_11111;
        assert_eq!(blend565(red, blue), 0b01111_000000_01111);

        // A flat 16-bit average would carry green into red.
        let a = 0b00001_000000_00000;
        let b = 0b00000_111111_00000;
        assert_eq!(blend565(a, b), 0b00000_011111_00000);
    }

    #[test]
    fn blend_of_equal_colours_is_identity() {
        for c in [0x0000, 0xFFFF, 0x1234, 0xF81F] {
            assert_eq!(blend565(c, c), c);
        }
    }

    #[test]
    fn block_expands_three_rows_into_five() {
        let mut frame = Frame::<u16>::new(GB_WIDTH, GB_HEIGHT).unwrap();
        for x in 0..GB_WIDTH {
            frame.set(x, 0, 0xF800);
            frame.set(x, 1, 0x0000);
            frame.set(x, 2, 0x001F);
        }
        frame.set(0, 0, 0x07E0);

        let mut out = vec![0u16; BLOCK_ROWS * EXPANDED_WIDTH];
        expand_block(&frame, 0, &mut out);

        let row = |r: usize| &out[r * EXPANDED_WIDTH..(r + 1) * EXPANDED_WIDTH];
        assert_eq!(row(0)[0], 0x07E0);
        assert_eq!(row(0)[1], blend565(0x07E0, 0xF800));
        assert_eq!(row(0)[2..5], [0xF800, 0xF800, 0xF800]);
        assert!(row(2).iter().all(|&p| p == 0));
        assert!(row(4).iter().all(|&p| p == 0x001F));
        assert_eq!(row(1)[10], blend565(0xF800, 0));
        assert_eq!(row(3)[10], blend565(0, 0x001F));
    }
}
