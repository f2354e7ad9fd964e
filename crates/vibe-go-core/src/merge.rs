use crate::scanline::Scanline;

/// Maximum edge drift, in pixels, between two rows that still share a run.
///
/// Opening a rectangle on the panel costs about as much as pushing a handful
/// of pixels, so covering a few unchanged pixels is cheaper than another
/// transaction.
pub const MERGE_TOLERANCE: u16 = 8;

/// Fold adjacent rows with similar spans into multi-row runs.
///
/// Works bottom to top: row `y` is merged into `y - 1` when both edges are
/// within [`MERGE_TOLERANCE`]. The upper record grows to the union of both
/// spans and its `repeat` becomes `repeat(y) + 1`, so a run only ever covers
/// more than its rows asked for, never less.
pub fn optimize(diff: &mut [Scanline]) {
    for y in (1..diff.len()).rev() {
        let below = diff[y];
        let above = diff[y - 1];

        if below.left.abs_diff(above.left) > MERGE_TOLERANCE {
            continue;
        }
        if below.right().abs_diff(above.right()) > MERGE_TOLERANCE {
            continue;
        }

        let left = below.left.min(above.left);
        let right = below.right().max(above.right());
        diff[y - 1] = Scanline {
            left,
            width: right - left,
            repeat: below.repeat + 1,
        };
    }
}

/// Iterate the runs of a (possibly merged) diff as `(top_row, run)`.
///
/// Rows covered by an earlier run's `repeat` are skipped. `repeat` is clipped
/// to the rows that remain and spans are clipped to `row_width`.
pub fn runs(diff: &[Scanline], row_width: usize) -> Runs<'_> {
    Runs {
        diff,
        row_width: row_width.min(u16::MAX as usize) as u16,
        y: 0,
    }
}

pub struct Runs<'a> {
    diff: &'a [Scanline],
    row_width: u16,
    y: usize,
}

impl Iterator for Runs<'_> {
    type Item = (usize, Scanline);

    fn next(&mut self) -> Option<Self::Item> {
        let span = *self.diff.get(self.y)?;
        let top = self.y;
        let remaining = (self.diff.len() - top).min(u16::MAX as usize) as u16;
        let repeat = span.repeat.clamp(1, remaining);
        self.y += repeat as usize;

        let left = span.left.min(self.row_width);
        let width = span.width.min(self.row_width - left);
        Some((
            top,
            Scanline {
                left,
                width,
                repeat,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(left: u16, width: u16) -> Scanline {
        Scanline {
            left,
            width,
            repeat: 1,
        }
    }

    #[test]
    fn close_rows_merge_into_union() {
        let mut diff = [span(10, 20), span(14, 20), span(12, 20)];
        optimize(&mut diff);
        assert_eq!(diff[0], Scanline { left: 10, width: 24, repeat: 3 });
    }

    #[test]
    fn distant_edges_do_not_merge() {
        let mut diff = [span(0, 10), span(9, 10), span(0, 40)];
        optimize(&mut diff);
        assert_eq!(diff[0].repeat, 1);
        assert_eq!(diff[1].repeat, 1);
        assert_eq!(diff[2].repeat, 1);
    }

    #[test]
    fn tolerance_is_inclusive() {
        let mut diff = [span(0, 10), span(8, 10)];
        optimize(&mut diff);
        assert_eq!(diff[0], Scanline { left: 0, width: 18, repeat: 2 });
    }

    #[test]
    fn unchanged_rows_chain_without_width() {
        let mut diff = [Scanline::unchanged(160); 4];
        optimize(&mut diff);
        assert_eq!(diff[0], Scanline { left: 160, width: 0, repeat: 4 });
        assert_eq!(runs(&diff, 160).count(), 1);
    }

    #[test]
    fn runs_skip_rows_covered_by_repeat() {
        let diff = [
            Scanline { left: 0, width: 4, repeat: 2 },
            span(0, 4),
            span(2, 1),
        ];
        let tops: Vec<usize> = runs(&diff, 8).map(|(top, _)| top).collect();
        assert_eq!(tops, vec![0, 2]);
    }

    #[test]
    fn runs_clip_to_frame() {
        let diff = [Scanline { left: 6, width: 10, repeat: 9 }];
        let (_, run) = runs(&diff, 8).next().unwrap();
        assert_eq!(run, Scanline { left: 6, width: 2, repeat: 1 });
    }
}
