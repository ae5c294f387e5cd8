//! Separable [1, 2, 1] box smoother, confined to the ROI.

use crate::frame::{Grid, Roi};

/// Smooth `grid` inside `roi` with `passes` rounds of a horizontal then a
/// vertical pass.
pub fn smooth(grid: &mut Grid<f32>, roi: Roi, passes: usize) {
    if roi.is_empty() {
        return;
    }
    let mut column = Vec::with_capacity(roi.height());
    for _ in 0..passes {
        for y in roi.min_y..roi.max_y {
            let row = &mut grid.row_mut(y)[roi.min_x..roi.max_x];
            smooth_line(row);
        }

        for x in roi.min_x..roi.max_x {
            column.clear();
            column.extend((roi.min_y..roi.max_y).map(|y| grid[(x, y)]));
            smooth_line(&mut column);
            for (offset, value) in column.iter().enumerate() {
                grid[(x, roi.min_y + offset)] = *value;
            }
        }
    }
}

/// One in-place 1-D pass.
///
/// Interior samples use weights [1, 2, 1] / 4, the two ends [2, 1] / 3. The
/// left neighbor is read from before it was updated.
fn smooth_line(line: &mut [f32]) {
    let n = line.len();
    if n < 2 {
        return;
    }

    let mut prev = line[0];
    line[0] = (line[0] * 2.0 + line[1]) / 3.0;
    for i in 1..n - 1 {
        let current = line[i];
        line[i] = (prev + current * 2.0 + line[i + 1]) * 0.25;
        prev = current;
    }
    line[n - 1] = (prev + line[n - 1] * 2.0) / 3.0;
}
