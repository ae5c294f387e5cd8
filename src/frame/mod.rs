//! Frame primitives
//!
//! Row-major 2-D grids, plane identifiers and the processing rectangle shared
//! by every stage of the pipeline.

use std::ops::{Index, IndexMut};

/// One of the three scalar channels filtered per pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    /// Distance from the sensor, millimeters
    Depth,
    /// World X position, millimeters
    X,
    /// World Y position, millimeters
    Y,
}

impl Plane {
    /// All planes in processing order
    pub const ALL: [Plane; 3] = [Plane::Depth, Plane::X, Plane::Y];
}

/// Owned, row-major W×H grid
///
/// Indexing with `(x, y)` is bounds-checked; use [`Grid::get`] when the
/// coordinate may fall outside the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy> Grid<T> {
    /// Create a grid with every cell set to `fill`
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Self {
            width,
            height,
            data: vec![fill; width * height],
        }
    }

    /// Wrap an existing row-major buffer
    ///
    /// Returns `None` if the buffer length does not match `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Build a grid by evaluating `f(x, y)` for every cell
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Grid dimensions as `(width, height)`
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Whether `(x, y)` lies inside the grid
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Value at `(x, y)`, or `None` outside the grid
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if self.contains(x, y) {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    /// Borrow one row
    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// Mutably borrow one row
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Flip the grid left-to-right in place
    pub fn mirror_horizontal(&mut self) {
        if self.width == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(self.width) {
            row.reverse();
        }
    }

    /// Copy of the grid flipped left-to-right
    pub fn mirrored(&self) -> Self {
        let mut copy = self.clone();
        copy.mirror_horizontal();
        copy
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    fn index(&self, (x, y): (usize, usize)) -> &T {
        assert!(
            x < self.width && y < self.height,
            "grid index ({}, {}) out of bounds for {}x{}",
            x,
            y,
            self.width,
            self.height
        );
        &self.data[y * self.width + x]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        assert!(
            x < self.width && y < self.height,
            "grid index ({}, {}) out of bounds for {}x{}",
            x,
            y,
            self.width,
            self.height
        );
        &mut self.data[y * self.width + x]
    }
}

/// Active processing rectangle `[min_x, max_x) × [min_y, max_y)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roi {
    pub min_x: usize,
    pub max_x: usize,
    pub min_y: usize,
    pub max_y: usize,
}

impl Roi {
    /// Rectangle covering a whole `width × height` grid
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            min_x: 0,
            max_x: width,
            min_y: 0,
            max_y: height,
        }
    }

    pub fn width(&self) -> usize {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> usize {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Grow by `margin` on every side, clamped to a `width × height` grid
    pub fn expand(&self, margin: usize, width: usize, height: usize) -> Self {
        Self {
            min_x: self.min_x.saturating_sub(margin),
            max_x: (self.max_x + margin).min(width),
            min_y: self.min_y.saturating_sub(margin),
            max_y: (self.max_y + margin).min(height),
        }
    }

    /// The same rectangle seen in a left-right mirrored grid of `width`
    pub fn mirrored(&self, width: usize) -> Self {
        Self {
            min_x: width.saturating_sub(self.max_x),
            max_x: width.saturating_sub(self.min_x),
            min_y: self.min_y,
            max_y: self.max_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_indexing_is_row_major() {
        let grid = Grid::from_fn(3, 2, |x, y| (y * 10 + x) as f32);
        assert_eq!(grid[(2, 1)], 12.0);
        assert_eq!(grid.row(1), &[10.0, 11.0, 12.0]);
        assert_eq!(grid.get(3, 0), None);
    }

    #[test]
    #[should_panic]
    fn test_grid_index_out_of_bounds_panics() {
        let grid = Grid::new(2, 2, 0.0f32);
        let _ = grid[(2, 0)];
    }

    #[test]
    fn test_grid_mirror_horizontal() {
        let mut grid = Grid::from_fn(3, 2, |x, y| (y * 10 + x) as i32);
        grid.mirror_horizontal();
        assert_eq!(grid.row(0), &[2, 1, 0]);
        assert_eq!(grid.row(1), &[12, 11, 10]);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(Grid::from_vec(2, 2, vec![0u8; 3]).is_none());
        assert!(Grid::from_vec(2, 2, vec![0u8; 4]).is_some());
    }

    #[test]
    fn test_roi_expand_clamps_to_grid() {
        let roi = Roi {
            min_x: 5,
            max_x: 10,
            min_y: 1,
            max_y: 3,
        };
        let expanded = roi.expand(4, 12, 20);
        assert_eq!(
            expanded,
            Roi {
                min_x: 1,
                max_x: 12,
                min_y: 0,
                max_y: 7
            }
        );
    }

    #[test]
    fn test_roi_mirrored() {
        let roi = Roi {
            min_x: 2,
            max_x: 5,
            min_y: 0,
            max_y: 4,
        };
        let mirrored = roi.mirrored(10);
        assert_eq!(mirrored.min_x, 5);
        assert_eq!(mirrored.max_x, 8);
        assert_eq!(mirrored.width(), roi.width());
    }
}
