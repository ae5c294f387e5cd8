//! Per-plane averaging slots, running statistics and last stable values.

use crate::frame::{Grid, Plane};

/// Running aggregate over a pixel's averaging slots
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelStats {
    /// Number of slots holding a real sample
    pub count: f32,
    /// Sum of those samples
    pub sum: f32,
    /// Sum of their squares
    pub sum_sq: f32,
}

impl PixelStats {
    pub fn mean(&self) -> Option<f32> {
        (self.count > 0.0).then(|| self.sum / self.count)
    }

    pub(crate) fn add(&mut self, value: f32) {
        self.count += 1.0;
        self.sum += value;
        self.sum_sq += value * value;
    }

    pub(crate) fn remove(&mut self, value: f32) {
        self.count -= 1.0;
        self.sum -= value;
        self.sum_sq -= value * value;
    }

    /// Statistics of `n` slots all holding `value`
    pub(crate) fn filled(n: usize, value: f32) -> Self {
        let n = n as f32;
        Self {
            count: n,
            sum: n * value,
            sum_sq: n * value * value,
        }
    }
}

/// Buffers for one plane, sized to the sensor grid
#[derive(Debug, Clone)]
pub struct PlaneBuffers {
    /// One grid per averaging slot, `None` until a sample is written
    slots: Vec<Grid<Option<f32>>>,
    stats: Grid<PixelStats>,
    /// Last value considered stable, per pixel
    valid: Grid<f32>,
}

impl PlaneBuffers {
    /// Allocate buffers with empty slots and every valid value at `sentinel`
    pub fn new(width: usize, height: usize, window: usize, sentinel: f32) -> Self {
        Self {
            slots: (0..window).map(|_| Grid::new(width, height, None)).collect(),
            stats: Grid::new(width, height, PixelStats::default()),
            valid: Grid::new(width, height, sentinel),
        }
    }

    /// Number of averaging slots
    pub fn window(&self) -> usize {
        self.slots.len()
    }

    pub fn stats_at(&self, x: usize, y: usize) -> Option<PixelStats> {
        self.stats.get(x, y)
    }

    pub fn valid_at(&self, x: usize, y: usize) -> Option<f32> {
        self.valid.get(x, y)
    }

    /// Sample held in one slot, `None` if the slot is empty or out of range
    pub fn slot_value_at(&self, x: usize, y: usize, slot: usize) -> Option<f32> {
        self.slots.get(slot).and_then(|grid| grid.get(x, y)).flatten()
    }

    pub(crate) fn slot(&self, slot: usize) -> &Grid<Option<f32>> {
        &self.slots[slot]
    }

    pub(crate) fn slot_mut(&mut self, slot: usize) -> &mut Grid<Option<f32>> {
        &mut self.slots[slot]
    }

    /// Write `value` into every slot of one pixel
    pub(crate) fn fill_pixel_slots(&mut self, x: usize, y: usize, value: f32) {
        for slot in &mut self.slots {
            slot[(x, y)] = Some(value);
        }
    }

    pub(crate) fn stats_mut(&mut self) -> &mut Grid<PixelStats> {
        &mut self.stats
    }

    pub(crate) fn valid_mut(&mut self) -> &mut Grid<f32> {
        &mut self.valid
    }

    pub(crate) fn valid(&self) -> &Grid<f32> {
        &self.valid
    }
}

/// Buffers for all three planes plus the shared slot cursor
#[derive(Debug, Clone)]
pub struct PlaneSet {
    pub depth: PlaneBuffers,
    pub x: PlaneBuffers,
    pub y: PlaneBuffers,
    /// Slot receiving this frame's samples, shared by all planes
    cursor: usize,
}

impl PlaneSet {
    pub fn new(
        width: usize,
        height: usize,
        window: usize,
        depth_sentinel: f32,
        position_sentinel: f32,
    ) -> Self {
        Self {
            depth: PlaneBuffers::new(width, height, window, depth_sentinel),
            x: PlaneBuffers::new(width, height, window, position_sentinel),
            y: PlaneBuffers::new(width, height, window, position_sentinel),
            cursor: 0,
        }
    }

    pub fn get(&self, plane: Plane) -> &PlaneBuffers {
        match plane {
            Plane::Depth => &self.depth,
            Plane::X => &self.x,
            Plane::Y => &self.y,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move to the next slot, once per frame
    pub fn advance_cursor(&mut self) {
        let window = self.depth.window();
        if window > 0 {
            self.cursor = (self.cursor + 1) % window;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffers_are_empty() {
        let buffers = PlaneBuffers::new(4, 3, 5, 4000.0);
        assert_eq!(buffers.window(), 5);
        assert_eq!(buffers.valid_at(3, 2), Some(4000.0));
        assert_eq!(buffers.slot_value_at(1, 1, 4), None);
        assert_eq!(buffers.stats_at(0, 0), Some(PixelStats::default()));
        assert_eq!(buffers.slot_value_at(0, 0, 5), None);
    }

    #[test]
    fn test_stats_add_remove() {
        let mut stats = PixelStats::default();
        assert_eq!(stats.mean(), None);
        stats.add(3.0);
        stats.add(5.0);
        stats.remove(3.0);
        assert_eq!(stats, PixelStats { count: 1.0, sum: 5.0, sum_sq: 25.0 });
        assert_eq!(PixelStats::filled(3, 2.0), PixelStats { count: 3.0, sum: 6.0, sum_sq: 12.0 });
    }

    #[test]
    fn test_cursor_wraps() {
        let mut set = PlaneSet::new(2, 2, 3, 4000.0, 4000.0);
        for _ in 0..4 {
            set.advance_cursor();
        }
        assert_eq!(set.cursor(), 1);
    }

    #[test]
    fn test_zero_window_cursor_stays() {
        let mut set = PlaneSet::new(2, 2, 0, 4000.0, 4000.0);
        set.advance_cursor();
        assert_eq!(set.cursor(), 0);
    }
}
