use serde::{Deserialize, Serialize};

use crate::field::Cell;

/// Value table over `(filled-count, cell)` pairs, stored as a flat arena.
///
/// `filled` ranges over `[1, w*h)`: one slab of `w*h` values per count.
/// Every entry defaults to zero and is only ever overwritten, never
/// removed, during training. The count-only state deliberately aliases
/// different occupancy shapes with equal cell counts; that is the intended
/// tractability trade, not something to repair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QTable {
    w: usize,
    h: usize,
    values: Vec<f64>,
}

impl QTable {
    pub fn new(w: usize, h: usize) -> Self {
        let area = w * h;
        let slots = area.saturating_sub(1).saturating_mul(area);
        Self {
            w,
            h,
            values: vec![0.0; slots],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    #[inline]
    fn slot(&self, filled: usize, (x, y): Cell) -> Option<usize> {
        // The terminal count (every cell filled) has no successor slab.
        if filled == 0 || filled >= self.w * self.h || x >= self.w || y >= self.h {
            return None;
        }
        Some((filled - 1) * self.w * self.h + y * self.w + x)
    }

    pub fn get(&self, filled: usize, cell: Cell) -> f64 {
        self.slot(filled, cell).map_or(0.0, |i| self.values[i])
    }

    pub fn set(&mut self, filled: usize, cell: Cell, value: f64) {
        if let Some(i) = self.slot(filled, cell) {
            self.values[i] = value;
        }
    }

    /// Zeroes every entry. Used between sweep combinations so no value
    /// leaks from one configuration into the next.
    pub fn reset(&mut self) {
        self.values.fill(0.0);
    }
}
