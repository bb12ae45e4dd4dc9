use hashbrown::HashSet;

use crate::error::{Error, Result};

/// Grid coordinate, column-major `(x, y)` with `y` as the row index.
pub type Cell = (usize, usize);

/// Sentinel magnitude marking a wall cell.
///
/// Walls never change after construction. Attractant values of non-wall
/// cells stay strictly above the sentinel (magnitudes live in `[0, 1]` and
/// the normalization mean is below 1), so a sentinel compare is a valid
/// wall test even after `generate`.
pub const WALL: f64 = -1.0;

/// Fraction of the radius on either side of it that counts as goal band.
pub const GOAL_BAND_FRACTION: f64 = 0.3;

/// The dish: a wall layout turned into a reward landscape plus the goal
/// band the mold is supposed to cover.
#[derive(Debug, Clone)]
pub struct Field {
    w: usize,
    h: usize,
    cells: Vec<f64>,
    goal: HashSet<Cell>,
    band_fraction: f64,
}

impl Field {
    /// Builds a dish from a rectangular wall layout. `true` marks a wall.
    pub fn from_walls(layout: &[Vec<bool>]) -> Result<Self> {
        let h = layout.len();
        let w = layout.first().map(|row| row.len()).unwrap_or(0);
        if h == 0 || w == 0 || layout.iter().any(|row| row.len() != w) {
            return Err(Error::MalformedGrid);
        }

        let mut cells = vec![0.0; w * h];
        for (y, row) in layout.iter().enumerate() {
            for (x, &is_wall) in row.iter().enumerate() {
                if is_wall {
                    cells[y * w + x] = WALL;
                }
            }
        }

        Ok(Self {
            w,
            h,
            cells,
            goal: HashSet::new(),
            band_fraction: GOAL_BAND_FRACTION,
        })
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    /// Total cell count, walls included.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    #[inline]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.w && y < self.h
    }

    #[inline]
    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.cells[self.idx(x, y)]
    }

    #[inline]
    pub fn is_wall(&self, x: usize, y: usize) -> bool {
        self.cells[self.idx(x, y)] == WALL
    }

    /// Cells whose wall distance falls inside the goal band. Empty until
    /// `generate` has run.
    pub fn goal(&self) -> &HashSet<Cell> {
        &self.goal
    }

    /// Attractant magnitude at `(x, y)` for the given radius, plus whether
    /// the cell falls in the goal band.
    ///
    /// `d` is the Euclidean distance to the nearest wall, found by a
    /// brute-force scan. Only the distance matters, so scan-order ties are
    /// irrelevant. At or beyond the radius the magnitude decays as
    /// `exp(1 - d/r)` (exactly 1 on the boundary); inside it falls off
    /// steeply as `(d/r)^6` to discourage hugging walls. With no walls at
    /// all, `d` stays infinite and the magnitude is 0.
    pub fn attractant_at(&self, x: usize, y: usize, radius: f64) -> (f64, bool) {
        let mut d = f64::INFINITY;
        for wy in 0..self.h {
            for wx in 0..self.w {
                if self.cells[self.idx(wx, wy)] == WALL {
                    let dx = wx as f64 - x as f64;
                    let dy = wy as f64 - y as f64;
                    let e = (dx * dx + dy * dy).sqrt();
                    if e < d {
                        d = e;
                    }
                }
            }
        }

        let in_band = d > radius * (1.0 - self.band_fraction)
            && d < radius * (1.0 + self.band_fraction);
        let magnitude = if d >= radius {
            (1.0 - d / radius).exp()
        } else {
            (d / radius).powi(6)
        };
        (magnitude, in_band)
    }

    /// Lays attractant over every unprocessed non-wall cell, records the
    /// goal band, zero-mean-normalizes the new mass, and adds it into the
    /// grid. Returns the post-normalization total for bookkeeping.
    ///
    /// The normalization constant is `sum(magnitudes) / (w*h)` over the
    /// full grid size, but wall cells keep the sentinel untouched.
    pub fn generate(&mut self, radius: f64) -> f64 {
        let mut oats = vec![0.0; self.cells.len()];
        for y in 0..self.h {
            for x in 0..self.w {
                let i = self.idx(x, y);
                if self.cells[i] == 0.0 {
                    let (magnitude, in_band) = self.attractant_at(x, y, radius);
                    oats[i] = magnitude;
                    if in_band {
                        self.goal.insert((x, y));
                    }
                }
            }
        }

        let mean: f64 = oats.iter().sum::<f64>() / self.cells.len() as f64;
        let mut total = 0.0;
        for i in 0..self.cells.len() {
            if self.cells[i] == WALL {
                continue;
            }
            let normalized = oats[i] - mean;
            self.cells[i] += normalized;
            total += normalized;
        }
        total
    }
}
