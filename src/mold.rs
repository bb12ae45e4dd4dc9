use hashbrown::HashSet;

use crate::error::{Error, Result};
use crate::field::{Cell, Field};
use crate::prng::Prng;
use crate::qtable::QTable;

/// A candidate cell with its normalized preference score.
///
/// Scores are advisory signal: selection elsewhere is randomized (shuffle
/// plus the exploration draw), so the score rides along rather than acting
/// as a sort key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCell {
    pub cell: Cell,
    pub score: f64,
}

/// The growth automaton: a binary occupancy grid grown outward from a seed
/// cell toward the goal band.
///
/// Occupancy is monotone within an episode. The automaton is GROWING until
/// `is_goal_reached` turns true, after which callers stop stepping; a fresh
/// `Mold` is cheap, so episodes construct and discard one each.
#[derive(Debug, Clone)]
pub struct Mold {
    w: usize,
    h: usize,
    occupied: Vec<bool>,
    frontier: HashSet<Cell>,
    goal: HashSet<Cell>,
    filled: usize,
    greedy_bias: f64,
    last_action: Cell,

    /// Realized reward accumulated over the episode, for diagnostics.
    pub rewards: f64,
}

impl Mold {
    /// Starts a fresh colony with exactly the seed cell occupied.
    ///
    /// `greedy_bias` gates the value-greedy branch of `step`; exploration
    /// fires with probability `1 - greedy_bias`. Seeds on a wall (or out of
    /// bounds) are rejected before any occupancy state is allocated.
    pub fn new(field: &Field, seed: Cell, goal: HashSet<Cell>, greedy_bias: f64) -> Result<Self> {
        let (x, y) = seed;
        if !field.in_bounds(x, y) || field.is_wall(x, y) {
            return Err(Error::InvalidStart(x, y));
        }

        let (w, h) = (field.width(), field.height());
        let mut occupied = vec![false; w * h];
        occupied[y * w + x] = true;
        let mut frontier = HashSet::new();
        frontier.insert(seed);

        Ok(Self {
            w,
            h,
            occupied,
            frontier,
            goal,
            filled: 1,
            greedy_bias,
            last_action: seed,
            rewards: 0.0,
        })
    }

    /// Occupied cell count: the coarse state the value table is keyed by.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// The most recently colonized cell (the seed right after construction).
    pub fn last_action(&self) -> Cell {
        self.last_action
    }

    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        self.occupied[y * self.w + x]
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// True iff every goal cell is occupied.
    pub fn is_goal_reached(&self) -> bool {
        self.goal.iter().all(|&(x, y)| self.occupied[y * self.w + x])
    }

    /// Collects every growable 4-neighbor of the current frontier.
    ///
    /// A neighbor is a candidate iff in bounds, unoccupied, and not a wall;
    /// diagonals do not grow. Duplicates are dropped with first-seen order
    /// kept, which pins greedy tie-breaking within a step. Frontier cells
    /// that yield no candidate are saturated and removed as a side effect.
    pub fn frontier_candidates(&mut self, field: &Field) -> Vec<Cell> {
        let mut seen: HashSet<Cell> = HashSet::new();
        let mut candidates: Vec<Cell> = Vec::new();
        let mut saturated: Vec<Cell> = Vec::new();

        for &(x, y) in self.frontier.iter() {
            let mut added = 0usize;
            if x > 0 && self.growable(field, x - 1, y) {
                if seen.insert((x - 1, y)) {
                    candidates.push((x - 1, y));
                }
                added += 1;
            }
            if y > 0 && self.growable(field, x, y - 1) {
                if seen.insert((x, y - 1)) {
                    candidates.push((x, y - 1));
                }
                added += 1;
            }
            if x + 1 < self.w && self.growable(field, x + 1, y) {
                if seen.insert((x + 1, y)) {
                    candidates.push((x + 1, y));
                }
                added += 1;
            }
            if y + 1 < self.h && self.growable(field, x, y + 1) {
                if seen.insert((x, y + 1)) {
                    candidates.push((x, y + 1));
                }
                added += 1;
            }
            if added == 0 {
                saturated.push((x, y));
            }
        }

        for cell in saturated {
            self.frontier.remove(&cell);
        }
        candidates
    }

    #[inline]
    fn growable(&self, field: &Field, x: usize, y: usize) -> bool {
        !self.occupied[y * self.w + x] && !field.is_wall(x, y)
    }

    /// Heuristic A: score each candidate by its attractant relative to the
    /// best candidate (divisor 1 when the best is 0), then shuffle.
    pub fn rank_by_attractant(
        &self,
        field: &Field,
        candidates: &[Cell],
        rng: &mut Prng,
    ) -> Vec<ScoredCell> {
        let mut max_oat = 0.0;
        for &(x, y) in candidates {
            let v = field.value(x, y);
            if v > max_oat {
                max_oat = v;
            }
        }
        let divisor = if max_oat != 0.0 { max_oat } else { 1.0 };

        let mut scored: Vec<ScoredCell> = candidates
            .iter()
            .map(|&cell| ScoredCell {
                cell,
                score: field.value(cell.0, cell.1) / divisor,
            })
            .collect();
        rng.shuffle(&mut scored);
        scored
    }

    /// Heuristic B: score each candidate by the steepest positive attractant
    /// rise toward an unoccupied, non-wall 8-neighbor with attractant >= 0,
    /// normalized by the steepest rise over all candidates (divisor 1 when
    /// that is 0), then shuffle.
    pub fn rank_by_gradient(
        &self,
        field: &Field,
        candidates: &[Cell],
        rng: &mut Prng,
    ) -> Vec<ScoredCell> {
        let mut scored: Vec<ScoredCell> = candidates
            .iter()
            .map(|&(x, y)| {
                let own = field.value(x, y);
                let mut max_rise = 0.0;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= self.w as i64 || ny >= self.h as i64 {
                            continue;
                        }
                        let (nx, ny) = (nx as usize, ny as usize);
                        if self.occupied[ny * self.w + nx] || field.is_wall(nx, ny) {
                            continue;
                        }
                        let v = field.value(nx, ny);
                        if v >= 0.0 && v - own > max_rise {
                            max_rise = v - own;
                        }
                    }
                }
                ScoredCell {
                    cell: (x, y),
                    score: max_rise,
                }
            })
            .collect();

        let max_rise = scored.iter().map(|s| s.score).fold(0.0, f64::max);
        let divisor = if max_rise != 0.0 { max_rise } else { 1.0 };
        for s in &mut scored {
            s.score /= divisor;
        }
        rng.shuffle(&mut scored);
        scored
    }

    /// One policy-driven growth step.
    ///
    /// Greedy argmax over `table[(filled, cell)]` in first-seen candidate
    /// order (strict `>`, so ties keep the earlier cell); when the draw
    /// exceeds `greedy_bias` the pick is overridden by a uniform choice over
    /// the full candidate set. Colonizes the chosen cell and returns the new
    /// filled count with it.
    pub fn step(&mut self, field: &Field, table: &QTable, rng: &mut Prng) -> Result<(usize, Cell)> {
        let candidates = self.frontier_candidates(field);
        let Some(&first) = candidates.first() else {
            return Err(Error::StuckGrowth);
        };

        let mut action = first;
        let mut best = table.get(self.filled, first);
        for &cell in &candidates[1..] {
            let v = table.get(self.filled, cell);
            if v > best {
                best = v;
                action = cell;
            }
        }

        if rng.next_f64_01() > self.greedy_bias {
            action = candidates[rng.gen_range_usize(0, candidates.len())];
        }

        let (x, y) = action;
        self.occupied[y * self.w + x] = true;
        self.frontier.insert(action);
        self.filled += 1;
        self.last_action = action;

        Ok((self.filled, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::WALL;

    fn open_row_field() -> Field {
        let mut field = Field::from_walls(&[
            vec![true, true, true],
            vec![false, false, false],
            vec![false, false, false],
        ])
        .unwrap();
        field.generate(1.0);
        field
    }

    #[test]
    fn seed_on_wall_is_rejected() {
        let field = open_row_field();
        let err = Mold::new(&field, (0, 0), field.goal().clone(), 0.5).unwrap_err();
        assert!(matches!(err, Error::InvalidStart(0, 0)));
    }

    #[test]
    fn out_of_bounds_seed_is_rejected() {
        let field = open_row_field();
        let err = Mold::new(&field, (9, 9), HashSet::new(), 0.5).unwrap_err();
        assert!(matches!(err, Error::InvalidStart(9, 9)));
    }

    #[test]
    fn candidates_exclude_walls_diagonals_and_occupied() {
        let field = open_row_field();
        let mut mold = Mold::new(&field, (1, 1), field.goal().clone(), 0.5).unwrap();
        let mut candidates = mold.frontier_candidates(&field);
        candidates.sort_unstable();
        // From (1,1): up is a wall, the other three 4-neighbors grow.
        // (0,2) and (2,2) are diagonal and must not appear.
        assert_eq!(candidates, vec![(0, 1), (1, 2), (2, 1)]);
    }

    #[test]
    fn occupancy_is_monotone_and_new_cells_join_the_frontier() {
        let field = open_row_field();
        let mut mold = Mold::new(&field, (1, 1), field.goal().clone(), 1.0).unwrap();
        let table = QTable::new(3, 3);
        let mut rng = Prng::new(5);

        let mut before: Vec<bool> = (0..9).map(|i| mold.occupied[i]).collect();
        for _ in 0..3 {
            let (filled, cell) = mold.step(&field, &table, &mut rng).unwrap();
            assert_eq!(filled, mold.filled());
            assert!(mold.frontier.contains(&cell));
            // Nothing previously occupied ever vacates.
            for i in 0..9 {
                assert!(!before[i] || mold.occupied[i]);
            }
            before = (0..9).map(|i| mold.occupied[i]).collect();
        }
    }

    #[test]
    fn saturated_frontier_cells_are_pruned() {
        let field = open_row_field();
        let mut mold = Mold::new(&field, (1, 1), field.goal().clone(), 1.0).unwrap();
        let table = QTable::new(3, 3);
        let mut rng = Prng::new(11);

        // Fill the whole dish: 6 non-wall cells, so 5 steps.
        for _ in 0..5 {
            mold.step(&field, &table, &mut rng).unwrap();
        }
        // Every frontier cell is now saturated; discovery empties it.
        let candidates = mold.frontier_candidates(&field);
        assert!(candidates.is_empty());
        assert_eq!(mold.frontier_len(), 0);
        assert!(matches!(
            mold.step(&field, &table, &mut rng),
            Err(Error::StuckGrowth)
        ));
    }

    #[test]
    fn grows_over_the_dish_and_reaches_the_goal_band() {
        let field = open_row_field();
        let mut mold = Mold::new(&field, (1, 1), field.goal().clone(), 1.0).unwrap();
        let table = QTable::new(3, 3);
        let mut rng = Prng::new(1);

        let mut steps = 0;
        while !mold.is_goal_reached() {
            mold.step(&field, &table, &mut rng).unwrap();
            steps += 1;
            assert!(steps <= 5, "goal band not covered after filling the dish");
        }
        // The band is the full row below the wall; covering it needs at
        // least the two missing row cells and at most every other cell.
        assert!(steps >= 2);
        for y in 1..3 {
            for x in 0..3 {
                if mold.is_occupied(x, y) {
                    assert!(!field.is_wall(x, y));
                }
            }
        }
    }

    #[test]
    fn single_goal_cell_reached_in_one_colonizing_step() {
        let field = open_row_field();
        let goal: HashSet<Cell> = [(1, 2)].into_iter().collect();
        let mut mold = Mold::new(&field, (1, 1), goal, 1.0).unwrap();
        assert!(!mold.is_goal_reached());

        let table = QTable::new(3, 3);
        // Steer the greedy pick onto the goal cell.
        let mut steering = table.clone();
        steering.set(1, (1, 2), 1.0);
        let mut rng = Prng::new(2);
        let (_, action) = mold.step(&field, &steering, &mut rng).unwrap();
        assert_eq!(action, (1, 2));
        assert!(mold.is_goal_reached());
    }

    #[test]
    fn attractant_ranking_normalizes_and_keeps_all_candidates() {
        let field = open_row_field();
        let mut mold = Mold::new(&field, (1, 1), field.goal().clone(), 0.5).unwrap();
        let candidates = mold.frontier_candidates(&field);
        let mut rng = Prng::new(3);

        let scored = mold.rank_by_attractant(&field, &candidates, &mut rng);
        assert_eq!(scored.len(), candidates.len());
        let best = scored.iter().map(|s| s.score).fold(f64::MIN, f64::max);
        assert!((best - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gradient_ranking_guards_the_flat_case() {
        // A dish with no walls is flat at zero attractant everywhere, so
        // every gradient is 0 and the divisor guard has to kick in.
        let field = Field::from_walls(&[vec![false, false], vec![false, false]]).unwrap();
        let mut mold = Mold::new(&field, (0, 0), HashSet::new(), 0.5).unwrap();
        let candidates = mold.frontier_candidates(&field);
        let mut rng = Prng::new(4);

        let scored = mold.rank_by_gradient(&field, &candidates, &mut rng);
        assert_eq!(scored.len(), candidates.len());
        for s in scored {
            assert_eq!(s.score, 0.0);
            assert!(s.score.is_finite());
        }
    }

    #[test]
    fn gradient_ignores_neighbors_below_zero() {
        let field = open_row_field();
        let mut mold = Mold::new(&field, (1, 1), field.goal().clone(), 0.5).unwrap();
        let candidates = mold.frontier_candidates(&field);
        let mut rng = Prng::new(6);

        let scored = mold.rank_by_gradient(&field, &candidates, &mut rng);
        for s in &scored {
            assert!(s.score >= 0.0 && s.score <= 1.0);
        }
        // Wall sentinel stays untouched by construction of the field.
        assert_eq!(field.value(0, 0), WALL);
    }
}
