use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::field::{Cell, Field};
use crate::mold::Mold;
use crate::prng::Prng;
use crate::qtable::QTable;
use crate::store::{RunKey, TableStore};

/// Learning hyperparameters and episode counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Q-learning rate.
    pub alpha: f64,
    /// Discount factor.
    pub gamma: f64,
    /// Episodes per (seed, bias) combination during training.
    pub episodes: usize,
    /// Episodes per persisted table during evaluation.
    pub eval_episodes: usize,
    /// Seed for the exploration/shuffle PRNG.
    pub rng_seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            gamma: 0.9,
            episodes: 10_000,
            eval_episodes: 1_000,
            rng_seed: 0x4F41_5453, // "OATS"
        }
    }
}

/// Outcome of one `learn` run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub episodes: usize,
    pub stuck_restarts: usize,
    pub total_reward: f64,
}

/// Outcome of one `sweep` over seed/bias combinations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    pub trained: usize,
    pub skipped: usize,
    pub failed: usize,
    pub episodes: usize,
}

/// One evaluation episode; the `e` column keeps its historical name.
#[derive(Debug, Clone, Serialize)]
pub struct EvalRow {
    pub x: usize,
    pub y: usize,
    pub e: f64,
    pub rewards: f64,
    pub iterations: usize,
}

/// Owns the value table and runs episodes against a generated field.
///
/// Strictly sequential: every episode reads and writes the shared table,
/// so there is nothing to parallelize without synchronizing table writes.
pub struct Trainer {
    field: Field,
    table: QTable,
    cfg: TrainerConfig,
    rng: Prng,
}

impl Trainer {
    pub fn new(field: Field, cfg: TrainerConfig) -> Self {
        let table = QTable::new(field.width(), field.height());
        let rng = Prng::new(cfg.rng_seed);
        Self {
            field,
            table,
            cfg,
            rng,
        }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    /// Non-classical value update: the `(new, action)` slot is overwritten
    /// with the max-bootstrapped estimate over the candidates available
    /// after the step, floored at zero. With no candidates left the slot
    /// reads back zero.
    fn bellman_update(
        &mut self,
        old_state: usize,
        new_state: usize,
        action: Cell,
        candidates: &[Cell],
    ) {
        let reward = self.field.value(action.0, action.1);
        let mut max_q = 0.0;
        for &cell in candidates {
            let q = (1.0 - self.cfg.alpha) * self.table.get(old_state, action)
                + self.cfg.alpha * (reward + self.cfg.gamma * self.table.get(new_state, cell));
            if q > max_q {
                max_q = q;
            }
        }
        self.table.set(new_state, action, max_q);
    }

    /// Runs `episodes` growth episodes from `seed`, updating the table
    /// after every non-terminal step.
    ///
    /// Each outer iteration samples the reward at the most recently
    /// colonized cell (the seed on the first pass). A stuck frontier
    /// restarts a fresh episode and still counts it, so unreachable goals
    /// terminate after `episodes` restarts instead of spinning.
    pub fn learn(&mut self, seed: Cell, greedy_bias: f64, episodes: usize) -> Result<RunStats> {
        let goal = self.field.goal().clone();
        if goal.is_empty() {
            warn!("goal band is empty; generate the field before training");
        }
        info!(
            x = seed.0,
            y = seed.1,
            greedy_bias,
            episodes,
            "learning"
        );

        let mut stats = RunStats::default();
        let mut mold = Mold::new(&self.field, seed, goal.clone(), greedy_bias)?;

        while stats.episodes < episodes {
            let (ax, ay) = mold.last_action();
            mold.rewards += self.field.value(ax, ay);

            if mold.is_goal_reached() {
                stats.total_reward += mold.rewards;
                stats.episodes += 1;
                if stats.episodes % 1_000 == 0 {
                    info!(
                        episode = stats.episodes,
                        avg_reward = stats.total_reward / stats.episodes as f64,
                        "progress"
                    );
                }
                mold = Mold::new(&self.field, seed, goal.clone(), greedy_bias)?;
                continue;
            }

            let old_state = mold.filled();
            match mold.step(&self.field, &self.table, &mut self.rng) {
                Ok((new_state, action)) => {
                    let candidates = mold.frontier_candidates(&self.field);
                    self.bellman_update(old_state, new_state, action, &candidates);
                }
                Err(Error::StuckGrowth) => {
                    warn!(
                        x = seed.0,
                        y = seed.1,
                        filled = mold.filled(),
                        "frontier exhausted before the goal band; restarting episode"
                    );
                    stats.stuck_restarts += 1;
                    stats.episodes += 1;
                    mold = Mold::new(&self.field, seed, goal.clone(), greedy_bias)?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(stats)
    }

    /// Trains every (seed, bias) combination missing from the store,
    /// persisting each table and zeroing the in-memory one between
    /// combinations, so nothing is shared across configurations.
    ///
    /// Existing artifacts are skipped, which makes an interrupted sweep
    /// resumable by re-running with the same inputs. A bad configuration
    /// (e.g. a seed on a wall) aborts only its own combination.
    pub fn sweep(
        &mut self,
        store: &mut dyn TableStore,
        seeds: &[Cell],
        biases: &[f64],
    ) -> Result<SweepStats> {
        let episodes = self.cfg.episodes;
        let mut stats = SweepStats::default();

        for &(x, y) in seeds {
            for &bias in biases {
                let key = RunKey {
                    x,
                    y,
                    greedy_bias: bias,
                };
                if store.exists(&key) {
                    info!(x, y, greedy_bias = bias, "already learned, skipping");
                    stats.skipped += 1;
                    continue;
                }

                match self.learn((x, y), bias, episodes) {
                    Ok(run) => {
                        store.put(&key, &self.table)?;
                        self.table.reset();
                        stats.trained += 1;
                        stats.episodes += run.episodes;
                    }
                    Err(e) => {
                        warn!(x, y, greedy_bias = bias, error = %e, "configuration failed");
                        self.table.reset();
                        stats.failed += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Replays every persisted table: `eval_episodes` episodes per key with
    /// no learning updates, one report row per episode. Rewards are the
    /// field value at the seed plus at every colonized cell, the same
    /// accounting the training loop uses.
    pub fn evaluate(&mut self, store: &dyn TableStore) -> Result<Vec<EvalRow>> {
        let goal = self.field.goal().clone();
        let mut rows = Vec::new();

        for key in store.keys()? {
            let Some(table) = store.get(&key)? else {
                continue;
            };
            info!(
                x = key.x,
                y = key.y,
                greedy_bias = key.greedy_bias,
                "evaluating"
            );

            for _ in 0..self.cfg.eval_episodes {
                let mut mold =
                    match Mold::new(&self.field, (key.x, key.y), goal.clone(), key.greedy_bias) {
                        Ok(m) => m,
                        Err(e) => {
                            warn!(error = %e, "skipping persisted configuration");
                            break;
                        }
                    };
                mold.rewards += self.field.value(key.x, key.y);

                let mut iterations = 0usize;
                loop {
                    if mold.is_goal_reached() {
                        break;
                    }
                    match mold.step(&self.field, &table, &mut self.rng) {
                        Ok((_, (ax, ay))) => {
                            mold.rewards += self.field.value(ax, ay);
                            iterations += 1;
                        }
                        Err(Error::StuckGrowth) => {
                            warn!(
                                x = key.x,
                                y = key.y,
                                iterations,
                                "evaluation episode stuck; recording partial run"
                            );
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }

                rows.push(EvalRow {
                    x: key.x,
                    y: key.y,
                    e: key.greedy_bias,
                    rewards: mold.rewards,
                    iterations,
                });
            }
        }

        Ok(rows)
    }
}

/// Renders evaluation rows with the historical stats header.
pub fn write_csv(rows: &[EvalRow], mut out: impl std::io::Write) -> std::io::Result<()> {
    writeln!(out, "x,y,e,rewards,iterations")?;
    for r in rows {
        writeln!(out, "{},{},{},{},{}", r.x, r.y, r.e, r.rewards, r.iterations)?;
    }
    Ok(())
}
