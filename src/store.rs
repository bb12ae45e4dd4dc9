use std::fs;
use std::path::PathBuf;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::qtable::QTable;

/// Identifies one training configuration: seed cell plus greedy bias.
///
/// Biases are fractions in `(0, 1)`; the artifact name encodes only the
/// fraction digits, so earlier artifact directories keep resuming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunKey {
    pub x: usize,
    pub y: usize,
    pub greedy_bias: f64,
}

impl RunKey {
    /// Deterministic artifact name, e.g. `learn_4_4_35.json` for bias 0.35.
    pub fn file_name(&self) -> String {
        let printed = format!("{}", self.greedy_bias);
        let frac = printed.split_once('.').map(|(_, f)| f).unwrap_or("0");
        format!("learn_{}_{}_{}.json", self.x, self.y, frac)
    }

    /// Inverse of `file_name`; `None` for files that are not artifacts.
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".json")?;
        let mut parts = stem.split('_');
        if parts.next()? != "learn" {
            return None;
        }
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let frac = parts.next()?;
        if parts.next().is_some() || frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let greedy_bias: f64 = format!("0.{frac}").parse().ok()?;
        Some(Self { x, y, greedy_bias })
    }
}

/// Keyed artifact storage for trained tables.
///
/// `exists` is a plain probe, not a lock: two sweeps aimed at the same
/// store race unsafely. That is acceptable for a single-operator workflow;
/// do not point concurrent sweeps at one location.
pub trait TableStore {
    fn exists(&self, key: &RunKey) -> bool;
    fn put(&mut self, key: &RunKey, table: &QTable) -> Result<()>;
    fn get(&self, key: &RunKey) -> Result<Option<QTable>>;
    /// Every key currently persisted, in a stable order, for evaluation.
    fn keys(&self) -> Result<Vec<RunKey>>;
}

/// One JSON file per configuration under a directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::Storage {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    /// Default location under the platform data directory
    /// (e.g. `~/.local/share/physarum` on Linux).
    pub fn open_default() -> Result<Self> {
        let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self::open(base.join("physarum"))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, key: &RunKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl TableStore for FsStore {
    fn exists(&self, key: &RunKey) -> bool {
        self.path_for(key).exists()
    }

    fn put(&mut self, key: &RunKey, table: &QTable) -> Result<()> {
        let path = self.path_for(key);
        let json = serde_json::to_vec(table)?;
        fs::write(&path, json).map_err(|e| Error::Storage { path, source: e })?;
        Ok(())
    }

    fn get(&self, key: &RunKey) -> Result<Option<QTable>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| Error::Storage { path, source: e })?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn keys(&self) -> Result<Vec<RunKey>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::Storage {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::Storage {
                path: self.dir.clone(),
                source: e,
            })?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(key) = RunKey::parse_file_name(name) {
                    keys.push(key);
                }
            }
        }
        sort_keys(&mut keys);
        Ok(keys)
    }
}

/// In-memory store, used by tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, (RunKey, QTable)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemoryStore {
    fn exists(&self, key: &RunKey) -> bool {
        self.tables.contains_key(&key.file_name())
    }

    fn put(&mut self, key: &RunKey, table: &QTable) -> Result<()> {
        self.tables.insert(key.file_name(), (*key, table.clone()));
        Ok(())
    }

    fn get(&self, key: &RunKey) -> Result<Option<QTable>> {
        Ok(self.tables.get(&key.file_name()).map(|(_, t)| t.clone()))
    }

    fn keys(&self) -> Result<Vec<RunKey>> {
        let mut keys: Vec<RunKey> = self.tables.values().map(|(k, _)| *k).collect();
        sort_keys(&mut keys);
        Ok(keys)
    }
}

fn sort_keys(keys: &mut [RunKey]) {
    keys.sort_by(|a, b| {
        (a.x, a.y)
            .cmp(&(b.x, b.y))
            .then(a.greedy_bias.partial_cmp(&b.greedy_bias).unwrap_or(std::cmp::Ordering::Equal))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("physarum_store_{}_{}", tag, std::process::id()))
    }

    #[test]
    fn file_names_round_trip() {
        let key = RunKey {
            x: 4,
            y: 7,
            greedy_bias: 0.35,
        };
        assert_eq!(key.file_name(), "learn_4_7_35.json");
        let parsed = RunKey::parse_file_name("learn_4_7_35.json").unwrap();
        assert_eq!(parsed, key);

        assert!(RunKey::parse_file_name("stats.csv").is_none());
        assert!(RunKey::parse_file_name("learn_4_7.json").is_none());
        assert!(RunKey::parse_file_name("learn_4_7_x5.json").is_none());
    }

    #[test]
    fn memory_store_probe_put_get() {
        let mut store = MemoryStore::new();
        let key = RunKey {
            x: 1,
            y: 2,
            greedy_bias: 0.5,
        };
        assert!(!store.exists(&key));
        assert!(store.get(&key).unwrap().is_none());

        let mut table = QTable::new(3, 3);
        table.set(2, (1, 1), 0.75);
        store.put(&key, &table).unwrap();

        assert!(store.exists(&key));
        let back = store.get(&key).unwrap().unwrap();
        assert_eq!(back.get(2, (1, 1)), 0.75);
        assert_eq!(store.keys().unwrap().len(), 1);
    }

    #[test]
    fn fs_store_round_trips_and_lists_keys() {
        let dir = unique_temp_dir("roundtrip");
        let _ = fs::remove_dir_all(&dir);
        let mut store = FsStore::open(&dir).unwrap();

        let a = RunKey {
            x: 0,
            y: 1,
            greedy_bias: 0.25,
        };
        let b = RunKey {
            x: 2,
            y: 2,
            greedy_bias: 0.9,
        };
        let mut table = QTable::new(4, 4);
        table.set(3, (2, 2), -0.5);

        store.put(&a, &table).unwrap();
        store.put(&b, &table).unwrap();
        // Non-artifact files are ignored by the key scan.
        fs::write(dir.join("stats.csv"), b"x,y,e,rewards,iterations\n").unwrap();

        assert!(store.exists(&a));
        let keys = store.keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!((keys[0].x, keys[0].y), (0, 1));

        let back = store.get(&a).unwrap().unwrap();
        assert_eq!(back.get(3, (2, 2)), -0.5);

        let _ = fs::remove_dir_all(&dir);
    }
}
