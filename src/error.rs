use std::path::PathBuf;

/// Library-wide error taxonomy.
///
/// Configuration problems (`MalformedGrid`, `InvalidStart`) fail fast at
/// construction and are never retried. `StuckGrowth` is an episode-level
/// condition the trainer recovers from by restarting the episode.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("wall layout must be rectangular and non-empty")]
    MalformedGrid,

    #[error("growth cannot start at ({0}, {1}): wall or out of bounds")]
    InvalidStart(usize, usize),

    #[error("frontier exhausted before the goal band was covered")]
    StuckGrowth,

    #[error("storage I/O at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("table encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
