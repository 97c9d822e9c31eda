use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a run. Any of these is fatal to the whole
/// pipeline; the first one observed wins.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed record {line:?}: no ';' separator")]
    MalformedRecord { line: String },

    #[error("malformed number {text:?}: expected [-]d+.d")]
    MalformedNumber { text: String },

    #[error("page pool exhausted: all {limit} pages are in flight")]
    PoolExhaustion { limit: usize },

    #[error("record does not fit in a {capacity} byte page")]
    RecordTooLong { capacity: usize },

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn malformed_record(line: &[u8]) -> Self {
        Error::MalformedRecord {
            line: String::from_utf8_lossy(line).into_owned(),
        }
    }

    pub(crate) fn malformed_number(text: &[u8]) -> Self {
        Error::MalformedNumber {
            text: String::from_utf8_lossy(text).into_owned(),
        }
    }
}
