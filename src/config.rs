use std::num::NonZeroUsize;

use clap::ValueEnum;

use crate::error::{Error, Result};

/// 64 KiB, sixteen 4 KiB OS pages.
pub const DEFAULT_PAGE_SIZE: usize = 1 << 16;
/// Pages queued per worker before the reader blocks.
pub const QUEUE_PAGES_PER_WORKER: usize = 10;
/// Smallest page that still holds a record and its terminator.
pub const MIN_PAGE_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StoreKind {
    /// hashbrown map, sorted once before output.
    #[default]
    Hash,
    /// Binary-searched vector kept in key order. Only worth it for a few
    /// hundred distinct keys.
    Sorted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberMode {
    /// Validate `[-]d+.d` before converting; bad input is an error.
    #[default]
    Checked,
    /// Skip validation. Malformed input yields an unspecified value.
    Unchecked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Plain `read(2)` calls into pooled pages.
    #[default]
    Read,
    /// Map the file and copy out of the mapping into pooled pages.
    Mmap,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub workers: usize,
    pub page_size: usize,
    pub queue_depth: usize,
    pub store: StoreKind,
    pub number: NumberMode,
    pub input: InputMode,
    /// `None` lets the pool grow on demand.
    pub pool_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::with_workers(workers)
    }
}

impl Config {
    pub fn with_workers(workers: usize) -> Self {
        Config {
            workers,
            page_size: DEFAULT_PAGE_SIZE,
            queue_depth: workers.max(1) * QUEUE_PAGES_PER_WORKER,
            store: StoreKind::default(),
            number: NumberMode::default(),
            input: InputMode::default(),
            pool_limit: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".into()));
        }
        if self.queue_depth == 0 {
            return Err(Error::Config("queue depth must be positive".into()));
        }
        if self.page_size < MIN_PAGE_SIZE {
            return Err(Error::Config(format!(
                "page size {} is below the minimum of {MIN_PAGE_SIZE} bytes",
                self.page_size
            )));
        }
        if self.pool_limit == Some(0) {
            return Err(Error::Config("pool limit must be positive".into()));
        }
        Ok(())
    }
}
