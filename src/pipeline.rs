use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::queue::SegQueue;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{Config, InputMode, NumberMode, StoreKind};
use crate::error::{Error, Result};
use crate::format::Summary;
use crate::line::parse_line;
use crate::pool::{Page, PagePool};
use crate::reader::ChunkReader;
use crate::store::{HashStore, SortedStore, Store};

/// Cancellation shared by the reader and the workers. The first error
/// reported is kept, later ones are dropped.
#[derive(Debug, Default)]
struct Abort {
    cancelled: AtomicBool,
    first: OnceLock<Error>,
}

impl Abort {
    fn fail(&self, err: Error) {
        if let Err(err) = self.first.set(err) {
            debug!(%err, "discarding error after cancellation");
        } else {
            warn!("pipeline cancelled");
        }
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn into_error(self) -> Option<Error> {
        self.first.into_inner()
    }
}

pub fn solve_path(path: &Path, config: &Config) -> Result<Summary> {
    config.validate()?;
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    match config.input {
        InputMode::Read => solve_reader(file, config),
        InputMode::Mmap => {
            // SAFETY: the input is append-only and not truncated while we run.
            let mmap = unsafe { memmap2::Mmap::map(&file) }?;
            #[cfg(unix)]
            if !mmap.is_empty() {
                mmap.advise(memmap2::Advice::Sequential)?;
            }
            solve_reader(&mmap[..], config)
        }
    }
}

pub fn solve_reader<R: Read + Send>(source: R, config: &Config) -> Result<Summary> {
    config.validate()?;
    match config.store {
        StoreKind::Hash => run::<HashStore, R>(source, config).map(Summary::from_store),
        StoreKind::Sorted => run::<SortedStore, R>(source, config).map(Summary::from_store),
    }
}

/// Runs the reader and `config.workers` workers to completion and merges
/// their stores.
pub fn run<S: Store, R: Read + Send>(source: R, config: &Config) -> Result<S> {
    let pool = match config.pool_limit {
        Some(limit) => PagePool::bounded(config.page_size, limit),
        None => PagePool::new(config.page_size),
    };
    let abort = Abort::default();
    let finished = SegQueue::new();
    let (tx, rx) = channel::bounded::<Page>(config.queue_depth);

    // One extra thread for the reader so every worker can block on the
    // channel at the same time.
    let threads = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers + 1)
        .thread_name(|i| format!("brc-{i}"))
        .build()?;

    threads.scope(|s| {
        for id in 0..config.workers {
            let pages = rx.clone();
            let (pool, abort, finished) = (&pool, &abort, &finished);
            let mode = config.number;
            s.spawn(move |_| {
                if let Some(store) = work::<S>(id, pages, pool, abort, mode) {
                    finished.push(store);
                }
            });
        }
        drop(rx);
        read_pages(source, &pool, tx, &abort);
    });

    if let Some(err) = abort.into_error() {
        return Err(err);
    }

    let stores = std::iter::from_fn(|| finished.pop()).collect::<Vec<S>>();
    let merged = merge_stores(stores);
    info!(
        workers = config.workers,
        page_size = config.page_size,
        pages_allocated = pool.created(),
        keys = merged.len(),
        "aggregation complete"
    );
    Ok(merged)
}

/// Feeds pages to the workers until the input ends or the run is cancelled.
/// Dropping `pages` on return closes the channel.
fn read_pages<R: Read>(source: R, pool: &PagePool, pages: Sender<Page>, abort: &Abort) {
    let mut reader = ChunkReader::new(source);
    while !abort.is_cancelled() {
        match reader.next_page(pool) {
            Ok(Some(page)) => {
                // Fails only once every worker has bailed out.
                if pages.send(page).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                abort.fail(err);
                break;
            }
        }
    }
    debug!(pages = reader.pages(), bytes = reader.bytes(), "reader finished");
}

fn work<S: Store>(
    id: usize,
    pages: Receiver<Page>,
    pool: &PagePool,
    abort: &Abort,
    mode: NumberMode,
) -> Option<S> {
    let mut store = S::default();
    let (mut drained, mut records) = (0u64, 0u64);
    for page in pages.iter() {
        if abort.is_cancelled() {
            return None;
        }
        match drain_page(&page, &mut store, mode) {
            Ok(n) => records += n,
            Err(err) => {
                abort.fail(err);
                return None;
            }
        }
        pool.release(page);
        drained += 1;
    }
    debug!(worker = id, pages = drained, records, keys = store.len(), "worker finished");
    Some(store)
}

/// Parses every record of `page` into `store`; returns the record count.
#[inline]
pub fn drain_page<S: Store>(page: &Page, store: &mut S, mode: NumberMode) -> Result<u64> {
    let mut records = 0;
    for line in page.records() {
        let record = parse_line(line, mode)?;
        store.update(record.key, record.value);
        records += 1;
    }
    Ok(records)
}

/// Folds worker stores pairwise. Any grouping gives the same result.
pub fn merge_stores<S: Store>(stores: Vec<S>) -> S {
    stores.into_par_iter().reduce(S::default, |mut acc, store| {
        acc.merge(store);
        acc
    })
}

#[cfg(test)]
mod tests {
    use std::io::{self, ErrorKind};

    use super::*;

    /// Serves `data` in small reads, then fails.
    struct FailingSource {
        data: &'static [u8],
    }

    impl Read for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "source went away"));
            }
            let n = buf.len().min(self.data.len()).min(7);
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn config(workers: usize, page_size: usize) -> Config {
        Config {
            page_size,
            ..Config::with_workers(workers)
        }
    }

    fn solve(input: &[u8], config: &Config) -> Result<String> {
        solve_reader(input, config).map(|summary| summary.to_string())
    }

    #[test]
    fn test_scenario_two_keys() {
        let input = b"A;1.0\nB;2.0\nA;3.0\n";
        for workers in [1, 2, 4] {
            for page_size in [8, 16, 4096] {
                for store in [StoreKind::Hash, StoreKind::Sorted] {
                    let config = Config { store, ..config(workers, page_size) };
                    assert_eq!(
                        solve(input, &config).unwrap(),
                        "{A=1.0/2.0/3.0,B=2.0/2.0/2.0}\n",
                        "workers {workers}, page size {page_size}, {store:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_scenario_negative_mean() {
        let out = solve(b"C;-3.4\nC;1.0\n", &config(3, 16)).unwrap();
        assert_eq!(out, "{C=-3.4/-1.2/1.0}\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(solve(b"", &config(2, 64)).unwrap(), "{}\n");
    }

    #[test]
    fn test_malformed_record_is_fatal() {
        let input = b"A;1.0\noops\nB;2.0\n";
        let err = solve(input, &config(2, 16)).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { ref line } if line == "oops"));
    }

    #[test]
    fn test_blank_line_is_fatal_for_any_page_size() {
        let input = b"A;1.0\n\nB;2.0\n";
        for page_size in [8, 9, 12, 16, 4096] {
            for workers in [1, 3] {
                let err = solve(input, &config(workers, page_size)).unwrap_err();
                assert!(
                    matches!(err, Error::MalformedRecord { ref line } if line.is_empty()),
                    "page size {page_size}, workers {workers}: {err:?}"
                );
            }
        }
    }

    #[test]
    fn test_malformed_number_is_fatal_when_checked() {
        let input = b"A;1.0\nB;2.25\n";
        let err = solve(input, &config(2, 4096)).unwrap_err();
        assert!(matches!(err, Error::MalformedNumber { ref text } if text == "2.25"));

        let unchecked = Config {
            number: NumberMode::Unchecked,
            ..config(2, 4096)
        };
        assert!(solve(input, &unchecked).is_ok());
    }

    #[test]
    fn test_record_too_long_is_fatal() {
        let err = solve(b"A very long station name;1.0\n", &config(2, 8)).unwrap_err();
        assert!(matches!(err, Error::RecordTooLong { capacity: 8 }));
    }

    #[test]
    fn test_read_error_after_dispatch_cancels_run() {
        static INPUT: &[u8] = b"K;1.0\nK;2.0\nK;3.0\nK;4.0\nK;5.0\nK;6.0\nK;7.0\nK;8.0\n";
        for workers in [1, 4] {
            let source = FailingSource { data: INPUT };
            let err = solve_reader(source, &config(workers, 16)).unwrap_err();
            assert!(
                matches!(err, Error::Io(ref e) if e.kind() == ErrorKind::BrokenPipe),
                "workers {workers}: {err:?}"
            );
        }
    }

    #[test]
    fn test_bounded_pool_exhaustion() {
        // Nobody drains the channel, so the reader ends up holding every page.
        let input = "K;1.0\n".repeat(100);
        let pool = PagePool::bounded(16, 2);
        let abort = Abort::default();
        let (tx, rx) = channel::bounded::<Page>(8);
        read_pages(input.as_bytes(), &pool, tx, &abort);

        assert_eq!(rx.len(), 2);
        assert!(abort.is_cancelled());
        assert!(matches!(abort.into_error(), Some(Error::PoolExhaustion { limit: 2 })));
    }

    #[test]
    fn test_invalid_config() {
        let err = solve(b"A;1.0\n", &config(0, 4096)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_merge_stores_empty() {
        let merged: HashStore = merge_stores(Vec::new());
        assert!(merged.is_empty());
    }
}
