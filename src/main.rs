use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use brc_stream::config::DEFAULT_PAGE_SIZE;
use brc_stream::{solve_path, Config, InputMode, NumberMode, StoreKind};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Prints `{key=min/mean/max,...}` for a file of `<key>;<value>` lines.
#[derive(Parser, Debug)]
#[command(name = "brc-stream", version)]
struct Cli {
    /// Input file.
    path: PathBuf,

    /// Worker threads [default: available parallelism]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Bytes per page.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Pages queued between reader and workers [default: 10 per worker]
    #[arg(long)]
    queue_depth: Option<usize>,

    #[arg(long, value_enum, default_value_t = StoreKind::Hash)]
    store: StoreKind,

    /// Skip validating the `[-]d+.d` value shape.
    #[arg(long)]
    unchecked: bool,

    /// Read the input through a memory map.
    #[arg(long)]
    mmap: bool,

    /// Fail instead of allocating more than this many pages.
    #[arg(long)]
    pool_limit: Option<usize>,

    /// Report wall time on stderr.
    #[arg(long)]
    time: bool,

    /// More logging on stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = match self.workers {
            Some(workers) => Config::with_workers(workers),
            None => Config::default(),
        };
        config.page_size = self.page_size;
        if let Some(depth) = self.queue_depth {
            config.queue_depth = depth;
        }
        config.store = self.store;
        if self.unchecked {
            config.number = NumberMode::Unchecked;
        }
        if self.mmap {
            config.input = InputMode::Mmap;
        }
        config.pool_limit = self.pool_limit;
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("brc-stream: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.config();
    let (summary, elapsed) = timeit(|| solve_path(&cli.path, &config));
    let summary = summary.with_context(|| format!("failed to solve {}", cli.path.display()))?;

    let mut out = BufWriter::new(io::stdout().lock());
    summary.write_to(&mut out).context("failed to write output")?;
    out.flush().context("failed to write output")?;

    if cli.time {
        eprintln!("elapsed: {elapsed:?} ({} records)", summary.total_records());
    }
    Ok(())
}

fn timeit<T, F: FnOnce() -> T>(f: F) -> (T, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}
