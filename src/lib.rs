//! Per-key min/mean/max over huge `<key>;<value>` files.

pub mod config;
pub mod error;
pub mod format;
pub mod line;
pub mod number;
pub mod pipeline;
pub mod pool;
pub mod reader;
pub mod store;

pub use config::{Config, InputMode, NumberMode, StoreKind};
pub use error::{Error, Result};
pub use format::Summary;
pub use pipeline::{solve_path, solve_reader};
pub use store::{HashStore, SortedStore, Statistics, Store};
