use std::fmt;
use std::io::{self, Write};

use crate::store::{OwnedKey, Statistics, Store};

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}/{:.1}/{:.1}", self.min, self.mean(), self.max)
    }
}

/// Global store: every worker's entries folded together, ascending by key.
/// Built once and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    entries: Vec<(OwnedKey, Statistics)>,
}

impl Summary {
    pub fn from_store<S: Store>(store: S) -> Self {
        Summary {
            entries: store.into_sorted(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<&Statistics> {
        self.entries
            .binary_search_by(|(k, _)| k.as_ref().cmp(key))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Statistics)> {
        self.entries.iter().map(|(key, stats)| (key.as_ref(), stats))
    }

    pub fn total_records(&self) -> u64 {
        self.entries.iter().map(|(_, stats)| stats.count).sum()
    }

    /// Streams the output line to `out`. Keys are written as raw bytes.
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        out.write_all(b"{")?;
        for (i, (key, stats)) in self.iter().enumerate() {
            if i != 0 {
                out.write_all(b",")?;
            }
            out.write_all(key)?;
            write!(out, "={stats}")?;
        }
        out.write_all(b"}\n")
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, stats)) in self.iter().enumerate() {
            if i != 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={stats}", String::from_utf8_lossy(key))?;
        }
        f.write_str("}\n")
    }
}
