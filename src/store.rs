use std::cmp::Ordering;

use hashbrown::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl Statistics {
    #[inline]
    pub fn new(value: f64) -> Self {
        Statistics {
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    #[inline]
    pub fn update(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    #[inline]
    pub fn merge(&mut self, other: &Statistics) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

pub type OwnedKey = Box<[u8]>;

/// Key to [`Statistics`] mapping. Keys passed to [`Store::update`] are
/// borrowed from a page and copied only when first seen.
pub trait Store: Default + Send {
    type IntoEntries: Iterator<Item = (OwnedKey, Statistics)>;

    fn update(&mut self, key: &[u8], value: f64);

    /// Folds `stats` into the entry for `key`, creating it if absent.
    fn merge_entry(&mut self, key: OwnedKey, stats: Statistics);

    fn get(&self, key: &[u8]) -> Option<&Statistics>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the store. Entry order is unspecified.
    fn into_entries(self) -> Self::IntoEntries;

    /// Consumes the store, entries in ascending byte-wise key order.
    fn into_sorted(self) -> Vec<(OwnedKey, Statistics)> {
        let mut entries = self.into_entries().collect::<Vec<_>>();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn merge(&mut self, other: Self) {
        for (key, stats) in other.into_entries() {
            self.merge_entry(key, stats);
        }
    }
}

/// O(1) amortized updates; sorted only on demand.
#[derive(Debug, Default)]
pub struct HashStore {
    entries: HashMap<OwnedKey, Statistics, ahash::RandomState>,
}

impl Store for HashStore {
    type IntoEntries = hashbrown::hash_map::IntoIter<OwnedKey, Statistics>;

    #[inline]
    fn update(&mut self, key: &[u8], value: f64) {
        match self.entries.get_mut(key) {
            Some(stats) => stats.update(value),
            None => {
                self.entries.insert(key.into(), Statistics::new(value));
            }
        }
    }

    fn merge_entry(&mut self, key: OwnedKey, stats: Statistics) {
        self.entries
            .entry(key)
            .and_modify(|e| e.merge(&stats))
            .or_insert(stats);
    }

    fn get(&self, key: &[u8]) -> Option<&Statistics> {
        self.entries.get(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn into_entries(self) -> Self::IntoEntries {
        self.entries.into_iter()
    }
}

/// Entries kept in strictly ascending key order. Lookup is a binary search,
/// inserting shifts the tail, so this only pays off while the key set is
/// small.
#[derive(Debug, Default)]
pub struct SortedStore {
    entries: Vec<(OwnedKey, Statistics)>,
}

impl SortedStore {
    #[inline]
    fn search(&self, key: &[u8]) -> Result<usize, usize> {
        self.entries.binary_search_by(|(k, _)| k.as_ref().cmp(key))
    }
}

impl Store for SortedStore {
    type IntoEntries = std::vec::IntoIter<(OwnedKey, Statistics)>;

    #[inline]
    fn update(&mut self, key: &[u8], value: f64) {
        match self.search(key) {
            Ok(i) => self.entries[i].1.update(value),
            Err(i) => self.entries.insert(i, (key.into(), Statistics::new(value))),
        }
    }

    fn merge_entry(&mut self, key: OwnedKey, stats: Statistics) {
        match self.search(&key) {
            Ok(i) => self.entries[i].1.merge(&stats),
            Err(i) => self.entries.insert(i, (key, stats)),
        }
    }

    fn get(&self, key: &[u8]) -> Option<&Statistics> {
        self.search(key).ok().map(|i| &self.entries[i].1)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn into_entries(self) -> Self::IntoEntries {
        self.entries.into_iter()
    }

    /// Already in order, no sort pass.
    fn into_sorted(self) -> Vec<(OwnedKey, Statistics)> {
        self.entries
    }

    /// Both sides are already ordered, so this is a linear two-way merge.
    fn merge(&mut self, other: Self) {
        let mut merged = Vec::with_capacity(self.entries.len() + other.entries.len());
        let mut left = std::mem::take(&mut self.entries).into_iter().peekable();
        let mut right = other.entries.into_iter().peekable();
        loop {
            let order = match (left.peek(), right.peek()) {
                (Some(a), Some(b)) => a.0.cmp(&b.0),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };
            match order {
                Ordering::Less => merged.extend(left.next()),
                Ordering::Greater => merged.extend(right.next()),
                Ordering::Equal => {
                    if let (Some((key, mut stats)), Some((_, other))) = (left.next(), right.next()) {
                        stats.merge(&other);
                        merged.push((key, stats));
                    }
                }
            }
        }
        self.entries = merged;
    }
}
