use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::SegQueue;

use crate::error::{Error, Result};

pub const TERMINATOR: u8 = b'\n';

#[derive(Debug)]
pub struct Page {
    buf: Box<[u8]>,
    len: usize,
}

impl Page {
    pub fn new(capacity: usize) -> Self {
        Page {
            buf: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid bytes: whole terminated records, except on the terminal page
    /// whose last record may lack its terminator.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The whole buffer, for the reader to fill.
    #[inline]
    pub(crate) fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    #[inline]
    pub(crate) fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.buf.len());
        self.len = len;
    }

    #[inline]
    pub fn records(&self) -> Records<'_> {
        Records {
            rest: self.as_bytes(),
            done: false,
        }
    }
}

/// Record spans of a page, terminators excluded. A trailing empty span (the
/// page ends right after a terminator, or the page is empty) is not a record.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    rest: &'a [u8],
    done: bool,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<&'a [u8]> {
        if self.done {
            return None;
        }
        match memchr::memchr(TERMINATOR, self.rest) {
            Some(at) => {
                let line = &self.rest[..at];
                self.rest = &self.rest[at + 1..];
                Some(line)
            }
            None => {
                self.done = true;
                (!self.rest.is_empty()).then_some(self.rest)
            }
        }
    }
}

/// Lock-free free list of pages shared by the reader and all workers.
#[derive(Debug)]
pub struct PagePool {
    free: SegQueue<Page>,
    page_size: usize,
    limit: Option<usize>,
    created: AtomicUsize,
}

impl PagePool {
    /// A pool that allocates a new page whenever the free list is empty.
    pub fn new(page_size: usize) -> Self {
        PagePool {
            free: SegQueue::new(),
            page_size,
            limit: None,
            created: AtomicUsize::new(0),
        }
    }

    /// A pool that never holds more than `limit` pages in total.
    pub fn bounded(page_size: usize, limit: usize) -> Self {
        PagePool {
            limit: Some(limit),
            ..PagePool::new(page_size)
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Pages allocated so far, free or in flight.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn acquire(&self) -> Result<Page> {
        if let Some(page) = self.free.pop() {
            return Ok(page);
        }
        match self.limit {
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
            }
            Some(limit) => {
                self.created
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < limit).then_some(n + 1)
                    })
                    .map_err(|_| Error::PoolExhaustion { limit })?;
            }
        }
        Ok(Page::new(self.page_size))
    }

    /// Returns a fully consumed page.
    pub fn release(&self, mut page: Page) {
        debug_assert_eq!(page.capacity(), self.page_size);
        page.set_len(0);
        self.free.push(page);
    }
}
