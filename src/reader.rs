use std::io::{ErrorKind, Read};

use crate::error::{Error, Result};
use crate::pool::{Page, PagePool, TERMINATOR};

/// Typical upper bound on a record; the carry grows past it if needed.
const CARRY_CAPACITY: usize = 128;

/// Cuts a byte stream into pages that never split a record.
///
/// After each read the unterminated tail of the page is moved into `carry`
/// and copied to the front of the next page. Only the final page, produced
/// at end of input, may end without a terminator.
#[derive(Debug)]
pub struct ChunkReader<R> {
    source: R,
    carry: Vec<u8>,
    finished: bool,
    pages: u64,
    bytes: u64,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(source: R) -> Self {
        ChunkReader {
            source,
            carry: Vec::with_capacity(CARRY_CAPACITY),
            finished: false,
            pages: 0,
            bytes: 0,
        }
    }

    /// Pages produced so far.
    pub fn pages(&self) -> u64 {
        self.pages
    }

    /// Bytes pulled from the source so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Fills the next page from the pool, or returns `None` once the terminal
    /// page has been handed out. The terminal page holds whatever was carried
    /// over and may be empty.
    pub fn next_page(&mut self, pool: &PagePool) -> Result<Option<Page>> {
        if self.finished {
            return Ok(None);
        }

        let mut page = pool.acquire()?;
        let capacity = page.capacity();
        let buf = page.buffer_mut();

        // The carry always follows a terminator inside a full page, so it is
        // strictly shorter than a page.
        let offset = self.carry.len();
        buf[..offset].copy_from_slice(&self.carry);
        self.carry.clear();

        let (filled, eof) = fill(&mut self.source, buf, offset)?;
        self.bytes += (filled - offset) as u64;
        self.pages += 1;

        if eof {
            self.finished = true;
            page.set_len(filled);
            return Ok(Some(page));
        }

        match memchr::memrchr(TERMINATOR, &buf[..filled]) {
            Some(at) => {
                self.carry.extend_from_slice(&buf[at + 1..filled]);
                // Keep the terminator so a blank line just before the cut is
                // still seen as an empty record.
                page.set_len(at + 1);
                Ok(Some(page))
            }
            None => Err(Error::RecordTooLong { capacity }),
        }
    }
}

/// Reads until `buf` is full or the source is exhausted. Returns the filled
/// length and whether end of input was seen.
fn fill<R: Read>(source: &mut R, buf: &mut [u8], mut filled: usize) -> Result<(usize, bool)> {
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => return Ok((filled, true)),
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::Io(err)),
        }
    }
    Ok((filled, false))
}
