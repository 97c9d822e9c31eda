use crate::config::NumberMode;
use crate::error::{Error, Result};
use crate::number::parse_number;

pub const SEPARATOR: u8 = b';';

/// One parsed record. `key` borrows from the page it was read from and must
/// be copied before it outlives that page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    pub key: &'a [u8],
    pub value: f64,
}

/// Splits a record (terminator excluded) into key and numeric literal.
///
/// The separator is searched from the right: the literal is at most a
/// handful of bytes while keys are arbitrary length.
#[inline]
pub fn split_line(line: &[u8]) -> Result<(&[u8], &[u8])> {
    match memchr::memrchr(SEPARATOR, line) {
        Some(at) => Ok((&line[..at], &line[at + 1..])),
        None => Err(Error::malformed_record(line)),
    }
}

#[inline]
pub fn parse_line(line: &[u8], mode: NumberMode) -> Result<Record<'_>> {
    let (key, literal) = split_line(line)?;
    let value = parse_number(literal, mode)?;
    Ok(Record { key, value })
}
