use crate::config::NumberMode;
use crate::error::{Error, Result};

/// Keeps the integer tenths, one digit longer, below 2^53 so the final
/// division is the only rounding step.
pub const MAX_INT_DIGITS: usize = 14;

#[inline]
fn split_sign(text: &[u8]) -> (bool, &[u8]) {
    match text {
        [b'-', rest @ ..] => (true, rest),
        [b'+', rest @ ..] => (false, rest),
        _ => (false, text),
    }
}

/// Parses `[-]d+.d`, rejecting anything else with `MalformedNumber`.
#[inline]
pub fn parse_fixed(text: &[u8]) -> Result<f64> {
    let (negative, digits) = split_sign(text);
    let [int @ .., b'.', frac] = digits else {
        return Err(Error::malformed_number(text));
    };
    if int.is_empty()
        || int.len() > MAX_INT_DIGITS
        || !frac.is_ascii_digit()
        || !int.iter().all(u8::is_ascii_digit)
    {
        return Err(Error::malformed_number(text));
    }

    let mut tenths: i64 = 0;
    for &digit in int {
        tenths = tenths * 10 + (digit - b'0') as i64;
    }
    tenths = tenths * 10 + (frac - b'0') as i64;
    let value = tenths as f64 / 10.0;
    Ok(if negative { -value } else { value })
}

/// Same arithmetic as [`parse_fixed`] with no shape check.
///
/// Only correct for well-formed input. Anything else produces an
/// unspecified value; it never panics and never reads out of bounds.
#[inline]
pub fn parse_fixed_unchecked(text: &[u8]) -> f64 {
    let (negative, digits) = split_sign(text);
    let Some((&frac, rest)) = digits.split_last() else {
        return 0.0;
    };
    let int = rest.split_last().map_or(rest, |(_, int)| int);

    let mut tenths: i64 = 0;
    for &digit in int {
        tenths = tenths
            .wrapping_mul(10)
            .wrapping_add(digit.wrapping_sub(b'0') as i64);
    }
    tenths = tenths
        .wrapping_mul(10)
        .wrapping_add(frac.wrapping_sub(b'0') as i64);
    let value = tenths as f64 / 10.0;
    if negative {
        -value
    } else {
        value
    }
}

#[inline]
pub fn parse_number(text: &[u8], mode: NumberMode) -> Result<f64> {
    match mode {
        NumberMode::Checked => parse_fixed(text),
        NumberMode::Unchecked => Ok(parse_fixed_unchecked(text)),
    }
}
