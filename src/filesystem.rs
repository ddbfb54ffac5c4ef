//! Helpers for mapping request paths onto the filesystem

use crate::errors::{Error, Result};

/// Normalizes a path.
///
/// The following operations are performed:
///
/// 1. Sequences of multiple `'/'` characters are collapsed into a single `'/'`.
/// 2. Any leading `'/'` is stripped. (If the request path doesn’t lead with a
///    slash, the path is ill-formed for our purposes and we return an `Err`).
/// 3. Percent-encoded bytes are decoded. Bogus percent-encoding, like `b"%bo"`,
///    will return `Err`.
pub fn normalize_path(path: &[u8]) -> Result<Vec<u8>> {
    if path.first() != Some(&b'/') {
        return Err(Error::PathNotInOriginForm);
    }

    let mut buffer = Vec::with_capacity(path.len() - 1);
    let mut i = 1;

    // skip leading '/' characters
    while i < path.len() && path[i] == b'/' {
        i += 1;
    }

    while i < path.len() {
        match path[i] {
            b'/' => {
                buffer.push(b'/');
                while i < path.len() && path[i] == b'/' {
                    i += 1;
                }
            }
            b'%' => {
                buffer.push(decode_escape(path, i)?);
                i += 3;
            }
            b => {
                buffer.push(b);
                i += 1;
            }
        }
    }

    Ok(buffer)
}

/// Decodes every `%XX` escape in `input`, leaving everything else alone.
pub fn percent_decode(input: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        if input[i] == b'%' {
            buffer.push(decode_escape(input, i)?);
            i += 3;
        } else {
            buffer.push(input[i]);
            i += 1;
        }
    }

    Ok(buffer)
}

/// Decodes the escape starting at the `'%'` at `input[i]`
fn decode_escape(input: &[u8], i: usize) -> Result<u8> {
    if input.len() < i + 3 {
        return Err(Error::IllegalPercentEncoding);
    }

    match (from_hexit(input[i + 1]), from_hexit(input[i + 2])) {
        (Some(high_nybble), Some(low_nybble)) => Ok(high_nybble << 4 | low_nybble),
        _ => Err(Error::IllegalPercentEncoding),
    }
}

/// Converts from a hexadecimal digit to its value
fn from_hexit(x: u8) -> Option<u8> {
    match x {
        b'0'..=b'9' => Some(x - b'0'),
        b'A'..=b'F' => Some(x - b'A' + 10),
        b'a'..=b'f' => Some(x - b'a' + 10),
        _ => None,
    }
}
