//! Line splitting and field classification.
//!
//! Works on raw bytes so that a payload is never copied or re-validated
//! here; only the `id` field has to be valid UTF-8.

use bytes::{Buf, Bytes, BytesMut};
use bytes_utils::Str;

use super::constants::{COLON, CR, LF};

/// A line borrowed from the buffer, before ownership is taken.
#[derive(Debug, Clone, Copy)]
enum RawLine<'a> {
    Comment,
    Field {
        name: &'a [u8],
        value: Option<&'a [u8]>,
    },
    Empty,
}

/// A complete, classified line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    /// `:`-prefixed line.
    Comment,
    /// Blank line, terminates the current block.
    Empty,
    /// `data` field. A bare `data` line carries an empty value.
    Data(Bytes),
    /// `id` field. `None` means the value was absent, not valid UTF-8, or
    /// contained a NUL byte, in which case the line is ignored.
    Id(Option<Str>),
    /// Any other field (`event`, `retry`, unknown names). Ignored.
    Other,
}

/// Finds the next end-of-line in `bytes`.
///
/// Returns `(line_end, remainder_start)`. Returns `None` when more data is
/// needed, including when the buffer ends in a CR that may be half of a CRLF.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let at = memchr::memchr2(CR, LF, bytes)?;

    if bytes[at] == LF {
        return Some((at, at + 1));
    }
    match bytes.get(at + 1) {
        None => None,
        Some(&LF) => Some((at, at + 2)),
        Some(_) => Some((at, at + 1)),
    }
}

fn read_line(bytes: &[u8]) -> RawLine<'_> {
    if bytes.is_empty() {
        return RawLine::Empty;
    }
    match memchr::memchr(COLON, bytes) {
        Some(0) => RawLine::Comment,
        Some(colon) => {
            let value = &bytes[colon + 1..];
            let value = value.strip_prefix(b" ").unwrap_or(value);
            RawLine::Field {
                name: &bytes[..colon],
                value: Some(value),
            }
        }
        None => RawLine::Field {
            name: bytes,
            value: None,
        },
    }
}

fn id_value(value: Bytes) -> Option<Str> {
    if memchr::memchr(0, &value).is_some() {
        return None;
    }
    match str::from_utf8(&value) {
        // Safety: the bytes were validated as UTF-8 just above.
        Ok(_) => Some(unsafe { Str::from_inner_unchecked(value) }),
        Err(_) => None,
    }
}

/// Split the next complete line off the front of `buffer` and classify it.
///
/// Returns `None` if the buffer holds no complete line yet; the buffer is
/// left untouched in that case.
pub(crate) fn next_line(buffer: &mut BytesMut) -> Option<Line> {
    let (line_end, rest_start) = find_eol(buffer)?;

    let line = buffer.split_to(line_end).freeze();
    buffer.advance(rest_start - line_end);

    let classified = match read_line(&line) {
        RawLine::Empty => Line::Empty,
        RawLine::Comment => Line::Comment,
        RawLine::Field { name, value } => {
            let value = value.map(|value| line.slice_ref(value));
            match name {
                b"data" => Line::Data(value.unwrap_or_default()),
                b"id" => Line::Id(value.and_then(id_value)),
                _ => Line::Other,
            }
        }
    };
    Some(classified)
}
