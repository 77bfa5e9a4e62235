#![forbid(unsafe_code)]

use mf_types::{MAX_KEY_LEN, VALUE_LIMIT_TENTHS, ValueOutOfRange};
use thiserror::Error;

/// One parsed `<key>;<value>` line.
///
/// `key` borrows from the scanned buffer; `value_tenths` is the reading at
/// the ×10 fixed-point scale; `offset` is the byte position of the
/// record's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub key: &'a [u8],
    pub value_tenths: i64,
    pub offset: usize,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{kind} at byte offset {offset}")]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub offset: usize,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    #[error("key of {len} bytes exceeds the {MAX_KEY_LEN}-byte cap")]
    KeyTooLong { len: usize },
    #[error("record ends before the `;` key delimiter")]
    MissingValueDelimiter,
    #[error("value region holds no digit")]
    MissingDigits,
    #[error("unexpected byte {byte:#04x} in value region")]
    UnexpectedByte { byte: u8 },
    #[error(transparent)]
    Value(#[from] ValueOutOfRange),
}

/// Streaming scanner over a buffer of `<key>;<value>\n` records.
///
/// Keys are yielded as zero-copy slices. Values parse by digit
/// concatenation: every digit shifts the accumulator by one decimal place
/// and `.` bytes are skipped outright, so `12.3` parses to `123`. A
/// leading `-` negates the final magnitude. The final record may omit its
/// trailing newline.
///
/// Malformed input stops the scan with a [`ScanError`] carrying the byte
/// offset; the scanner is fused after an error.
pub struct RecordScanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordScanner<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn fail(&mut self, kind: ScanErrorKind, offset: usize) -> ScanError {
        self.pos = self.buf.len();
        ScanError { kind, offset }
    }
}

impl<'a> Iterator for RecordScanner<'a> {
    type Item = Result<Record<'a>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let start = self.pos;

        // Key: everything up to the `;`.
        let mut cursor = start;
        loop {
            match self.buf.get(cursor) {
                Some(b';') => break,
                Some(b'\n') | None => {
                    return Some(Err(
                        self.fail(ScanErrorKind::MissingValueDelimiter, cursor)
                    ));
                }
                Some(_) => cursor += 1,
            }
        }
        let key = &self.buf[start..cursor];
        if key.len() > MAX_KEY_LEN {
            return Some(Err(
                self.fail(ScanErrorKind::KeyTooLong { len: key.len() }, start)
            ));
        }
        cursor += 1;

        // Value: optional sign, then digits with dots skipped.
        let negative = self.buf.get(cursor) == Some(&b'-');
        if negative {
            cursor += 1;
        }
        let mut magnitude: i64 = 0;
        let mut digits = 0usize;
        loop {
            match self.buf.get(cursor) {
                Some(b'\n') | None => break,
                Some(b'.') => cursor += 1,
                Some(&byte @ b'0'..=b'9') => {
                    magnitude = magnitude * 10 + i64::from(byte - b'0');
                    digits += 1;
                    if magnitude >= VALUE_LIMIT_TENTHS {
                        let tenths = if negative { -magnitude } else { magnitude };
                        return Some(Err(
                            self.fail(ValueOutOfRange { tenths }.into(), start)
                        ));
                    }
                    cursor += 1;
                }
                Some(&byte) => {
                    return Some(Err(
                        self.fail(ScanErrorKind::UnexpectedByte { byte }, cursor)
                    ));
                }
            }
        }
        if digits == 0 {
            return Some(Err(self.fail(ScanErrorKind::MissingDigits, cursor)));
        }
        let value_tenths = if negative { -magnitude } else { magnitude };

        self.pos = if self.buf.get(cursor) == Some(&b'\n') {
            cursor + 1
        } else {
            cursor
        };
        Some(Ok(Record {
            key,
            value_tenths,
            offset: start,
        }))
    }
}

/// Partition `buf` into at most `parts` contiguous ranges, each ending on
/// a record boundary.
///
/// A chunk that would end mid-record extends to just past the next `\n`,
/// ceding the partial line to the following chunk. Concatenating the
/// returned slices reproduces `buf` exactly.
#[must_use]
pub fn split_records(buf: &[u8], parts: usize) -> Vec<&[u8]> {
    if buf.is_empty() {
        return Vec::new();
    }
    if parts <= 1 {
        return vec![buf];
    }
    let target = buf.len().div_ceil(parts);
    let mut chunks = Vec::with_capacity(parts);
    let mut start = 0;
    while start < buf.len() {
        let mut end = (start + target).min(buf.len());
        while end < buf.len() && buf[end - 1] != b'\n' {
            end += 1;
        }
        chunks.push(&buf[start..end]);
        start = end;
    }
    chunks
}
