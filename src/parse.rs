//! Tolerant reader for the delimited RNC dataset.
//!
//! The published file has drifted between UTF-8 and Windows-1252 over time.
//! Parsing first tries UTF-8; if that attempt fails the stream is rewound and
//! decoded once more as Windows-1252. There is no third attempt.
//!
//! Row rules:
//!
//! - the first row is a header and is always skipped, whatever it contains;
//! - rows with fewer than [`MIN_COLUMNS`] columns are skipped silently;
//! - columns are positional: 0 → RNC, 1 → legal name, 2 → commercial name,
//!   4 → status. Column 3 is ignored.
//!
//! Stray quote characters are kept literally rather than rejected. Inside an
//! unquoted field the reader already does this. Inside a quoted field, a `"`
//! that is not doubled and not followed by the delimiter, a line break or
//! end of input is escaped by [`escape_stray_quotes`] before the reader sees it.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use csv::StringRecord;
use thiserror::Error;

use crate::models::RawRecord;

/// Rows shorter than this are treated as malformed and skipped.
pub const MIN_COLUMNS: usize = 5;

const COL_RNC: usize = 0;
const COL_LEGAL_NAME: usize = 1;
const COL_COMMERCIAL_NAME: usize = 2;
const COL_STATUS: usize = 4;

/// Raised when neither encoding yields a readable table.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("dataset is not readable as UTF-8 ({primary}) nor as Windows-1252 ({fallback})")]
    BothEncodingsFailed {
        primary: csv::Error,
        fallback: csv::Error,
    },
    #[error("failed to rewind dataset for the Windows-1252 attempt: {0}")]
    Rewind(#[source] io::Error),
}

/// Encoding that produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Windows1252,
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceEncoding::Utf8 => f.write_str("utf-8"),
            SourceEncoding::Windows1252 => f.write_str("windows-1252"),
        }
    }
}

/// Outcome of the primary (UTF-8) decode.
#[derive(Debug)]
pub enum DecodeAttempt {
    Success(Vec<RawRecord>),
    PrimaryDecodeFailed(csv::Error),
}

/// Records read from one dataset file.
#[derive(Debug)]
pub struct ParsedDataset {
    pub records: Vec<RawRecord>,
    pub encoding: SourceEncoding,
}

/// Reads dataset files into [`RawRecord`]s.
#[derive(Debug, Clone, Copy)]
pub struct RecordParser {
    delimiter: u8,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl RecordParser {
    /// Parser splitting columns on `delimiter`.
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Opens and parses the file at `path`.
    ///
    /// An I/O failure opening the file is returned as-is so the caller can
    /// tell a missing dataset from an undecodable one.
    pub fn parse_file(&self, path: &Path) -> io::Result<Result<ParsedDataset, DecodeError>> {
        let file = File::open(path)?;
        Ok(self.parse(BufReader::new(file)))
    }

    /// Parses a seekable byte stream, falling back to Windows-1252 once.
    pub fn parse<R: Read + Seek>(&self, mut reader: R) -> Result<ParsedDataset, DecodeError> {
        let primary = match self.decode_utf8(&mut reader) {
            DecodeAttempt::Success(records) => {
                return Ok(ParsedDataset {
                    records,
                    encoding: SourceEncoding::Utf8,
                })
            }
            DecodeAttempt::PrimaryDecodeFailed(err) => err,
        };

        reader
            .seek(SeekFrom::Start(0))
            .map_err(DecodeError::Rewind)?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(DecodeError::Rewind)?;

        self.decode_legacy(&bytes)
            .map(|records| ParsedDataset {
                records,
                encoding: SourceEncoding::Windows1252,
            })
            .map_err(|fallback| DecodeError::BothEncodingsFailed { primary, fallback })
    }

    /// Primary attempt: the stream as UTF-8 delimited text.
    pub fn decode_utf8<R: Read>(&self, reader: R) -> DecodeAttempt {
        match self.read_rows(reader) {
            Ok(records) => DecodeAttempt::Success(records),
            Err(err) => DecodeAttempt::PrimaryDecodeFailed(err),
        }
    }

    /// Fallback attempt: the whole byte buffer as Windows-1252.
    pub fn decode_legacy(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, csv::Error> {
        let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
        self.read_rows(text.as_bytes())
    }

    fn read_rows<R: Read>(&self, mut reader: R) -> Result<Vec<RawRecord>, csv::Error> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let escaped = escape_stray_quotes(&raw, self.delimiter);

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(escaped.as_slice());

        let mut records = Vec::new();
        for (i, row) in rdr.records().enumerate() {
            let row = row?;
            if i == 0 {
                continue;
            }
            if let Some(raw) = row_to_raw(&row) {
                records.push(raw);
            }
        }
        Ok(records)
    }
}

/// Doubles every `"` inside a quoted field that would otherwise end the
/// field early.
///
/// A quote inside a quoted field closes it only when followed by the
/// delimiter, `\r`, `\n` or end of input; `""` is left as an escaped pair.
/// Works on bytes: `"`, line breaks and an ASCII delimiter never occur inside
/// a multi-byte UTF-8 sequence, and invalid UTF-8 is passed through for the
/// reader to reject.
pub fn escape_stray_quotes(input: &[u8], delimiter: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut at_field_start = true;
    let mut in_quotes = false;
    let mut i = 0;

    while i < input.len() {
        let b = input[i];
        if in_quotes {
            if b == b'"' {
                match input.get(i + 1) {
                    Some(b'"') => {
                        out.extend_from_slice(b"\"\"");
                        i += 2;
                        continue;
                    }
                    None | Some(b'\r') | Some(b'\n') => in_quotes = false,
                    Some(&next) if next == delimiter => in_quotes = false,
                    Some(_) => {
                        out.extend_from_slice(b"\"\"");
                        i += 1;
                        continue;
                    }
                }
            }
            out.push(b);
        } else {
            if at_field_start && b == b'"' {
                in_quotes = true;
            }
            out.push(b);
            at_field_start = b == delimiter || b == b'\n' || b == b'\r';
        }
        i += 1;
    }
    out
}

fn row_to_raw(row: &StringRecord) -> Option<RawRecord> {
    if row.len() < MIN_COLUMNS {
        return None;
    }
    let field = |idx: usize| row.get(idx).unwrap_or_default().trim().to_string();
    Some(RawRecord {
        rnc: field(COL_RNC),
        legal_name: field(COL_LEGAL_NAME),
        commercial_name: field(COL_COMMERCIAL_NAME),
        status: field(COL_STATUS),
    })
}
