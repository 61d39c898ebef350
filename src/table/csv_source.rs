use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::mapper::Row;
use crate::error::{GpkgError, Result};

/// Delimiters tried by [`sniff_delimiter`], in order of preference.
pub const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

const SNIFF_SAMPLE_BYTES: u64 = 1024;
const SNIFF_MAX_LINES: usize = 10;

/// Guess the delimiter of a CSV sample.
///
/// A candidate qualifies when it occurs the same non-zero number of times
/// (outside double quotes) on each of the first lines; the most frequent
/// qualifying candidate wins. A sample in which no candidate occurs at all is a
/// single-column file and gets `,`. Returns `None` when no candidate qualifies.
pub fn sniff_delimiter(sample: &str) -> Option<u8> {
    let mut lines: Vec<&str> = sample.lines().filter(|line| !line.is_empty()).collect();
    // The sample may end in the middle of a line.
    if lines.len() > 1 && !sample.ends_with('\n') {
        lines.pop();
    }
    lines.truncate(SNIFF_MAX_LINES);
    if lines.is_empty() {
        return None;
    }

    let mut best: Option<(u8, usize)> = None;
    let mut seen_any = false;
    for delimiter in CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_unquoted(line, delimiter))
            .collect();
        seen_any |= counts.iter().any(|count| *count > 0);

        let first = counts[0];
        if first == 0 || counts.iter().any(|count| *count != first) {
            continue;
        }
        if best.is_none_or(|(_, best_count)| first > best_count) {
            best = Some((delimiter, first));
        }
    }

    match best {
        Some((delimiter, _)) => Some(delimiter),
        None if !seen_any => Some(b','),
        None => None,
    }
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// A CSV file with a header row, read record by record.
pub struct CsvSource {
    headers: Vec<String>,
    reader: csv::Reader<File>,
}

impl CsvSource {
    /// Open `path`, sniffing the delimiter when none is given.
    pub fn open<P: AsRef<Path>>(path: P, delimiter: Option<u8>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GpkgError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let delimiter = match delimiter {
            Some(delimiter) => delimiter,
            None => {
                let mut sample = Vec::new();
                File::open(path)?
                    .take(SNIFF_SAMPLE_BYTES)
                    .read_to_end(&mut sample)?;
                sniff_delimiter(&String::from_utf8_lossy(&sample))
                    .ok_or(GpkgError::UndecidableDelimiter)?
            }
        };
        debug!(path = %path.display(), delimiter = %char::from(delimiter).escape_default(), "opening CSV");

        // Short records are allowed; their missing fields read as empty.
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let headers = reader.headers()?.iter().map(str::to_string).collect();

        Ok(Self { headers, reader })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Consume the source, yielding each record keyed by header.
    ///
    /// A record with more fields than the header is an error; a shorter one
    /// simply lacks the trailing keys.
    pub fn rows(self) -> impl Iterator<Item = Result<Row>> {
        let Self { headers, reader } = self;
        reader
            .into_records()
            .enumerate()
            .map(move |(idx, record)| {
                let record = record?;
                if record.len() > headers.len() {
                    return Err(GpkgError::TooManyFields {
                        row: idx + 1,
                        expected: headers.len(),
                        found: record.len(),
                    });
                }
                Ok(headers
                    .iter()
                    .cloned()
                    .zip(record.iter().map(str::to_string))
                    .collect())
            })
    }
}

/// Derive a layer name from a file name: the lower-cased stem with every run of
/// characters outside `[a-z0-9]` replaced by a single `_`.
pub fn layer_name_from_path<P: AsRef<Path>>(path: P) -> String {
    let stem = path
        .as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut name = String::with_capacity(stem.len());
    for c in stem.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            name.push(c);
        } else if !name.is_empty() && !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_end_matches('_');

    if name.is_empty() {
        "layer".to_string()
    } else {
        name.to_string()
    }
}
