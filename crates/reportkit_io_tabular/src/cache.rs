//! Forward-only adapter over the line-delimited JSON record cache.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use serde_json::Value;

use crate::conf::C_CACHE_SEPARATOR;
use crate::spec::{SpecRecord, TabularWriteError};

/// One usable cache line.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCacheEntry {
    /// A record to merge/map.
    Record(SpecRecord),
    /// End of a report section.
    Separator,
}

/// Decode one cache line; `None` when it is not a record or separator.
pub fn decode_cache_line(line: &str) -> Option<EnumCacheEntry> {
    let value: Value = serde_json::from_str(line).ok()?;
    match &value {
        Value::String(text) if text == C_CACHE_SEPARATOR => Some(EnumCacheEntry::Separator),
        _ => SpecRecord::from_json(&value).map(EnumCacheEntry::Record),
    }
}

/// Decode one raw cache line; invalid UTF-8 decodes to `None` like any malformed line.
pub fn decode_cache_bytes(line: &[u8]) -> Option<EnumCacheEntry> {
    decode_cache_line(std::str::from_utf8(line).ok()?)
}

/// Lazy reader yielding decoded cache entries and skipping malformed lines.
///
/// Blank lines are ignored; any other line that does not decode is counted in
/// [`Self::cnt_lines_skipped`], invalid UTF-8 included. Only read failures
/// are yielded as errors.
pub struct CacheReader<R> {
    reader: R,
    buf_line: Vec<u8>,
    cnt_lines_read: u64,
    cnt_lines_skipped: u64,
}

impl<R: BufRead> CacheReader<R> {
    /// Wrap any buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf_line: Vec::new(),
            cnt_lines_read: 0,
            cnt_lines_skipped: 0,
        }
    }

    /// Non-blank lines consumed so far.
    pub fn cnt_lines_read(&self) -> u64 {
        self.cnt_lines_read
    }

    /// Lines dropped because they did not decode.
    pub fn cnt_lines_skipped(&self) -> u64 {
        self.cnt_lines_skipped
    }
}

impl CacheReader<BufReader<File>> {
    /// Open a cache file for reading. The file is never modified or removed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TabularWriteError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Iterator for CacheReader<R> {
    type Item = Result<EnumCacheEntry, TabularWriteError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf_line.clear();
            match self.reader.read_until(b'\n', &mut self.buf_line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(err.into())),
            }
            let line = self.buf_line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            self.cnt_lines_read += 1;

            match decode_cache_bytes(line) {
                Some(entry) => return Some(Ok(entry)),
                None => {
                    self.cnt_lines_skipped += 1;
                    debug!("Skipped undecodable cache line {}.", self.cnt_lines_read);
                }
            }
        }
    }
}
