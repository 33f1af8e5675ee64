//! Sink-agnostic writer contract and its CSV and XLSX implementations.

use std::io::BufRead;

use crate::cache::{CacheReader, EnumCacheEntry};
use crate::conf::TUP_RECORD_CONTROL_KEYS;
use crate::report::{ReportExport, ReportExportBuilder};
use crate::spec::{EnumCellValue, EnumHeader, EnumRecordField, SpecRecord, TabularWriteError};

pub mod csv;
pub mod xlsx;

pub use self::csv::CsvWriter;
pub use self::xlsx::{SpecWorkbookProperties, XlsxWriter};

/// Shared output discipline of the tabular sinks.
///
/// Header lists are frozen by the caller and only read here.
pub trait TabularWriter {
    /// Render the header block at the current position.
    fn write_headers(&mut self, headers: &[EnumHeader]) -> Result<(), TabularWriteError>;

    /// Write one record as one row and return its schema mismatch count.
    ///
    /// With an empty header list the record's own values are written in
    /// record order.
    fn write_row(
        &mut self,
        record: &SpecRecord,
        headers: &[EnumHeader],
    ) -> Result<u64, TabularWriteError>;

    /// Write records in order and return the summed schema mismatch count.
    fn write_rows<'r, I>(
        &mut self,
        records: I,
        headers: &[EnumHeader],
    ) -> Result<u64, TabularWriteError>
    where
        I: IntoIterator<Item = &'r SpecRecord>,
        Self: Sized,
    {
        let mut cnt_schema_mismatch = 0u64;
        for record in records {
            cnt_schema_mismatch += self.write_row(record, headers)?;
        }
        Ok(cnt_schema_mismatch)
    }

    /// Close the current report section.
    fn write_separator(&mut self, headers: &[EnumHeader]) -> Result<(), TabularWriteError>;

    /// Write headers, then every entry of the cache.
    fn prepare<R: BufRead>(
        &mut self,
        reader: CacheReader<R>,
        headers: &[EnumHeader],
    ) -> Result<ReportExport, TabularWriteError>
    where
        Self: Sized,
    {
        self.write_headers(headers)?;
        write_cache_entries(self, reader, headers)
    }

    /// Flush and close the sink. Idempotent.
    fn finalize(&mut self) -> Result<(), TabularWriteError>;
}

/// Drain `reader` into `writer`, one row per record, and report the job counters.
pub fn write_cache_entries<W, R>(
    writer: &mut W,
    mut reader: CacheReader<R>,
    headers: &[EnumHeader],
) -> Result<ReportExport, TabularWriteError>
where
    W: TabularWriter + ?Sized,
    R: BufRead,
{
    let mut builder = ReportExportBuilder::default();
    for entry in reader.by_ref() {
        match entry? {
            EnumCacheEntry::Record(record) => {
                builder.add_schema_mismatch(writer.write_row(&record, headers)?);
                builder.add_row_written();
            }
            EnumCacheEntry::Separator => {
                writer.write_separator(headers)?;
                builder.add_separator();
            }
        }
    }
    builder.set_line_counts(reader.cnt_lines_read(), reader.cnt_lines_skipped());
    Ok(builder.build())
}

/// Record values in record order, nested children expanded, control keys dropped.
pub(crate) fn derive_raw_row(record: &SpecRecord) -> Vec<EnumCellValue> {
    let mut l_values = Vec::with_capacity(record.len());
    for (key, field) in record.iter() {
        if TUP_RECORD_CONTROL_KEYS.iter().any(|c_key| *c_key == key) {
            continue;
        }
        match field {
            EnumRecordField::Scalar(val) => l_values.push(val.clone()),
            EnumRecordField::Nested(children) => {
                l_values.extend(children.iter().map(|(_, val)| val.clone()));
            }
        }
    }
    l_values
}
