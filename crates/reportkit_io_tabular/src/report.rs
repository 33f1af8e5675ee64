//! Export report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters and diagnostics for one export job.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportExport {
    /// Non-blank cache lines consumed.
    pub cnt_lines_read: u64,
    /// Cache lines skipped because they did not decode.
    pub cnt_lines_skipped: u64,
    /// Data rows written to the sink.
    pub cnt_rows_written: u64,
    /// Section separators met in the stream.
    pub cnt_separators: u64,
    /// Fields treated as missing because their kind contradicted the header.
    pub cnt_schema_mismatch: u64,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportExport {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_lines_read".to_string(), self.cnt_lines_read);
        dict_counts.insert("cnt_lines_skipped".to_string(), self.cnt_lines_skipped);
        dict_counts.insert("cnt_rows_written".to_string(), self.cnt_rows_written);
        dict_counts.insert("cnt_separators".to_string(), self.cnt_separators);
        dict_counts.insert("cnt_schema_mismatch".to_string(), self.cnt_schema_mismatch);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} read={} skipped={} written={} separators={} mismatches={} warnings={}",
            self.cnt_lines_read,
            self.cnt_lines_skipped,
            self.cnt_rows_written,
            self.cnt_separators,
            self.cnt_schema_mismatch,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[EXPORT]"))
    }
}

/// Mutable accumulator for export statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportExportBuilder {
    /// See [`ReportExport::cnt_lines_read`].
    pub cnt_lines_read: u64,
    /// See [`ReportExport::cnt_lines_skipped`].
    pub cnt_lines_skipped: u64,
    /// See [`ReportExport::cnt_rows_written`].
    pub cnt_rows_written: u64,
    /// See [`ReportExport::cnt_separators`].
    pub cnt_separators: u64,
    /// See [`ReportExport::cnt_schema_mismatch`].
    pub cnt_schema_mismatch: u64,
    /// See [`ReportExport::warnings`].
    pub warnings: Vec<String>,
}

impl ReportExportBuilder {
    /// Increment written-row count by one.
    pub fn add_row_written(&mut self) {
        self.cnt_rows_written += 1;
    }

    /// Increment separator count by one.
    pub fn add_separator(&mut self) {
        self.cnt_separators += 1;
    }

    /// Add schema mismatches found while mapping one row.
    pub fn add_schema_mismatch(&mut self, value: u64) {
        self.cnt_schema_mismatch += value;
    }

    /// Record reader-side line counters.
    pub fn set_line_counts(&mut self, cnt_lines_read: u64, cnt_lines_skipped: u64) {
        self.cnt_lines_read = cnt_lines_read;
        self.cnt_lines_skipped = cnt_lines_skipped;
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: impl AsRef<str>) {
        self.warnings.push(warning.as_ref().to_string());
    }

    /// Finalize builder into immutable report.
    pub fn build(mut self) -> ReportExport {
        if self.cnt_lines_skipped > 0 {
            let c_warning = format!(
                "Skipped {} undecodable cache line(s).",
                self.cnt_lines_skipped
            );
            self.add_warning(c_warning);
        }
        if self.cnt_schema_mismatch > 0 {
            let c_warning = format!(
                "{} field(s) contradicted their header kind and were written as missing.",
                self.cnt_schema_mismatch
            );
            self.add_warning(c_warning);
        }
        ReportExport {
            cnt_lines_read: self.cnt_lines_read,
            cnt_lines_skipped: self.cnt_lines_skipped,
            cnt_rows_written: self.cnt_rows_written,
            cnt_separators: self.cnt_separators,
            cnt_schema_mismatch: self.cnt_schema_mismatch,
            warnings: self.warnings,
        }
    }
}
