//! Streaming CSV sink.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use ::csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use log::debug;

use crate::layout::plan_header_layout;
use crate::mapper::RowMapper;
use crate::spec::{
    EnumCellValue, EnumHeader, EnumHeaderRenderMode, SpecCsvWriteOptions, SpecRecord,
    TabularWriteError,
};
use crate::writer::{TabularWriter, derive_raw_row};

/// CSV writer: flatten-mode header rows, then one line per record.
///
/// Fields containing the delimiter, a quote, or a line break are quoted with
/// inner quotes doubled; every line ends with a single `\n`.
pub struct CsvWriter<W: Write> {
    writer: Writer<W>,
    write_options: SpecCsvWriteOptions,
    if_closed: bool,
}

impl<W: Write> CsvWriter<W> {
    /// Wrap any byte sink.
    pub fn from_writer(sink: W, write_options: SpecCsvWriteOptions) -> Self {
        let writer = WriterBuilder::new()
            .flexible(true)
            .delimiter(write_options.delimiter)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(sink);
        Self {
            writer,
            write_options,
            if_closed: false,
        }
    }

    /// Write one line of already-mapped values. Empty rows are skipped.
    pub fn write_values(&mut self, values: &[EnumCellValue]) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        if values.is_empty() {
            debug!("Skipped empty CSV row.");
            return Ok(());
        }
        self.writer
            .write_record(values.iter().map(EnumCellValue::to_text))?;
        Ok(())
    }

    /// Flush and hand back the underlying sink.
    pub fn into_inner(mut self) -> Result<W, TabularWriteError> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|err| TabularWriteError::Io(err.into_error()))
    }

    fn ensure_open(&self) -> Result<(), TabularWriteError> {
        if self.if_closed {
            return Err(TabularWriteError::WriterClosed);
        }
        Ok(())
    }
}

impl CsvWriter<File> {
    /// Create (truncate) `path` and write CSV into it.
    pub fn create<P: AsRef<Path>>(
        path: P,
        write_options: SpecCsvWriteOptions,
    ) -> Result<Self, TabularWriteError> {
        Ok(Self::from_writer(File::create(path)?, write_options))
    }
}

impl<W: Write> TabularWriter for CsvWriter<W> {
    fn write_headers(&mut self, headers: &[EnumHeader]) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        if headers.is_empty() {
            return Ok(());
        }
        let rule_render = match self.write_options.rule_header_render {
            EnumHeaderRenderMode::ChildrenOnly => EnumHeaderRenderMode::ChildrenOnly,
            EnumHeaderRenderMode::Merge | EnumHeaderRenderMode::Flatten => {
                EnumHeaderRenderMode::Flatten
            }
        };
        let layout =
            plan_header_layout(headers, rule_render, self.write_options.if_collapse_single_row);
        for v_row in &layout.rows {
            if v_row.is_empty() {
                continue;
            }
            self.writer.write_record(v_row)?;
        }
        Ok(())
    }

    fn write_row(
        &mut self,
        record: &SpecRecord,
        headers: &[EnumHeader],
    ) -> Result<u64, TabularWriteError> {
        if headers.is_empty() {
            self.write_values(&derive_raw_row(record))?;
            return Ok(0);
        }
        let row = RowMapper::new(headers).map(record);
        self.write_values(&row.cells)?;
        Ok(row.cnt_schema_mismatch)
    }

    fn write_separator(&mut self, _headers: &[EnumHeader]) -> Result<(), TabularWriteError> {
        self.ensure_open()
    }

    fn finalize(&mut self) -> Result<(), TabularWriteError> {
        if self.if_closed {
            return Ok(());
        }
        self.writer.flush()?;
        self.if_closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::cache::CacheReader;

    fn record(text: &str) -> SpecRecord {
        SpecRecord::from_json_str(text).expect("valid record")
    }

    fn headers_sample() -> Vec<EnumHeader> {
        vec![
            EnumHeader::simple("Alpha"),
            EnumHeader::simple("Bravo"),
            EnumHeader::nested("Echo", ["Foxtrot", "Hotel"]),
        ]
    }

    fn render(writer: CsvWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner().expect("flush")).expect("utf8")
    }

    #[test]
    fn raw_rows_are_quoted_when_needed() {
        let mut writer = CsvWriter::from_writer(Vec::new(), SpecCsvWriteOptions::default());
        writer.write_row(&record(r#"["a","b","c,","d"]"#), &[]).unwrap();
        writer.write_row(&record(r#"["e","f","g","h"]"#), &[]).unwrap();

        assert_eq!(render(writer), "a,b,\"c,\",d\ne,f,g,h\n");
    }

    #[test]
    fn nested_headers_write_two_padded_rows() {
        let l_headers = headers_sample();
        let mut writer = CsvWriter::from_writer(Vec::new(), SpecCsvWriteOptions::default());
        writer.write_headers(&l_headers).unwrap();
        writer
            .write_row(
                &record(r#"{"Alpha":"A1","Echo":{"Foxtrot":"F1","Hotel":"H1"},"Zulu":1}"#),
                &l_headers,
            )
            .unwrap();

        assert_eq!(
            render(writer),
            "Alpha,Bravo,Echo,\n,,Foxtrot,Hotel\nA1,,F1,H1\n"
        );
    }

    #[test]
    fn simple_headers_collapse_to_one_row() {
        let l_headers = vec![EnumHeader::simple("Alpha"), EnumHeader::simple("Bravo")];
        let mut writer = CsvWriter::from_writer(
            Vec::new(),
            SpecCsvWriteOptions {
                rule_header_render: EnumHeaderRenderMode::Merge,
                ..Default::default()
            },
        );
        writer.write_headers(&l_headers).unwrap();
        writer
            .write_row(&record(r#"{"Bravo":true,"Alpha":1.5}"#), &l_headers)
            .unwrap();

        assert_eq!(render(writer), "Alpha,Bravo\n1.5,true\n");
    }

    #[test]
    fn children_only_mode_and_custom_delimiter() {
        let mut writer = CsvWriter::from_writer(
            Vec::new(),
            SpecCsvWriteOptions {
                rule_header_render: EnumHeaderRenderMode::ChildrenOnly,
                delimiter: b';',
                ..Default::default()
            },
        );
        writer.write_headers(&headers_sample()).unwrap();

        assert_eq!(render(writer), "Alpha;Bravo;Foxtrot;Hotel\n");
    }

    #[test]
    fn output_round_trips_through_csv_reader() {
        let mut writer = CsvWriter::from_writer(Vec::new(), SpecCsvWriteOptions::default());
        writer
            .write_row(&record(r#"["c,","say \"hi\"","plain"]"#), &[])
            .unwrap();
        let c_text = render(writer);

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(c_text.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.iter().collect::<Vec<_>>(), vec!["c,", "say \"hi\"", "plain"]);
    }

    #[test]
    fn prepare_streams_cache_and_ignores_separators() {
        let l_headers = vec![EnumHeader::simple("a")];
        let c_cache = "{\"a\":1}\nbroken\n\"---\"\n{\"a\":2,\"b\":3}\n";
        let mut writer = CsvWriter::from_writer(Vec::new(), SpecCsvWriteOptions::default());

        let report = writer
            .prepare(CacheReader::new(Cursor::new(c_cache)), &l_headers)
            .unwrap();
        writer.finalize().unwrap();
        writer.finalize().unwrap();
        assert!(matches!(
            writer.write_values(&[EnumCellValue::Integer(1)]),
            Err(TabularWriteError::WriterClosed)
        ));

        assert_eq!(report.cnt_rows_written, 2);
        assert_eq!(report.cnt_separators, 1);
        assert_eq!(report.cnt_lines_skipped, 1);
        assert_eq!(render(writer), "a\n1\n2\n");
    }

    #[test]
    fn prepare_skips_invalid_utf8_line() {
        let l_headers = vec![EnumHeader::simple("a")];
        let mut v_cache = b"{\"a\":1}\n{\"a\":\"".to_vec();
        v_cache.extend_from_slice(&[0xff, 0xfe]);
        v_cache.extend_from_slice(b"\"}\n{\"a\":2}\n");
        let mut writer = CsvWriter::from_writer(Vec::new(), SpecCsvWriteOptions::default());

        let report = writer
            .prepare(CacheReader::new(Cursor::new(v_cache)), &l_headers)
            .unwrap();
        writer.finalize().unwrap();

        assert_eq!(report.cnt_rows_written, 2);
        assert_eq!(report.cnt_lines_skipped, 1);
        assert_eq!(render(writer), "a\n1\n2\n");
    }
}
