//! Two-pass export jobs over a cache file: discover headers, then write.

use std::io::BufRead;
use std::path::Path;

use log::info;

use crate::cache::{CacheReader, EnumCacheEntry};
use crate::registry::HeaderRegistry;
use crate::report::ReportExport;
use crate::spec::{EnumHeader, SpecCsvWriteOptions, SpecXlsxWriteOptions, TabularWriteError};
use crate::writer::{CsvWriter, TabularWriter, XlsxWriter};

/// Merge every record of `reader` into a fresh registry. Separators are ignored.
pub fn collect_headers<R: BufRead>(
    reader: &mut CacheReader<R>,
) -> Result<HeaderRegistry, TabularWriteError> {
    let mut registry = HeaderRegistry::new();
    for entry in reader {
        if let EnumCacheEntry::Record(record) = entry? {
            registry.merge(&record);
        }
    }
    Ok(registry)
}

/// Discover the header list of a cache file.
pub fn collect_headers_from_cache<P: AsRef<Path>>(
    path_cache: P,
) -> Result<Vec<EnumHeader>, TabularWriteError> {
    let mut reader = CacheReader::open(path_cache)?;
    let registry = collect_headers(&mut reader)?;
    info!(
        "Collected {} header(s) from {} line(s) ({} skipped).",
        registry.headers().len(),
        reader.cnt_lines_read(),
        reader.cnt_lines_skipped()
    );
    Ok(registry.into_headers())
}

/// Write a cache file as CSV. Headers are discovered unless supplied.
pub fn export_cache_to_csv<P: AsRef<Path>, Q: AsRef<Path>>(
    path_cache: P,
    path_out: Q,
    headers: Option<&[EnumHeader]>,
    write_options: SpecCsvWriteOptions,
) -> Result<ReportExport, TabularWriteError> {
    let l_headers = match headers {
        Some(l_headers) => l_headers.to_vec(),
        None => collect_headers_from_cache(&path_cache)?,
    };

    let mut writer = CsvWriter::create(&path_out, write_options)?;
    let report = writer.prepare(CacheReader::open(&path_cache)?, &l_headers)?;
    writer.finalize()?;

    info!("{} -> {}", report.format("[EXPORT:CSV]"), path_out.as_ref().display());
    Ok(report)
}

/// Write a cache file as a single-sheet workbook. Headers are discovered unless supplied.
pub fn export_cache_to_xlsx<P: AsRef<Path>, Q: AsRef<Path>>(
    path_cache: P,
    path_out: Q,
    headers: Option<&[EnumHeader]>,
    write_options: SpecXlsxWriteOptions,
) -> Result<ReportExport, TabularWriteError> {
    let l_headers = match headers {
        Some(l_headers) => l_headers.to_vec(),
        None => collect_headers_from_cache(&path_cache)?,
    };

    let mut writer = XlsxWriter::new(path_out.as_ref(), write_options)?;
    let report = writer.prepare(CacheReader::open(&path_cache)?, &l_headers)?;
    writer.finalize()?;

    info!("{} -> {}", report.format("[EXPORT:XLSX]"), writer.file_out());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Read;

    use super::*;

    fn write_cache(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path_cache = dir.path().join("cache.jsonl");
        fs::write(
            &path_cache,
            concat!(
                "{\"Alpha\":\"A1\",\"Echo\":{\"Foxtrot\":\"F1\"}}\n",
                "not a record\n",
                "\"---\"\n",
                "{\"Bravo\":\"B2\",\"Echo\":{\"Hotel\":\"H2\",\"Foxtrot\":\"F2\"}}\n",
            ),
        )
        .unwrap();
        path_cache
    }

    #[test]
    fn collect_headers_from_cache_merges_all_records() {
        let dir = tempfile::tempdir().unwrap();
        let l_headers = collect_headers_from_cache(write_cache(&dir)).unwrap();

        assert_eq!(
            l_headers,
            vec![
                EnumHeader::simple("Alpha"),
                EnumHeader::nested("Echo", ["Foxtrot", "Hotel"]),
                EnumHeader::simple("Bravo"),
            ]
        );
    }

    #[test]
    fn export_csv_discovers_headers_and_keeps_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path_cache = write_cache(&dir);
        let path_out = dir.path().join("out.csv");

        let report =
            export_cache_to_csv(&path_cache, &path_out, None, SpecCsvWriteOptions::default())
                .unwrap();

        assert_eq!(
            fs::read_to_string(&path_out).unwrap(),
            "Alpha,Echo,,Bravo\n,Foxtrot,Hotel,\nA1,F1,,\n,F2,H2,B2\n"
        );
        assert_eq!(report.cnt_rows_written, 2);
        assert_eq!(report.cnt_lines_skipped, 1);
        assert!(path_cache.exists());
    }

    #[test]
    fn export_csv_with_supplied_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path_out = dir.path().join("out.csv");
        let l_headers = vec![EnumHeader::simple("Bravo"), EnumHeader::simple("Alpha")];

        export_cache_to_csv(
            write_cache(&dir),
            &path_out,
            Some(l_headers.as_slice()),
            SpecCsvWriteOptions::default(),
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&path_out).unwrap(), "Bravo,Alpha\n,A1\nB2,\n");
    }

    #[test]
    fn export_xlsx_writes_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path_out = dir.path().join("out.xlsx");

        let report = export_cache_to_xlsx(
            write_cache(&dir),
            &path_out,
            None,
            SpecXlsxWriteOptions::default(),
        )
        .unwrap();
        assert_eq!(report.cnt_separators, 1);

        let mut v_magic = [0u8; 2];
        fs::File::open(&path_out)
            .unwrap()
            .read_exact(&mut v_magic)
            .unwrap();
        assert_eq!(&v_magic, b"PK");
    }

    #[test]
    fn missing_cache_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            export_cache_to_csv(
                dir.path().join("absent.jsonl"),
                dir.path().join("out.csv"),
                None,
                SpecCsvWriteOptions::default(),
            ),
            Err(TabularWriteError::Io(_))
        ));
    }
}
