//! `reportkit_io_tabular` v1:
//! Rust-side tabular report kernel (CSV and XLSX from a JSON-lines record cache).
//!
//! Modules:
//! - `conf`     : constants and default presets
//! - `spec`     : specs/models/options/errors
//! - `registry` : incremental header discovery
//! - `layout`   : column spans and header-row rendering
//! - `mapper`   : record-to-row mapping
//! - `cache`    : line-delimited cache reader
//! - `sheet`    : buffered worksheet model
//! - `report`   : export job report
//! - `util`     : pure helper functions
//! - `writer`   : CSV and XLSX sinks
//! - `export`   : two-pass export jobs
pub mod cache;
pub mod conf;
pub mod export;
pub mod layout;
pub mod mapper;
pub mod registry;
pub mod report;
pub mod sheet;
pub mod spec;
pub mod util;
pub mod writer;

pub use cache::{CacheReader, EnumCacheEntry, decode_cache_bytes, decode_cache_line};
pub use conf::{
    C_CACHE_SEPARATOR, C_RECORD_KEY_BOLD, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX,
    N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL, derive_default_csv_write_options,
    derive_default_tabular_formats, derive_default_xlsx_write_options,
};
pub use export::{
    collect_headers, collect_headers_from_cache, export_cache_to_csv, export_cache_to_xlsx,
};
pub use layout::{
    SpecColumnSpan, SpecHeaderLayout, SpecHeaderMerge, calculate_width_total,
    plan_column_spans, plan_header_layout,
};
pub use mapper::{RowMapper, SpecMappedRow, map_record_to_row};
pub use registry::{HeaderRegistry, merge_headers};
pub use report::{ReportExport, ReportExportBuilder};
pub use sheet::{EnumSheetValue, SheetBuffer, SpecSheetCell, SpecSheetMerge};
pub use spec::{
    EnumCellValue, EnumHeader, EnumHeaderRenderMode, EnumRecordField, SpecAutofitCellsPolicy,
    SpecCellFormat, SpecCsvWriteOptions, SpecRecord, SpecXlsxWriteOptions, TabularWriteError,
};
pub use util::{
    derive_cell_ref, derive_column_label, derive_range_ref, parse_cell_ref, sanitize_sheet_name,
};
pub use writer::{CsvWriter, SpecWorkbookProperties, TabularWriter, XlsxWriter};
