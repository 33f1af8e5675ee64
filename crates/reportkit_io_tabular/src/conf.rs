//! Tabular constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{SpecCellFormat, SpecCsvWriteOptions, SpecXlsxWriteOptions};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Cache line (JSON string) marking the end of a report section.
pub const C_CACHE_SEPARATOR: &str = "---";

/// Record key flagging a row to be rendered bold.
pub const C_RECORD_KEY_BOLD: &str = "_bold";
/// Record keys that steer rendering and never become headers.
pub const TUP_RECORD_CONTROL_KEYS: [&str; 1] = [C_RECORD_KEY_BOLD];

/// Formula marker selecting a date display format.
pub const C_FORMULA_MARKER_DATE: &str = "DATEVALUE";
/// Formula marker selecting a time display format.
pub const C_FORMULA_MARKER_TIME: &str = "TIMEVALUE";
/// Display format for date formulas.
pub const C_NUM_FORMAT_DATE: &str = "yyyy-m-d";
/// Display format for time formulas.
pub const C_NUM_FORMAT_TIME: &str = "hh:mm:ss";

/// Build default named format presets used by the XLSX writer.
pub fn derive_default_tabular_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat::default();

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert("text".to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        "header".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            valign: Some("vcenter".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "separator".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bottom: Some(1),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "date".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_DATE.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "time".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_TIME.to_string()),
            ..Default::default()
        }),
    );

    dict_fmt
}

/// Build default CSV write options.
pub fn derive_default_csv_write_options() -> SpecCsvWriteOptions {
    SpecCsvWriteOptions::default()
}

/// Build default XLSX write options.
pub fn derive_default_xlsx_write_options() -> SpecXlsxWriteOptions {
    SpecXlsxWriteOptions::default()
}
