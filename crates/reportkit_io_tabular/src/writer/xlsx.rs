//! Spreadsheet sink with real header merges, section borders, and print layout.

use std::io::BufRead;
use std::path::PathBuf;

use log::{debug, info};
use regex::Regex;
use rust_xlsxwriter::{DocProperties, Workbook};

use crate::cache::CacheReader;
use crate::conf::{
    C_FORMULA_MARKER_DATE, C_FORMULA_MARKER_TIME, C_NUM_FORMAT_DATE, C_NUM_FORMAT_TIME,
    N_NROWS_EXCEL_MAX,
};
use crate::layout::{SpecHeaderLayout, calculate_width_total, plan_header_layout};
use crate::mapper::RowMapper;
use crate::report::ReportExport;
use crate::sheet::{EnumSheetValue, SheetBuffer};
use crate::spec::{
    EnumCellValue, EnumHeader, SpecCellFormat, SpecRecord, SpecXlsxWriteOptions,
    TabularWriteError,
};
use crate::util::{derive_unique_sheet_name, parse_cell_ref, sanitize_sheet_name};
use crate::writer::{TabularWriter, derive_raw_row, write_cache_entries};

/// Workbook metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecWorkbookProperties {
    /// Author/creator.
    pub creator: String,
    /// Document title.
    pub title: String,
}

/// Stateful workbook writer.
///
/// Rows in the public API are 1-based, columns start at `A`. The workbook is
/// buffered in memory until [`TabularWriter::finalize`] saves it.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    sheets: Vec<SheetBuffer>,
    idx_sheet_active: usize,
    n_row_current: u32,
    n_row_header_end: Option<u32>,
    n_width_last_row: usize,
    write_options: SpecXlsxWriteOptions,
    properties: Option<SpecWorkbookProperties>,
    re_formula_marker: Regex,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create a writer with one empty sheet, bound to an output path.
    pub fn new(
        path_file_out: impl Into<PathBuf>,
        write_options: SpecXlsxWriteOptions,
    ) -> Result<Self, TabularWriteError> {
        check_row_num(write_options.n_row_start)?;
        let re_formula_marker = Regex::new(&format!(
            r"\b({C_FORMULA_MARKER_DATE}|{C_FORMULA_MARKER_TIME})\b"
        ))?;

        let mut sheet = SheetBuffer::new("Sheet1");
        sheet.set_landscape(write_options.if_landscape);

        Ok(Self {
            path_file_out: path_file_out.into(),
            sheets: vec![sheet],
            idx_sheet_active: 0,
            n_row_current: write_options.n_row_start,
            n_row_header_end: None,
            n_width_last_row: 0,
            write_options,
            properties: None,
            re_formula_marker,
            if_closed: false,
        })
    }

    /// Return output file path as string.
    pub fn file_out(&self) -> String {
        self.path_file_out.to_string_lossy().to_string()
    }

    /// Set workbook creator and title.
    pub fn set_properties(&mut self, creator: &str, title: &str) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        self.properties = Some(SpecWorkbookProperties {
            creator: creator.to_string(),
            title: title.to_string(),
        });
        Ok(())
    }

    /// Workbook metadata, if set.
    pub fn properties(&self) -> Option<&SpecWorkbookProperties> {
        self.properties.as_ref()
    }

    /// Create a sheet at `index` (`None` appends), activate it, and reset the row cursor.
    pub fn set_worksheet(
        &mut self,
        index: Option<usize>,
        title: Option<&str>,
    ) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        let n_count = self.sheets.len();
        let n_idx = index.unwrap_or(n_count);
        if n_idx > n_count {
            return Err(TabularWriteError::InvalidSheetIndex {
                index: n_idx,
                count: n_count,
            });
        }

        let c_name = derive_unique_sheet_name(
            &format!("Sheet{}", n_count + 1),
            self.sheets.iter().map(SheetBuffer::name),
        );
        let mut sheet = SheetBuffer::new(c_name);
        sheet.set_landscape(self.write_options.if_landscape);
        self.sheets.insert(n_idx, sheet);

        self.idx_sheet_active = n_idx;
        self.reset_cursor();
        if let Some(title) = title {
            self.set_sheet_title(title)?;
        }
        Ok(())
    }

    /// Activate an existing sheet and reset the row cursor.
    pub fn select_worksheet(&mut self, index: usize) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        if index >= self.sheets.len() {
            return Err(TabularWriteError::InvalidSheetIndex {
                index,
                count: self.sheets.len(),
            });
        }
        self.idx_sheet_active = index;
        self.reset_cursor();
        Ok(())
    }

    /// Rename the active sheet; the name is sanitized and made unique.
    pub fn set_sheet_title(&mut self, title: &str) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        let n_idx_active = self.idx_sheet_active;
        let c_name = derive_unique_sheet_name(
            &sanitize_sheet_name(title, "_"),
            self.sheets
                .iter()
                .enumerate()
                .filter(move |(n_idx, _)| *n_idx != n_idx_active)
                .map(|(_, sheet)| sheet.name()),
        );
        self.active_sheet_mut().set_name(c_name);
        Ok(())
    }

    /// Number of sheets.
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Index of the sheet receiving writes.
    pub fn active_sheet_index(&self) -> usize {
        self.idx_sheet_active
    }

    /// Buffered sheet at `index`.
    pub fn sheet(&self, index: usize) -> Option<&SheetBuffer> {
        self.sheets.get(index)
    }

    /// Sheet receiving writes.
    pub fn active_sheet(&self) -> &SheetBuffer {
        &self.sheets[self.idx_sheet_active]
    }

    /// Current 1-based row cursor.
    pub fn current_row(&self) -> u32 {
        self.n_row_current
    }

    /// Move the row cursor to `n_row` (1-based, at most the Excel row limit).
    pub fn reset_current_row(&mut self, n_row: u32) -> Result<(), TabularWriteError> {
        check_row_num(n_row)?;
        self.n_row_current = n_row;
        Ok(())
    }

    /// Insert the header block above row `n_row_init`, shifting existing rows down.
    ///
    /// The cursor moves with the content when it sat at or below `n_row_init`.
    pub fn insert_headers_before(
        &mut self,
        headers: &[EnumHeader],
        n_row_init: u32,
    ) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        check_row_num(n_row_init)?;
        if headers.is_empty() {
            return Ok(());
        }

        let layout = self.plan_layout(headers);
        let n_height = layout.height() as u32;
        self.active_sheet_mut()
            .insert_rows_before(n_row_init as usize - 1, n_height as usize)?;
        self.write_header_block(&layout, n_row_init)?;

        if self.n_row_current >= n_row_init {
            self.n_row_current = advance_row(self.n_row_current, n_height)?;
        }
        self.n_row_header_end = Some(advance_row(n_row_init, n_height)? - 1);
        Ok(())
    }

    /// Write one row of values at the cursor and advance it.
    ///
    /// Text starting with `=` is written as a formula; `DATEVALUE`/`TIMEVALUE`
    /// formulas get date/time display formats. Missing values leave the cell empty.
    pub fn write_values(
        &mut self,
        values: &[EnumCellValue],
        if_bold: bool,
    ) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        let row_idx = self.n_row_current as usize - 1;
        let fmt_text = &self.write_options.fmt_text;
        let sheet = &mut self.sheets[self.idx_sheet_active];

        for (col_idx, value) in values.iter().enumerate() {
            let value_sheet = match value {
                EnumCellValue::None => continue,
                EnumCellValue::String(text) if text.starts_with('=') => {
                    EnumSheetValue::Formula(text.clone())
                }
                _ => EnumSheetValue::Value(value.clone()),
            };
            if let EnumSheetValue::Formula(text) = &value_sheet
                && let Some(num_format) = derive_formula_num_format(&self.re_formula_marker, text)
            {
                sheet.set_num_format(row_idx, col_idx, &num_format)?;
            }
            sheet.set_cell_value(row_idx, col_idx, value_sheet)?;
            if !fmt_text.is_empty() {
                sheet.patch_format(row_idx, col_idx, fmt_text)?;
            }
        }

        if if_bold {
            for col_idx in 0..values.len() {
                sheet.set_bold(row_idx, col_idx)?;
            }
        }

        self.n_width_last_row = values.len();
        self.n_row_current = advance_row(self.n_row_current, 1)?;
        Ok(())
    }

    /// Freeze panes at `cell`.
    ///
    /// Without a cell: the configured default, else the row right below the
    /// last header block (or below the start row when no headers were written).
    pub fn freeze_panes(&mut self, cell: Option<&str>) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        let (n_row, col_idx) = match cell.filter(|text| !text.trim().is_empty()) {
            Some(text) => parse_cell_ref(text)?,
            None => match &self.write_options.cell_freeze_default {
                Some(text) => parse_cell_ref(text)?,
                None => (
                    self.n_row_header_end
                        .unwrap_or(self.write_options.n_row_start)
                        + 1,
                    0,
                ),
            },
        };
        self.active_sheet_mut()
            .freeze_panes(n_row as usize - 1, col_idx)
    }

    /// Add a horizontal page break below the row of `cell` (default: two rows above the cursor).
    pub fn add_horizontal_page_break(&mut self, cell: Option<&str>) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        let n_row = match cell.filter(|text| !text.trim().is_empty()) {
            Some(text) => parse_cell_ref(text)?.0,
            None => match self.n_row_current.checked_sub(2) {
                Some(n_row) if n_row >= 1 => n_row,
                _ => {
                    debug!(
                        "No page break: cursor at row {} leaves no row to break after.",
                        self.n_row_current
                    );
                    return Ok(());
                }
            },
        };
        self.active_sheet_mut().insert_page_break(n_row as usize - 1)
    }

    fn plan_layout(&self, headers: &[EnumHeader]) -> SpecHeaderLayout {
        plan_header_layout(
            headers,
            self.write_options.rule_header_render,
            self.write_options.if_collapse_single_row,
        )
    }

    fn write_header_block(
        &mut self,
        layout: &SpecHeaderLayout,
        n_row_init: u32,
    ) -> Result<(), TabularWriteError> {
        let row_idx_init = n_row_init as usize - 1;
        let fmt_header = &self.write_options.fmt_header;
        let if_autosize = self.write_options.if_autosize_columns;
        let sheet = &mut self.sheets[self.idx_sheet_active];

        let l_block: Vec<Vec<EnumCellValue>> = layout
            .rows
            .iter()
            .map(|v_row| {
                v_row
                    .iter()
                    .map(|text| {
                        if text.is_empty() {
                            EnumCellValue::None
                        } else {
                            EnumCellValue::String(text.clone())
                        }
                    })
                    .collect()
            })
            .collect();
        sheet.write_block(row_idx_init, 0, &l_block)?;

        for (n_row_offset, v_row) in layout.rows.iter().enumerate() {
            let row_idx = row_idx_init + n_row_offset;
            for col_idx in 0..v_row.len() {
                sheet.patch_format(row_idx, col_idx, fmt_header)?;
                if if_autosize {
                    sheet.set_autosize(col_idx);
                }
            }
        }

        for merge in &layout.merges {
            sheet.merge_range(
                row_idx_init + merge.row_idx_start,
                merge.col_idx_start,
                row_idx_init + merge.row_idx_end,
                merge.col_idx_end,
            )?;
        }
        Ok(())
    }

    fn active_sheet_mut(&mut self) -> &mut SheetBuffer {
        &mut self.sheets[self.idx_sheet_active]
    }

    fn reset_cursor(&mut self) {
        self.n_row_current = self.write_options.n_row_start;
        self.n_row_header_end = None;
        self.n_width_last_row = 0;
    }

    fn ensure_open(&self) -> Result<(), TabularWriteError> {
        if self.if_closed {
            return Err(TabularWriteError::WriterClosed);
        }
        Ok(())
    }
}

impl TabularWriter for XlsxWriter {
    fn write_headers(&mut self, headers: &[EnumHeader]) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        if headers.is_empty() {
            return Ok(());
        }
        let layout = self.plan_layout(headers);
        let n_row_init = self.n_row_current;
        self.write_header_block(&layout, n_row_init)?;

        let n_height = layout.height() as u32;
        self.n_row_current = advance_row(n_row_init, n_height)?;
        self.n_row_header_end = Some(self.n_row_current - 1);
        Ok(())
    }

    fn write_row(
        &mut self,
        record: &SpecRecord,
        headers: &[EnumHeader],
    ) -> Result<u64, TabularWriteError> {
        if headers.is_empty() {
            self.write_values(&derive_raw_row(record), record.is_row_bold())?;
            return Ok(0);
        }
        let row = RowMapper::new(headers).map(record);
        self.write_values(&row.cells, record.is_row_bold())?;
        Ok(row.cnt_schema_mismatch)
    }

    /// Bottom border across the full width of the last written row.
    fn write_separator(&mut self, headers: &[EnumHeader]) -> Result<(), TabularWriteError> {
        self.ensure_open()?;
        let n_width = if headers.is_empty() {
            self.n_width_last_row
        } else {
            calculate_width_total(headers)
        };
        let Some(n_row_prev) = self.n_row_current.checked_sub(1).filter(|n| *n >= 1) else {
            debug!("Separator before any row; nothing to border.");
            return Ok(());
        };
        if n_width == 0 {
            return Ok(());
        }

        let row_idx = n_row_prev as usize - 1;
        let fmt_separator = &self.write_options.fmt_separator;
        let sheet = &mut self.sheets[self.idx_sheet_active];
        sheet.set_border_bottom(row_idx, 0, n_width - 1, fmt_separator.bottom.unwrap_or(1))?;

        let fmt_rest = SpecCellFormat {
            bottom: None,
            ..fmt_separator.clone()
        };
        if !fmt_rest.is_empty() {
            sheet.patch_row_format(row_idx, 0, n_width - 1, &fmt_rest)?;
        }
        Ok(())
    }

    fn prepare<R: BufRead>(
        &mut self,
        reader: CacheReader<R>,
        headers: &[EnumHeader],
    ) -> Result<ReportExport, TabularWriteError>
    where
        Self: Sized,
    {
        self.write_headers(headers)?;
        if self.write_options.if_freeze_headers {
            self.freeze_panes(None)?;
        }
        write_cache_entries(self, reader, headers)
    }

    /// Render every sheet, activate the first one, and save. Idempotent.
    fn finalize(&mut self) -> Result<(), TabularWriteError> {
        if self.if_closed {
            return Ok(());
        }

        let mut workbook = Workbook::new();
        if let Some(properties) = &self.properties {
            workbook.set_properties(
                &DocProperties::new()
                    .set_author(&properties.creator)
                    .set_title(&properties.title),
            );
        }
        for (n_idx, sheet) in self.sheets.iter().enumerate() {
            let mut worksheet = sheet.render(&self.write_options.policy_autofit)?;
            if n_idx == 0 {
                worksheet.set_active(true);
            }
            workbook.push_worksheet(worksheet);
        }
        workbook.save(&self.path_file_out)?;

        self.if_closed = true;
        info!(
            "Saved workbook {} ({} sheet(s)).",
            self.path_file_out.display(),
            self.sheets.len()
        );
        Ok(())
    }
}

fn check_row_num(n_row: u32) -> Result<(), TabularWriteError> {
    if n_row == 0 || n_row as usize > N_NROWS_EXCEL_MAX {
        return Err(TabularWriteError::IndexOverflow(format!(
            "row {n_row} is outside 1..={N_NROWS_EXCEL_MAX}."
        )));
    }
    Ok(())
}

fn advance_row(n_row: u32, n_offset: u32) -> Result<u32, TabularWriteError> {
    n_row.checked_add(n_offset).ok_or_else(|| {
        TabularWriteError::IndexOverflow(format!("row cursor overflow past {n_row}."))
    })
}

/// Display format for a formula carrying date/time markers, markers joined by a space.
fn derive_formula_num_format(re_formula_marker: &Regex, formula: &str) -> Option<String> {
    let mut if_date = false;
    let mut if_time = false;
    for marker in re_formula_marker.find_iter(formula) {
        match marker.as_str() {
            C_FORMULA_MARKER_DATE => if_date = true,
            C_FORMULA_MARKER_TIME => if_time = true,
            _ => {}
        }
    }

    let mut l_formats = Vec::with_capacity(2);
    if if_date {
        l_formats.push(C_NUM_FORMAT_DATE);
    }
    if if_time {
        l_formats.push(C_NUM_FORMAT_TIME);
    }
    (!l_formats.is_empty()).then(|| l_formats.join(" "))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::*;
    use crate::sheet::SpecSheetMerge;

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

    fn writer_in(dir: &tempfile::TempDir) -> XlsxWriter {
        XlsxWriter::new(dir.path().join("out.xlsx"), SpecXlsxWriteOptions::default())
            .expect("writer")
    }

    fn text(value: &str) -> EnumSheetValue {
        EnumSheetValue::Value(EnumCellValue::String(value.to_string()))
    }

    #[test]
    fn headers_render_merges_and_advance_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        writer.write_headers(&headers_sample()).unwrap();

        let sheet = writer.active_sheet();
        assert_eq!(sheet.cell(0, 0).unwrap().value, text("Alpha"));
        assert_eq!(sheet.cell(0, 2).unwrap().value, text("Echo"));
        assert_eq!(sheet.cell(1, 3).unwrap().value, text("Hotel"));
        assert_eq!(sheet.cell(1, 0).unwrap().fmt.bold, Some(true));
        assert_eq!(sheet.merges().len(), 3);
        assert!(sheet.merges().contains(&SpecSheetMerge {
            row_idx_start: 0,
            col_idx_start: 2,
            row_idx_end: 0,
            col_idx_end: 3,
        }));
        assert_eq!(sheet.cols_autosize().len(), 4);
        assert_eq!(writer.current_row(), 3);
    }

    #[test]
    fn rows_map_under_headers_and_honor_bold_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        let l_headers = headers_sample();
        writer.write_headers(&l_headers).unwrap();
        writer
            .write_row(
                &record(r#"{"Alpha":"A1","Echo":{"Foxtrot":"F1","Hotel":"H1"}}"#),
                &l_headers,
            )
            .unwrap();
        writer
            .write_row(&record(r#"{"Bravo":7,"_bold":true}"#), &l_headers)
            .unwrap();

        let sheet = writer.active_sheet();
        assert_eq!(sheet.cell(2, 0).unwrap().value, text("A1"));
        assert!(sheet.cell(2, 1).is_none());
        assert_eq!(sheet.cell(2, 3).unwrap().value, text("H1"));
        assert_eq!(
            sheet.cell(3, 1).unwrap().value,
            EnumSheetValue::Value(EnumCellValue::Integer(7))
        );
        assert_eq!(sheet.cell(3, 3).unwrap().fmt.bold, Some(true));
        assert_eq!(writer.current_row(), 5);
    }

    #[test]
    fn headers_inserted_before_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        let l_headers = vec![EnumHeader::simple("a"), EnumHeader::simple("b")];
        writer.write_row(&record(r#"{"a":1,"b":2}"#), &l_headers).unwrap();
        writer.write_row(&record(r#"{"a":3,"b":4}"#), &l_headers).unwrap();
        assert_eq!(writer.current_row(), 3);

        writer.insert_headers_before(&l_headers, 1).unwrap();

        let sheet = writer.active_sheet();
        assert_eq!(sheet.cell(0, 1).unwrap().value, text("b"));
        assert_eq!(
            sheet.cell(1, 0).unwrap().value,
            EnumSheetValue::Value(EnumCellValue::Integer(1))
        );
        assert_eq!(
            sheet.cell(2, 1).unwrap().value,
            EnumSheetValue::Value(EnumCellValue::Integer(4))
        );
        assert_eq!(writer.current_row(), 4);
    }

    #[test]
    fn separator_borders_previous_row_full_width() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        let l_headers = headers_sample();
        writer.write_separator(&l_headers).unwrap();
        writer.write_headers(&l_headers).unwrap();
        writer.write_row(&record(r#"{"Alpha":"x"}"#), &l_headers).unwrap();
        writer.write_separator(&l_headers).unwrap();

        let sheet = writer.active_sheet();
        for col_idx in 0..4 {
            assert_eq!(sheet.cell(2, col_idx).unwrap().fmt.bottom, Some(1));
        }
        assert!(sheet.cell(2, 4).is_none());
        assert_eq!(writer.current_row(), 4);
    }

    #[test]
    fn separator_applies_configured_border_and_extra_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = XlsxWriter::new(
            dir.path().join("out.xlsx"),
            SpecXlsxWriteOptions {
                fmt_separator: SpecCellFormat {
                    bottom: Some(2),
                    italic: Some(true),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();
        writer
            .write_values(&[EnumCellValue::Integer(1), EnumCellValue::None], false)
            .unwrap();
        writer.write_separator(&[]).unwrap();

        let sheet = writer.active_sheet();
        for col_idx in 0..2 {
            let fmt = &sheet.cell(0, col_idx).unwrap().fmt;
            assert_eq!(fmt.bottom, Some(2));
            assert_eq!(fmt.italic, Some(true));
        }
    }

    #[test]
    fn row_cursor_stays_within_excel_limits() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        let l_headers = vec![EnumHeader::simple("a")];

        assert!(matches!(
            writer.reset_current_row(u32::MAX),
            Err(TabularWriteError::IndexOverflow(_))
        ));
        assert!(writer.reset_current_row(0).is_err());
        assert!(writer.insert_headers_before(&l_headers, u32::MAX).is_err());
        assert_eq!(writer.current_row(), 1);

        let n_row_last = N_NROWS_EXCEL_MAX as u32;
        writer.reset_current_row(n_row_last).unwrap();
        writer.write_values(&[EnumCellValue::None], false).unwrap();
        assert_eq!(writer.current_row(), n_row_last + 1);
        assert!(writer.write_headers(&l_headers).is_err());
        assert!(
            writer
                .write_values(&[EnumCellValue::Integer(1)], false)
                .is_err()
        );
    }

    #[test]
    fn formula_cells_get_date_time_formats() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        writer
            .write_row(
                &record(
                    r#"["=DATEVALUE(\"2024-1-2\")+TIMEVALUE(\"10:00\")","=SUM(1,2)","=TIMEVALUE(\"9:30\")","plain"]"#,
                ),
                &[],
            )
            .unwrap();

        let sheet = writer.active_sheet();
        let cell = sheet.cell(0, 0).unwrap();
        assert!(matches!(cell.value, EnumSheetValue::Formula(_)));
        assert_eq!(cell.fmt.num_format.as_deref(), Some("yyyy-m-d hh:mm:ss"));
        assert_eq!(sheet.cell(0, 1).unwrap().fmt.num_format, None);
        assert_eq!(
            sheet.cell(0, 2).unwrap().fmt.num_format.as_deref(),
            Some("hh:mm:ss")
        );
        assert_eq!(sheet.cell(0, 3).unwrap().value, text("plain"));
    }

    #[test]
    fn freeze_and_page_break_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        writer.add_horizontal_page_break(None).unwrap();
        assert!(writer.active_sheet().rows_page_break().is_empty());

        writer.write_headers(&headers_sample()).unwrap();
        writer.freeze_panes(None).unwrap();
        assert_eq!(writer.active_sheet().cell_freeze(), Some((2, 0)));

        writer.freeze_panes(Some("B4")).unwrap();
        assert_eq!(writer.active_sheet().cell_freeze(), Some((3, 1)));
        assert!(writer.freeze_panes(Some("4B")).is_err());

        for _ in 0..3 {
            writer.write_values(&[EnumCellValue::Integer(1)], false).unwrap();
        }
        writer.add_horizontal_page_break(None).unwrap();
        writer.add_horizontal_page_break(Some("A10")).unwrap();
        let l_breaks: Vec<usize> = writer.active_sheet().rows_page_break().iter().copied().collect();
        assert_eq!(l_breaks, vec![3, 9]);
    }

    #[test]
    fn configured_start_row_and_freeze_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = XlsxWriter::new(
            dir.path().join("out.xlsx"),
            SpecXlsxWriteOptions {
                n_row_start: 3,
                cell_freeze_default: Some("A3".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(writer.current_row(), 3);

        writer.freeze_panes(None).unwrap();
        assert_eq!(writer.active_sheet().cell_freeze(), Some((2, 0)));
        assert!(
            XlsxWriter::new(
                dir.path().join("bad.xlsx"),
                SpecXlsxWriteOptions {
                    n_row_start: 0,
                    ..Default::default()
                }
            )
            .is_err()
        );
    }

    #[test]
    fn worksheets_insert_at_index_and_reset_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(&dir);
        writer.write_values(&[EnumCellValue::Integer(1)], false).unwrap();

        writer.set_worksheet(Some(0), Some("Summary")).unwrap();
        assert!(writer.active_sheet().is_landscape());
        assert_eq!(writer.sheet_count(), 2);
        assert_eq!(writer.active_sheet_index(), 0);
        assert_eq!(writer.current_row(), 1);
        assert_eq!(writer.sheet(0).unwrap().name(), "Summary");
        assert_eq!(writer.sheet(1).unwrap().name(), "Sheet1");

        writer.set_worksheet(None, Some("summary")).unwrap();
        assert_eq!(writer.sheet(2).unwrap().name(), "summary__2");

        writer.set_sheet_title("Q1/Q2").unwrap();
        assert_eq!(writer.active_sheet().name(), "Q1_Q2");

        assert!(matches!(
            writer.set_worksheet(Some(9), None),
            Err(TabularWriteError::InvalidSheetIndex { index: 9, count: 3 })
        ));
        assert!(writer.select_worksheet(3).is_err());
        writer.select_worksheet(1).unwrap();
        assert_eq!(
            writer.active_sheet().cell(0, 0).unwrap().value,
            EnumSheetValue::Value(EnumCellValue::Integer(1))
        );
    }

    #[test]
    fn prepare_and_finalize_write_a_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path_out = dir.path().join("report.xlsx");
        let mut writer = XlsxWriter::new(
            &path_out,
            SpecXlsxWriteOptions {
                if_freeze_headers: true,
                ..Default::default()
            },
        )
        .unwrap();
        writer.set_properties("reports", "Daily").unwrap();
        assert_eq!(
            writer.properties(),
            Some(&SpecWorkbookProperties {
                creator: "reports".to_string(),
                title: "Daily".to_string(),
            })
        );

        let c_cache = concat!(
            "{\"Alpha\":\"A1\",\"Echo\":{\"Foxtrot\":1,\"Hotel\":2}}\n",
            "{oops\n",
            "\"---\"\n",
            "{\"Alpha\":{\"bad\":1}}\n",
        );
        let report = writer
            .prepare(CacheReader::new(Cursor::new(c_cache)), &headers_sample())
            .unwrap();
        assert_eq!(report.cnt_rows_written, 2);
        assert_eq!(report.cnt_separators, 1);
        assert_eq!(report.cnt_lines_skipped, 1);
        assert_eq!(report.cnt_schema_mismatch, 1);
        assert_eq!(writer.active_sheet().cell_freeze(), Some((2, 0)));
        assert_eq!(writer.active_sheet().cell(2, 0).unwrap().fmt.bottom, Some(1));

        writer.finalize().unwrap();
        writer.finalize().unwrap();
        assert!(matches!(
            writer.write_values(&[EnumCellValue::Integer(1)], false),
            Err(TabularWriteError::WriterClosed)
        ));

        let mut v_magic = [0u8; 2];
        std::fs::File::open(&path_out)
            .unwrap()
            .read_exact(&mut v_magic)
            .unwrap();
        assert_eq!(&v_magic, b"PK");
    }
}
