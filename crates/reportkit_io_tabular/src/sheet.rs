//! In-memory worksheet model rendered into `rust_xlsxwriter` at save time.
//!
//! `rust_xlsxwriter` streams cells forward and cannot shift rows, patch styles
//! after the fact, or insert a sheet before an existing one. The sheet is kept
//! here until the workbook is finalized so that row insertion, separator
//! borders, and late freeze/page-break calls all stay possible.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Formula, Worksheet};

use crate::spec::{EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat, TabularWriteError};
use crate::util::{cast_col_num, cast_row_num, estimate_unicode_string_width};

////////////////////////////////////////////////////////////////////////////////
// #region SheetModels

/// Content of one buffered cell.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumSheetValue {
    /// Plain value (`EnumCellValue::None` renders as a styled blank).
    Value(EnumCellValue),
    /// Formula text, leading `=` included.
    Formula(String),
}

impl EnumSheetValue {
    /// Display text used for merges and width estimation.
    pub fn to_text(&self) -> String {
        match self {
            Self::Value(val) => val.to_text(),
            Self::Formula(text) => text.clone(),
        }
    }
}

/// One buffered cell: value plus its accumulated format.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSheetCell {
    /// Cell content.
    pub value: EnumSheetValue,
    /// Format overlay applied at render.
    pub fmt: SpecCellFormat,
}

impl Default for SpecSheetCell {
    fn default() -> Self {
        Self {
            value: EnumSheetValue::Value(EnumCellValue::None),
            fmt: SpecCellFormat::default(),
        }
    }
}

/// Rectangular merge, 0-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecSheetMerge {
    /// First row.
    pub row_idx_start: usize,
    /// First column.
    pub col_idx_start: usize,
    /// Last row.
    pub row_idx_end: usize,
    /// Last column.
    pub col_idx_end: usize,
}

impl SpecSheetMerge {
    fn contains(&self, row_idx: usize, col_idx: usize) -> bool {
        (self.row_idx_start..=self.row_idx_end).contains(&row_idx)
            && (self.col_idx_start..=self.col_idx_end).contains(&col_idx)
    }

    fn overlaps(&self, other: &SpecSheetMerge) -> bool {
        self.row_idx_start <= other.row_idx_end
            && other.row_idx_start <= self.row_idx_end
            && self.col_idx_start <= other.col_idx_end
            && other.col_idx_start <= self.col_idx_end
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetBuffer

/// Buffered worksheet. All row/column indices are 0-based.
#[derive(Debug, Clone, Default)]
pub struct SheetBuffer {
    name: String,
    cells: BTreeMap<(usize, usize), SpecSheetCell>,
    merges: Vec<SpecSheetMerge>,
    cols_autosize: BTreeSet<usize>,
    cell_freeze: Option<(usize, usize)>,
    rows_page_break: BTreeSet<usize>,
    if_landscape: bool,
}

impl SheetBuffer {
    /// Create an empty sheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sheet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the sheet (caller sanitizes).
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Use landscape page orientation.
    pub fn set_landscape(&mut self, if_landscape: bool) {
        self.if_landscape = if_landscape;
    }

    /// Whether landscape orientation is set.
    pub fn is_landscape(&self) -> bool {
        self.if_landscape
    }

    /// Buffered cell at `(row_idx, col_idx)`.
    pub fn cell(&self, row_idx: usize, col_idx: usize) -> Option<&SpecSheetCell> {
        self.cells.get(&(row_idx, col_idx))
    }

    /// Number of rows spanned by buffered cells.
    pub fn n_rows_used(&self) -> usize {
        self.cells
            .keys()
            .map(|(row_idx, _)| row_idx + 1)
            .max()
            .unwrap_or(0)
    }

    /// Recorded merges.
    pub fn merges(&self) -> &[SpecSheetMerge] {
        &self.merges
    }

    /// Columns flagged for autosize.
    pub fn cols_autosize(&self) -> &BTreeSet<usize> {
        &self.cols_autosize
    }

    /// Top-left cell of the scrolling pane, if frozen.
    pub fn cell_freeze(&self) -> Option<(usize, usize)> {
        self.cell_freeze
    }

    /// Rows carrying a page break below them.
    pub fn rows_page_break(&self) -> &BTreeSet<usize> {
        &self.rows_page_break
    }

    /// Set a cell's value, keeping any format already patched onto it.
    pub fn set_cell_value(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        value: EnumSheetValue,
    ) -> Result<(), TabularWriteError> {
        cast_row_num(row_idx)?;
        cast_col_num(col_idx)?;
        self.cells.entry((row_idx, col_idx)).or_default().value = value;
        Ok(())
    }

    /// Overlay `patch` onto one cell's format, creating a blank cell if needed.
    pub fn patch_format(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        patch: &SpecCellFormat,
    ) -> Result<(), TabularWriteError> {
        cast_row_num(row_idx)?;
        cast_col_num(col_idx)?;
        let cell = self.cells.entry((row_idx, col_idx)).or_default();
        cell.fmt = cell.fmt.merge(patch);
        Ok(())
    }

    /// Overlay `patch` onto columns `col_idx_start..=col_idx_end` of one row.
    pub fn patch_row_format(
        &mut self,
        row_idx: usize,
        col_idx_start: usize,
        col_idx_end: usize,
        patch: &SpecCellFormat,
    ) -> Result<(), TabularWriteError> {
        for col_idx in col_idx_start..=col_idx_end {
            self.patch_format(row_idx, col_idx, patch)?;
        }
        Ok(())
    }

    /// Bold font on one cell.
    pub fn set_bold(&mut self, row_idx: usize, col_idx: usize) -> Result<(), TabularWriteError> {
        self.patch_format(
            row_idx,
            col_idx,
            &SpecCellFormat {
                bold: Some(true),
                ..Default::default()
            },
        )
    }

    /// Bottom border of the given style across a row range.
    pub fn set_border_bottom(
        &mut self,
        row_idx: usize,
        col_idx_start: usize,
        col_idx_end: usize,
        border: i64,
    ) -> Result<(), TabularWriteError> {
        self.patch_row_format(
            row_idx,
            col_idx_start,
            col_idx_end,
            &SpecCellFormat {
                bottom: Some(border),
                ..Default::default()
            },
        )
    }

    /// Display format code on one cell.
    pub fn set_num_format(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        num_format: &str,
    ) -> Result<(), TabularWriteError> {
        self.patch_format(
            row_idx,
            col_idx,
            &SpecCellFormat {
                num_format: Some(num_format.to_string()),
                ..Default::default()
            },
        )
    }

    /// Record a rectangular merge. Single-cell ranges are a no-op.
    pub fn merge_range(
        &mut self,
        row_idx_start: usize,
        col_idx_start: usize,
        row_idx_end: usize,
        col_idx_end: usize,
    ) -> Result<(), TabularWriteError> {
        cast_row_num(row_idx_end)?;
        cast_col_num(col_idx_end)?;
        if row_idx_start > row_idx_end || col_idx_start > col_idx_end {
            return Err(TabularWriteError::IndexOverflow(format!(
                "inverted merge range: ({row_idx_start}, {col_idx_start})..({row_idx_end}, {col_idx_end})"
            )));
        }
        if row_idx_start == row_idx_end && col_idx_start == col_idx_end {
            return Ok(());
        }

        let merge = SpecSheetMerge {
            row_idx_start,
            col_idx_start,
            row_idx_end,
            col_idx_end,
        };
        // Re-merging the same header block replaces the old geometry.
        self.merges.retain(|other| !other.overlaps(&merge));
        self.merges.push(merge);
        Ok(())
    }

    /// Flag a column for autosize.
    pub fn set_autosize(&mut self, col_idx: usize) {
        self.cols_autosize.insert(col_idx);
    }

    /// Freeze rows above `row_idx` and columns left of `col_idx`.
    pub fn freeze_panes(&mut self, row_idx: usize, col_idx: usize) -> Result<(), TabularWriteError> {
        cast_row_num(row_idx)?;
        cast_col_num(col_idx)?;
        self.cell_freeze = Some((row_idx, col_idx));
        Ok(())
    }

    /// Horizontal page break below `row_idx`.
    pub fn insert_page_break(&mut self, row_idx: usize) -> Result<(), TabularWriteError> {
        cast_row_num(row_idx)?;
        self.rows_page_break.insert(row_idx);
        Ok(())
    }

    /// Insert `n_rows` blank rows before `row_idx`, shifting everything at or below it.
    ///
    /// Merges straddling the insertion row grow; freeze and page breaks move
    /// with their rows.
    pub fn insert_rows_before(
        &mut self,
        row_idx: usize,
        n_rows: usize,
    ) -> Result<(), TabularWriteError> {
        if n_rows == 0 {
            return Ok(());
        }
        if let Some(row_idx_last) = self.n_rows_used().checked_sub(1) {
            cast_row_num(row_idx_last + n_rows)?;
        }

        let cells_shifted = self.cells.split_off(&(row_idx, 0));
        for ((row_idx_cell, col_idx), cell) in cells_shifted {
            self.cells.insert((row_idx_cell + n_rows, col_idx), cell);
        }

        for merge in &mut self.merges {
            if merge.row_idx_start >= row_idx {
                merge.row_idx_start += n_rows;
                merge.row_idx_end += n_rows;
            } else if merge.row_idx_end >= row_idx {
                merge.row_idx_end += n_rows;
            }
        }

        if let Some((row_idx_freeze, col_idx_freeze)) = self.cell_freeze
            && row_idx_freeze >= row_idx
        {
            self.cell_freeze = Some((row_idx_freeze + n_rows, col_idx_freeze));
        }

        self.rows_page_break = self
            .rows_page_break
            .iter()
            .map(|&row_idx_break| {
                if row_idx_break >= row_idx {
                    row_idx_break + n_rows
                } else {
                    row_idx_break
                }
            })
            .collect();
        Ok(())
    }

    /// Write a two-dimensional block of values with its top-left at `(row_idx, col_idx)`.
    pub fn write_block(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        rows: &[Vec<EnumCellValue>],
    ) -> Result<(), TabularWriteError> {
        for (n_row_offset, l_values) in rows.iter().enumerate() {
            for (n_col_offset, value) in l_values.iter().enumerate() {
                self.set_cell_value(
                    row_idx + n_row_offset,
                    col_idx + n_col_offset,
                    EnumSheetValue::Value(value.clone()),
                )?;
            }
        }
        Ok(())
    }

    fn find_merge(&self, row_idx: usize, col_idx: usize) -> Option<&SpecSheetMerge> {
        self.merges
            .iter()
            .find(|merge| merge.contains(row_idx, col_idx))
    }

    /// Final autosize width per flagged column.
    pub fn plan_column_widths(&self, policy: &SpecAutofitCellsPolicy) -> BTreeMap<usize, usize> {
        let n_min = usize::max(1, policy.width_cell_min);
        let n_max = usize::min(255, usize::max(n_min, policy.width_cell_max));

        let mut dict_width_by_col: BTreeMap<usize, usize> =
            self.cols_autosize.iter().map(|&col_idx| (col_idx, 0)).collect();
        for (&(row_idx, col_idx), cell) in &self.cells {
            let Some(n_width) = dict_width_by_col.get_mut(&col_idx) else {
                continue;
            };
            // Text of a multi-column merge does not belong to its first column.
            if self
                .find_merge(row_idx, col_idx)
                .is_some_and(|merge| merge.col_idx_start != merge.col_idx_end)
            {
                continue;
            }
            *n_width = usize::max(*n_width, estimate_unicode_string_width(&cell.value.to_text()));
        }

        dict_width_by_col
            .into_iter()
            .map(|(col_idx, n_width)| {
                let n_width_final =
                    usize::min(n_max, usize::max(n_min, n_width + policy.width_cell_padding));
                (col_idx, n_width_final)
            })
            .collect()
    }

    /// Render the buffered sheet into a fresh `rust_xlsxwriter` worksheet.
    pub fn render(
        &self,
        policy_autofit: &SpecAutofitCellsPolicy,
    ) -> Result<Worksheet, TabularWriteError> {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(&self.name)?;
        if self.is_landscape() {
            worksheet.set_landscape();
        }

        let cell_blank = SpecSheetCell::default();
        let mut dict_formats: HashMap<&SpecCellFormat, Format> = HashMap::new();

        for (&(row_idx, col_idx), cell) in &self.cells {
            if self.find_merge(row_idx, col_idx).is_some() {
                continue;
            }
            let format = dict_formats
                .entry(&cell.fmt)
                .or_insert_with(|| derive_rust_xlsx_format(&cell.fmt));
            write_cell_with_format(&mut worksheet, row_idx, col_idx, cell, format)?;
        }

        for merge in &self.merges {
            let cell = self
                .cell(merge.row_idx_start, merge.col_idx_start)
                .unwrap_or(&cell_blank);
            let format = dict_formats
                .entry(&cell.fmt)
                .or_insert_with(|| derive_rust_xlsx_format(&cell.fmt));
            worksheet.merge_range(
                cast_row_num(merge.row_idx_start)?,
                cast_col_num(merge.col_idx_start)?,
                cast_row_num(merge.row_idx_end)?,
                cast_col_num(merge.col_idx_end)?,
                &cell.value.to_text(),
                format,
            )?;
        }

        for (col_idx, n_width) in self.plan_column_widths(policy_autofit) {
            worksheet.set_column_width(cast_col_num(col_idx)?, n_width as f64)?;
        }

        if let Some((row_idx, col_idx)) = self.cell_freeze {
            worksheet.set_freeze_panes(cast_row_num(row_idx)?, cast_col_num(col_idx)?)?;
        }

        if !self.rows_page_break.is_empty() {
            // rust_xlsxwriter breaks above the given row index.
            let l_breaks = self
                .rows_page_break
                .iter()
                .map(|&row_idx| cast_row_num(row_idx + 1))
                .collect::<Result<Vec<u32>, _>>()?;
            worksheet.set_page_breaks(&l_breaks)?;
        }

        Ok(worksheet)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatDerivation

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    cell: &SpecSheetCell,
    format: &Format,
) -> Result<(), TabularWriteError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match &cell.value {
        EnumSheetValue::Formula(text) => {
            worksheet.write_formula_with_format(n_row, n_col, Formula::new(text), format)?;
        }
        EnumSheetValue::Value(EnumCellValue::None) => {
            if !cell.fmt.is_empty() {
                worksheet.write_blank(n_row, n_col, format)?;
            }
        }
        EnumSheetValue::Value(EnumCellValue::String(val)) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumSheetValue::Value(EnumCellValue::Integer(val)) => {
            worksheet.write_number_with_format(n_row, n_col, *val as f64, format)?;
        }
        EnumSheetValue::Value(EnumCellValue::Number(val)) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        EnumSheetValue::Value(EnumCellValue::Boolean(val)) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, format)?;
        }
    }
    Ok(())
}

pub(crate) fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = spec.bottom {
        format = format.set_border_bottom(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> EnumSheetValue {
        EnumSheetValue::Value(EnumCellValue::String(value.to_string()))
    }

    #[test]
    fn insert_rows_shifts_cells_merges_and_markers() {
        let mut sheet = SheetBuffer::new("Sheet1");
        sheet.set_cell_value(0, 0, text("keep")).unwrap();
        sheet.set_cell_value(2, 0, text("move")).unwrap();
        sheet.merge_range(2, 0, 2, 1).unwrap();
        sheet.merge_range(0, 3, 3, 3).unwrap();
        sheet.freeze_panes(2, 0).unwrap();
        sheet.insert_page_break(2).unwrap();

        sheet.insert_rows_before(2, 2).unwrap();

        assert_eq!(sheet.cell(0, 0).unwrap().value, text("keep"));
        assert!(sheet.cell(2, 0).is_none());
        assert_eq!(sheet.cell(4, 0).unwrap().value, text("move"));
        assert_eq!(
            sheet.merges()[0],
            SpecSheetMerge {
                row_idx_start: 4,
                col_idx_start: 0,
                row_idx_end: 4,
                col_idx_end: 1,
            }
        );
        assert_eq!(sheet.merges()[1].row_idx_end, 5);
        assert_eq!(sheet.cell_freeze(), Some((4, 0)));
        assert!(sheet.rows_page_break().contains(&4));
    }

    #[test]
    fn patch_format_keeps_value_and_accumulates() {
        let mut sheet = SheetBuffer::new("Sheet1");
        sheet.set_cell_value(1, 1, text("v")).unwrap();
        sheet.set_bold(1, 1).unwrap();
        sheet.set_border_bottom(1, 0, 2, 1).unwrap();

        let cell = sheet.cell(1, 1).unwrap();
        assert_eq!(cell.value, text("v"));
        assert_eq!(cell.fmt.bold, Some(true));
        assert_eq!(cell.fmt.bottom, Some(1));
        assert_eq!(
            sheet.cell(1, 0).unwrap().value,
            EnumSheetValue::Value(EnumCellValue::None)
        );
        assert_eq!(sheet.cell(1, 2).unwrap().fmt.bottom, Some(1));
    }

    #[test]
    fn single_cell_merge_is_ignored_and_overlaps_replace() {
        let mut sheet = SheetBuffer::new("Sheet1");
        sheet.merge_range(0, 0, 0, 0).unwrap();
        assert!(sheet.merges().is_empty());

        sheet.merge_range(0, 0, 1, 0).unwrap();
        sheet.merge_range(0, 0, 1, 0).unwrap();
        assert_eq!(sheet.merges().len(), 1);
        assert!(sheet.merge_range(1, 0, 0, 0).is_err());
    }

    #[test]
    fn autosize_widths_follow_policy() {
        let mut sheet = SheetBuffer::new("Sheet1");
        sheet.set_cell_value(0, 0, text("a")).unwrap();
        sheet.set_cell_value(1, 0, text("abcdefghijkl")).unwrap();
        sheet.set_cell_value(0, 1, text(&"x".repeat(200))).unwrap();
        sheet.set_cell_value(0, 2, text("Grouped header text")).unwrap();
        sheet.merge_range(0, 2, 0, 3).unwrap();
        sheet.set_autosize(0);
        sheet.set_autosize(1);
        sheet.set_autosize(2);

        let dict_widths = sheet.plan_column_widths(&SpecAutofitCellsPolicy::default());
        assert_eq!(dict_widths[&0], 14);
        assert_eq!(dict_widths[&1], 60);
        assert_eq!(dict_widths[&2], 8);
    }

    #[test]
    fn write_block_places_values() {
        let mut sheet = SheetBuffer::new("Sheet1");
        sheet
            .write_block(
                3,
                1,
                &[
                    vec![EnumCellValue::Integer(1), EnumCellValue::Integer(2)],
                    vec![EnumCellValue::Boolean(true)],
                ],
            )
            .unwrap();

        assert_eq!(
            sheet.cell(3, 2).unwrap().value,
            EnumSheetValue::Value(EnumCellValue::Integer(2))
        );
        assert_eq!(sheet.n_rows_used(), 5);
    }

    #[test]
    fn render_accepts_buffered_content() {
        let mut sheet = SheetBuffer::new("Report");
        sheet.set_landscape(true);
        sheet.set_cell_value(0, 0, text("Echo")).unwrap();
        sheet.merge_range(0, 0, 0, 1).unwrap();
        sheet
            .set_cell_value(1, 0, EnumSheetValue::Formula("=DATEVALUE(\"2024-01-02\")".into()))
            .unwrap();
        sheet.set_num_format(1, 0, "yyyy-m-d").unwrap();
        sheet.set_autosize(0);
        sheet.freeze_panes(1, 0).unwrap();
        sheet.insert_page_break(1).unwrap();

        assert!(sheet.render(&SpecAutofitCellsPolicy::default()).is_ok());
    }

    #[test]
    fn index_limits_are_enforced() {
        let mut sheet = SheetBuffer::new("Sheet1");
        assert!(matches!(
            sheet.set_cell_value(crate::conf::N_NROWS_EXCEL_MAX, 0, text("x")),
            Err(TabularWriteError::IndexOverflow(_))
        ));
        assert!(sheet.set_cell_value(0, crate::conf::N_NCOLS_EXCEL_MAX, text("x")).is_err());
    }

    #[test]
    fn border_codes_map_to_styles() {
        assert_eq!(derive_format_border(1), FormatBorder::Thin);
        assert_eq!(derive_format_border(99), FormatBorder::None);
        assert_eq!(derive_format_align("VCenter"), Some(FormatAlign::VerticalCenter));
        assert_eq!(derive_format_align("nowhere"), None);
    }
}
