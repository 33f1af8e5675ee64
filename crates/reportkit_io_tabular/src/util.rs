//! Stateless helper utilities shared by the layout planner and the writers.

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::TabularWriteError;

////////////////////////////////////////////////////////////////////////////////
// #region CellAddressing

/// Convert a 0-based column index to its spreadsheet label (`0 -> A`, `26 -> AA`).
pub fn derive_column_label(col_idx: usize) -> String {
    let mut v_chars = Vec::new();
    let mut n_rest = col_idx + 1;
    while n_rest > 0 {
        let n_digit = (n_rest - 1) % 26;
        v_chars.push(char::from(b'A' + n_digit as u8));
        n_rest = (n_rest - 1) / 26;
    }
    v_chars.iter().rev().collect()
}

/// Convert a spreadsheet column label back to its 0-based index.
pub fn parse_column_label(label: &str) -> Option<usize> {
    if label.is_empty() {
        return None;
    }
    let mut n_value = 0usize;
    for chr in label.chars() {
        if !chr.is_ascii_alphabetic() {
            return None;
        }
        let n_digit = (chr.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n_value = n_value.checked_mul(26)?.checked_add(n_digit)?;
    }
    Some(n_value - 1)
}

/// Build a cell reference from a 1-based row and 0-based column (`(3, 0) -> A3`).
pub fn derive_cell_ref(row_1based: u32, col_idx: usize) -> String {
    format!("{}{row_1based}", derive_column_label(col_idx))
}

/// Build a range reference; a single-row range when `row_end` is `None`.
pub fn derive_range_ref(
    col_start: usize,
    row_start: u32,
    col_end: usize,
    row_end: Option<u32>,
) -> String {
    format!(
        "{}:{}",
        derive_cell_ref(row_start, col_start),
        derive_cell_ref(row_end.unwrap_or(row_start), col_end)
    )
}

/// Parse `"B12"` into `(12, 1)`: 1-based row and 0-based column.
pub fn parse_cell_ref(cell: &str) -> Result<(u32, usize), TabularWriteError> {
    let c_cell = cell.trim().replace('$', "");
    let n_split = c_cell
        .find(|chr: char| chr.is_ascii_digit())
        .ok_or_else(|| TabularWriteError::InvalidCellRef(cell.to_string()))?;
    let (c_col, c_row) = c_cell.split_at(n_split);

    let n_col = parse_column_label(c_col)
        .ok_or_else(|| TabularWriteError::InvalidCellRef(cell.to_string()))?;
    let n_row = c_row
        .parse::<u32>()
        .map_err(|_| TabularWriteError::InvalidCellRef(cell.to_string()))?;
    if n_row == 0 {
        return Err(TabularWriteError::InvalidCellRef(cell.to_string()));
    }
    Ok((n_row, n_col))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IndexCasting

/// Validate a 0-based row index against worksheet limits.
pub fn cast_row_num(value: usize) -> Result<u32, TabularWriteError> {
    if value >= N_NROWS_EXCEL_MAX {
        return Err(TabularWriteError::IndexOverflow(format!(
            "row index overflow: {value}"
        )));
    }
    u32::try_from(value)
        .map_err(|_| TabularWriteError::IndexOverflow(format!("row index overflow: {value}")))
}

/// Validate a 0-based column index against worksheet limits.
pub fn cast_col_num(value: usize) -> Result<u16, TabularWriteError> {
    if value >= N_NCOLS_EXCEL_MAX {
        return Err(TabularWriteError::IndexOverflow(format!(
            "column index overflow: {value}"
        )));
    }
    u16::try_from(value)
        .map_err(|_| TabularWriteError::IndexOverflow(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Pick a name not in `existing`, suffixing `__2`, `__3`, ... within the length cap.
pub fn derive_unique_sheet_name<'a, I>(name: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let if_taken = |candidate: &str| {
        existing
            .clone()
            .into_iter()
            .any(|c_name| c_name.eq_ignore_ascii_case(candidate))
    };
    if !if_taken(name) {
        return name.to_string();
    }

    let base_name: String = name
        .chars()
        .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
        .collect();

    let mut n_idx = 2usize;
    loop {
        let candidate: String = format!("{base_name}__{n_idx}")
            .chars()
            .take(N_LEN_EXCEL_SHEET_NAME_MAX)
            .collect();
        if !if_taken(&candidate) {
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate displayed width units: ASCII counts 1, other characters about 1.6.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_label_wraps_past_z() {
        assert_eq!(derive_column_label(0), "A");
        assert_eq!(derive_column_label(25), "Z");
        assert_eq!(derive_column_label(26), "AA");
        assert_eq!(derive_column_label(27), "AB");
        assert_eq!(derive_column_label(51), "AZ");
        assert_eq!(derive_column_label(52), "BA");
        assert_eq!(derive_column_label(701), "ZZ");
        assert_eq!(derive_column_label(702), "AAA");
        assert_eq!(derive_column_label(16_383), "XFD");
    }

    #[test]
    fn column_label_parse_inverts_derive() {
        for n_idx in [0usize, 1, 25, 26, 27, 700, 701, 702, 16_383] {
            assert_eq!(parse_column_label(&derive_column_label(n_idx)), Some(n_idx));
        }
        assert_eq!(parse_column_label("ab"), Some(27));
        assert_eq!(parse_column_label(""), None);
        assert_eq!(parse_column_label("A1"), None);
    }

    #[test]
    fn cell_and_range_refs() {
        assert_eq!(derive_cell_ref(3, 0), "A3");
        assert_eq!(derive_range_ref(0, 5, 9, Some(6)), "A5:J6");
        assert_eq!(derive_range_ref(0, 5, 27, None), "A5:AB5");

        assert_eq!(parse_cell_ref("A2").unwrap(), (2, 0));
        assert_eq!(parse_cell_ref("$AB$10").unwrap(), (10, 27));
        assert!(parse_cell_ref("A0").is_err());
        assert!(parse_cell_ref("12").is_err());
        assert!(parse_cell_ref("B").is_err());
    }

    #[test]
    fn cast_rejects_excel_overflow() {
        assert_eq!(cast_row_num(0).unwrap(), 0);
        assert!(cast_row_num(N_NROWS_EXCEL_MAX).is_err());
        assert_eq!(cast_col_num(16_383).unwrap(), 16_383);
        assert!(cast_col_num(N_NCOLS_EXCEL_MAX).is_err());
    }

    #[test]
    fn sheet_names_are_sanitized_and_unique() {
        assert_eq!(sanitize_sheet_name("Q1/Q2: [sales]", "_"), "Q1_Q2_ _sales_");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);

        let l_existing = ["Report", "report__2"];
        assert_eq!(
            derive_unique_sheet_name("Report", l_existing.iter().copied()),
            "Report__3"
        );
        assert_eq!(
            derive_unique_sheet_name("Other", l_existing.iter().copied()),
            "Other"
        );
    }

    #[test]
    fn estimate_width_weights_non_ascii() {
        assert_eq!(estimate_unicode_string_width("abc"), 3);
        assert_eq!(estimate_unicode_string_width("ab\u{4e2d}"), 4);
    }
}
