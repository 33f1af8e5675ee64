//! Physical column planning and header-row rendering for a frozen header list.

use crate::spec::{EnumHeader, EnumHeaderRenderMode};

////////////////////////////////////////////////////////////////////////////////
// #region LayoutModels

/// Physical placement of one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumnSpan {
    /// Index of the header in the header list.
    pub idx_header: usize,
    /// First physical column (0-based).
    pub col_idx_start: usize,
    /// Number of physical columns (0 for a nested header without children).
    pub width: usize,
    /// Name cell spans both header rows.
    pub if_merge_vertical: bool,
    /// Name cell spans all child columns.
    pub if_merge_horizontal: bool,
}

impl SpecColumnSpan {
    /// Last physical column (inclusive); `None` when the span is empty.
    pub fn col_idx_end(&self) -> Option<usize> {
        (self.width > 0).then(|| self.col_idx_start + self.width - 1)
    }
}

/// Merge instruction inside the header block.
///
/// Rows are 0-based and relative to the first header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecHeaderMerge {
    /// First row (inclusive).
    pub row_idx_start: usize,
    /// Last row (inclusive).
    pub row_idx_end: usize,
    /// First column (inclusive).
    pub col_idx_start: usize,
    /// Last column (inclusive).
    pub col_idx_end: usize,
    /// Merged cell text.
    pub text: String,
}

/// Rendered header block: rows of cell text plus merge geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecHeaderLayout {
    /// Mode the block was rendered with.
    pub rule_render: EnumHeaderRenderMode,
    /// One span per header, in header order.
    pub spans: Vec<SpecColumnSpan>,
    /// Header rows; every row is `width_total` long.
    pub rows: Vec<Vec<String>>,
    /// Real merges (merge mode only).
    pub merges: Vec<SpecHeaderMerge>,
}

impl SpecHeaderLayout {
    /// Number of header rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Total physical column count.
    pub fn width_total(&self) -> usize {
        self.spans.iter().map(|span| span.width).sum()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnPlanning

/// Total physical columns: 1 per simple header, one per child for nested ones.
pub fn calculate_width_total(headers: &[EnumHeader]) -> usize {
    headers.iter().map(EnumHeader::width).sum()
}

/// Whether any header groups child columns.
pub fn has_nested_headers(headers: &[EnumHeader]) -> bool {
    headers.iter().any(EnumHeader::is_nested)
}

/// Starting column and width of every header, left to right.
pub fn plan_column_spans(headers: &[EnumHeader]) -> Vec<SpecColumnSpan> {
    let mut l_spans = Vec::with_capacity(headers.len());
    let mut n_col_cursor = 0usize;
    for (idx_header, header) in headers.iter().enumerate() {
        let n_width = header.width();
        l_spans.push(SpecColumnSpan {
            idx_header,
            col_idx_start: n_col_cursor,
            width: n_width,
            if_merge_vertical: false,
            if_merge_horizontal: false,
        });
        n_col_cursor += n_width;
    }
    l_spans
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderRendering

/// Render `headers` into header rows for the given mode.
///
/// `Merge` and `Flatten` emit two rows (parent names, then child names) unless
/// `if_collapse_single_row` is set and no header is nested. `ChildrenOnly`
/// always emits one row.
pub fn plan_header_layout(
    headers: &[EnumHeader],
    rule_render: EnumHeaderRenderMode,
    if_collapse_single_row: bool,
) -> SpecHeaderLayout {
    let mut l_spans = plan_column_spans(headers);
    let n_width_total = calculate_width_total(headers);

    if rule_render == EnumHeaderRenderMode::ChildrenOnly {
        let mut v_row = Vec::with_capacity(n_width_total);
        for header in headers {
            match header {
                EnumHeader::Simple(name) => v_row.push(name.clone()),
                EnumHeader::Nested { children, .. } => v_row.extend(children.iter().cloned()),
            }
        }
        return SpecHeaderLayout {
            rule_render,
            spans: l_spans,
            rows: vec![v_row],
            merges: vec![],
        };
    }

    let if_two_rows = has_nested_headers(headers) || !if_collapse_single_row;
    let if_merge = rule_render == EnumHeaderRenderMode::Merge;

    let mut v_row_top = vec![String::new(); n_width_total];
    let mut v_row_bottom = vec![String::new(); n_width_total];
    let mut l_merges = Vec::new();

    for (span, header) in l_spans.iter_mut().zip(headers) {
        let Some(n_col_end) = span.col_idx_end() else {
            continue;
        };
        v_row_top[span.col_idx_start] = header.name().to_string();

        match header {
            EnumHeader::Simple(name) => {
                if if_merge && if_two_rows {
                    span.if_merge_vertical = true;
                    l_merges.push(SpecHeaderMerge {
                        row_idx_start: 0,
                        row_idx_end: 1,
                        col_idx_start: span.col_idx_start,
                        col_idx_end: span.col_idx_start,
                        text: name.clone(),
                    });
                }
            }
            EnumHeader::Nested { name, children } => {
                for (n_offset, child) in children.iter().enumerate() {
                    v_row_bottom[span.col_idx_start + n_offset] = child.clone();
                }
                if if_merge && span.width > 1 {
                    span.if_merge_horizontal = true;
                    l_merges.push(SpecHeaderMerge {
                        row_idx_start: 0,
                        row_idx_end: 0,
                        col_idx_start: span.col_idx_start,
                        col_idx_end: n_col_end,
                        text: name.clone(),
                    });
                }
            }
        }
    }

    let rows = if if_two_rows {
        vec![v_row_top, v_row_bottom]
    } else {
        vec![v_row_top]
    };

    SpecHeaderLayout {
        rule_render,
        spans: l_spans,
        rows,
        merges: l_merges,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
