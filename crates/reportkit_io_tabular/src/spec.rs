//! Shared tabular models, options and errors.

use serde_json::Value;
use thiserror::Error;

use crate::conf::C_RECORD_KEY_BOLD;

////////////////////////////////////////////////////////////////////////////////
// #region HeaderSpecification

/// One logical output column.
///
/// Identity is by name: a `Simple` header is its own name, a `Nested` header is
/// keyed by its top-level name and expands to one physical column per child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumHeader {
    /// One physical column.
    Simple(String),
    /// Group of child columns rendered under a shared parent name.
    Nested {
        /// Parent (group) name.
        name: String,
        /// Ordered, unique child names.
        children: Vec<String>,
    },
}

impl EnumHeader {
    /// Build a simple header.
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple(name.into())
    }

    /// Build a nested header from ordered child names.
    pub fn nested<I, S>(name: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Nested {
            name: name.into(),
            children: children.into_iter().map(Into::into).collect(),
        }
    }

    /// Top-level name.
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(name) => name,
            Self::Nested { name, .. } => name,
        }
    }

    /// Child names; empty for simple headers.
    pub fn children(&self) -> &[String] {
        match self {
            Self::Simple(_) => &[],
            Self::Nested { children, .. } => children,
        }
    }

    /// Whether this header groups child columns.
    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Nested { .. })
    }

    /// Number of physical columns occupied.
    pub fn width(&self) -> usize {
        match self {
            Self::Simple(_) => 1,
            Self::Nested { children, .. } => children.len(),
        }
    }
}

/// Header-rendering discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumHeaderRenderMode {
    /// Two header rows with real merged cells.
    #[default]
    Merge,
    /// Two header rows, nested spans padded with blank cells instead of merges.
    Flatten,
    /// One header row; nested headers contribute only their child names.
    ChildrenOnly,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordSpecification

/// Normalized scalar value of one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Integral numeric value.
    Integer(i64),
    /// Floating-point numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
}

impl EnumCellValue {
    /// Convert one JSON value into a scalar cell value.
    ///
    /// Objects and arrays below the nested level are kept as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Bool(val) => Self::Boolean(*val),
            Value::Number(val) => match val.as_i64() {
                Some(n) => Self::Integer(n),
                None => Self::Number(val.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(val) => Self::String(val.clone()),
            Value::Array(_) | Value::Object(_) => Self::String(value.to_string()),
        }
    }

    /// Whether this is the missing-value sentinel.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Plain-text rendering used by text sinks (missing renders as empty string).
    pub fn to_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(val) => val.clone(),
            Self::Integer(val) => val.to_string(),
            Self::Number(val) => val.to_string(),
            Self::Boolean(val) => val.to_string(),
        }
    }

    /// Loose truthiness for control flags (`true`, non-zero, non-empty text).
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::String(val) => !val.is_empty() && val != "0",
            Self::Integer(val) => *val != 0,
            Self::Number(val) => *val != 0.0,
            Self::Boolean(val) => *val,
        }
    }
}

/// Value stored under one record key.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumRecordField {
    /// Scalar value for a simple header.
    Scalar(EnumCellValue),
    /// Child mapping for a nested header, in source order.
    Nested(Vec<(String, EnumCellValue)>),
}

impl EnumRecordField {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Nested(
                map.iter()
                    .map(|(key, val)| (key.clone(), EnumCellValue::from_json(val)))
                    .collect(),
            ),
            Value::Array(items) => Self::Nested(
                items
                    .iter()
                    .enumerate()
                    .map(|(idx, val)| (idx.to_string(), EnumCellValue::from_json(val)))
                    .collect(),
            ),
            _ => Self::Scalar(EnumCellValue::from_json(value)),
        }
    }

    /// Look up one child value of a nested field.
    pub fn get_child(&self, child: &str) -> Option<&EnumCellValue> {
        match self {
            Self::Scalar(_) => None,
            Self::Nested(children) => children
                .iter()
                .find(|(key, _)| key == child)
                .map(|(_, val)| val),
        }
    }
}

/// One decoded record: ordered key/value pairs, validated at decode time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRecord {
    fields: Vec<(String, EnumRecordField)>,
}

impl SpecRecord {
    /// Build a record from already-normalized fields.
    pub fn from_fields(fields: Vec<(String, EnumRecordField)>) -> Self {
        Self { fields }
    }

    /// Decode a JSON object (or array, keyed by position) into a record.
    ///
    /// Returns `None` for scalars, which are not records.
    pub fn from_json(value: &Value) -> Option<Self> {
        let fields = match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, val)| (key.clone(), EnumRecordField::from_json(val)))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, val)| (idx.to_string(), EnumRecordField::from_json(val)))
                .collect(),
            _ => return None,
        };
        Some(Self { fields })
    }

    /// Parse JSON text into a record; `None` when malformed or not a record.
    pub fn from_json_str(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        Self::from_json(&value)
    }

    /// Look up one field by key.
    pub fn get(&self, key: &str) -> Option<&EnumRecordField> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, field)| field)
    }

    /// Iterate fields in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnumRecordField)> {
        self.fields.iter().map(|(key, field)| (key.as_str(), field))
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no keys.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All values in source order, nested children expanded in place.
    pub fn values_flat(&self) -> Vec<EnumCellValue> {
        let mut l_values = Vec::with_capacity(self.fields.len());
        for (_, field) in &self.fields {
            match field {
                EnumRecordField::Scalar(val) => l_values.push(val.clone()),
                EnumRecordField::Nested(children) => {
                    l_values.extend(children.iter().map(|(_, val)| val.clone()));
                }
            }
        }
        l_values
    }

    /// Whether the record asks for a bold row.
    pub fn is_row_bold(&self) -> bool {
        matches!(
            self.get(C_RECORD_KEY_BOLD),
            Some(EnumRecordField::Scalar(val)) if val.is_truthy()
        )
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format; every field is an optional overlay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Bottom border style.
    pub bottom: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,
    /// Number format code.
    pub num_format: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            bottom: other.bottom.or(self.bottom),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        *self == SpecCellFormat::default()
    }
}

/// Column autosize width policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Options for the CSV writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCsvWriteOptions {
    /// Header rendering mode; `Merge` is treated as `Flatten` (CSV has no merges).
    pub rule_header_render: EnumHeaderRenderMode,
    /// Emit a single header row when no nested header is present.
    pub if_collapse_single_row: bool,
    /// Field delimiter.
    pub delimiter: u8,
}

impl Default for SpecCsvWriteOptions {
    fn default() -> Self {
        Self {
            rule_header_render: EnumHeaderRenderMode::Flatten,
            if_collapse_single_row: true,
            delimiter: b',',
        }
    }
}

/// Options for the XLSX writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxWriteOptions {
    /// 1-based row where the cursor starts (and resets to on sheet switch).
    pub n_row_start: u32,
    /// Default freeze cell (e.g. `"A3"`); `None` freezes right below the header block.
    pub cell_freeze_default: Option<String>,
    /// Header rendering mode.
    pub rule_header_render: EnumHeaderRenderMode,
    /// Emit a single header row when no nested header is present.
    pub if_collapse_single_row: bool,
    /// Freeze panes below the headers during `prepare`.
    pub if_freeze_headers: bool,
    /// Flag header columns for autosize.
    pub if_autosize_columns: bool,
    /// Landscape page orientation for every sheet.
    pub if_landscape: bool,
    /// Autosize width policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Header cell format.
    pub fmt_header: SpecCellFormat,
    /// Base data cell format.
    pub fmt_text: SpecCellFormat,
    /// Patch applied to cells of a row closing a report section.
    pub fmt_separator: SpecCellFormat,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            n_row_start: 1,
            cell_freeze_default: None,
            rule_header_render: EnumHeaderRenderMode::Merge,
            if_collapse_single_row: true,
            if_freeze_headers: false,
            if_autosize_columns: true,
            if_landscape: true,
            policy_autofit: SpecAutofitCellsPolicy::default(),
            fmt_header: SpecCellFormat {
                bold: Some(true),
                valign: Some("vcenter".to_string()),
                ..Default::default()
            },
            fmt_text: SpecCellFormat::default(),
            fmt_separator: SpecCellFormat {
                bottom: Some(1),
                ..Default::default()
            },
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Fatal failure of one export job (the sink or source rejected an operation).
#[derive(Debug, Error)]
pub enum TabularWriteError {
    /// Underlying file or stream failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// CSV serialization failure.
    #[error("csv write error: {0}")]
    Csv(#[from] csv::Error),
    /// Workbook serialization failure.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// Pattern compilation failure.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    /// Cell reference text could not be parsed.
    #[error("invalid cell reference: {0:?}")]
    InvalidCellRef(String),
    /// Worksheet index does not exist.
    #[error("worksheet index {index} out of range (sheets: {count})")]
    InvalidSheetIndex {
        /// Requested index.
        index: usize,
        /// Number of worksheets.
        count: usize,
    },
    /// Row or column index beyond worksheet limits.
    #[error("{0}")]
    IndexOverflow(String),
    /// Write attempted after the sink was finalized.
    #[error("Cannot write after finalize().")]
    WriterClosed,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
