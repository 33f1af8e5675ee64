//! Record-to-row mapping against a frozen header list.

use log::warn;

use crate::layout::calculate_width_total;
use crate::spec::{EnumCellValue, EnumHeader, EnumRecordField, SpecRecord};

/// One mapped row plus the schema mismatches met while mapping it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecMappedRow {
    /// One value per physical column; `EnumCellValue::None` marks a missing field.
    pub cells: Vec<EnumCellValue>,
    /// Fields whose kind contradicted their header and were treated as missing.
    pub cnt_schema_mismatch: u64,
}

/// Maps records onto the physical columns of a header list.
///
/// Keys absent from the header list are dropped; headers absent from the
/// record yield one missing value per physical column they occupy.
#[derive(Debug, Clone, Copy)]
pub struct RowMapper<'h> {
    headers: &'h [EnumHeader],
    width_total: usize,
}

impl<'h> RowMapper<'h> {
    /// Bind a mapper to a frozen header list.
    pub fn new(headers: &'h [EnumHeader]) -> Self {
        Self {
            headers,
            width_total: calculate_width_total(headers),
        }
    }

    /// Length of every mapped row.
    pub fn width_total(&self) -> usize {
        self.width_total
    }

    /// Map one record; never fails.
    pub fn map(&self, record: &SpecRecord) -> SpecMappedRow {
        let mut cells = Vec::with_capacity(self.width_total);
        let mut cnt_schema_mismatch = 0u64;

        for header in self.headers {
            match header {
                EnumHeader::Simple(name) => match record.get(name) {
                    Some(EnumRecordField::Scalar(val)) => cells.push(val.clone()),
                    Some(EnumRecordField::Nested(_)) => {
                        cnt_schema_mismatch += 1;
                        warn!("Nested value under simple header {name:?}; written as missing.");
                        cells.push(EnumCellValue::None);
                    }
                    None => cells.push(EnumCellValue::None),
                },
                EnumHeader::Nested { name, children } => match record.get(name) {
                    Some(field @ EnumRecordField::Nested(_)) => {
                        for child in children {
                            cells.push(
                                field
                                    .get_child(child)
                                    .cloned()
                                    .unwrap_or(EnumCellValue::None),
                            );
                        }
                    }
                    Some(EnumRecordField::Scalar(val)) => {
                        if !val.is_missing() {
                            cnt_schema_mismatch += 1;
                            warn!(
                                "Scalar value under nested header {name:?}; written as missing."
                            );
                        }
                        cells.extend(children.iter().map(|_| EnumCellValue::None));
                    }
                    None => cells.extend(children.iter().map(|_| EnumCellValue::None)),
                },
            }
        }

        debug_assert_eq!(cells.len(), self.width_total);
        SpecMappedRow {
            cells,
            cnt_schema_mismatch,
        }
    }
}

/// Map one record onto `headers` (see [`RowMapper`]).
pub fn map_record_to_row(record: &SpecRecord, headers: &[EnumHeader]) -> SpecMappedRow {
    RowMapper::new(headers).map(record)
}
