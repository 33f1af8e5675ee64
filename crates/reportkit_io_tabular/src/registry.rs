//! Incremental header discovery across a stream of records.

use log::{debug, warn};

use crate::conf::TUP_RECORD_CONTROL_KEYS;
use crate::spec::{EnumCellValue, EnumHeader, EnumRecordField, SpecRecord};

/// Merge the keys of `record` into `existing` and return the updated list.
///
/// - New names are appended in the record's key order.
/// - A nested value grows the same-named nested header: existing children stay
///   first, unseen children are appended in first-seen order.
/// - A name keeps the kind it was first registered with; a record presenting
///   the other kind is reported and ignored for discovery.
pub fn merge_headers(existing: Vec<EnumHeader>, record: &SpecRecord) -> Vec<EnumHeader> {
    let mut registry = HeaderRegistry::from_headers(existing);
    registry.merge(record);
    registry.into_headers()
}

/// Owned, per-job header list built by merging records one at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRegistry {
    headers: Vec<EnumHeader>,
    cnt_schema_mismatch: u64,
}

impl HeaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with an existing header list.
    pub fn from_headers(headers: Vec<EnumHeader>) -> Self {
        Self {
            headers,
            cnt_schema_mismatch: 0,
        }
    }

    /// Current header list in discovery order.
    pub fn headers(&self) -> &[EnumHeader] {
        &self.headers
    }

    /// Freeze and hand out the header list.
    pub fn into_headers(self) -> Vec<EnumHeader> {
        self.headers
    }

    /// Number of fields ignored because their kind contradicted the registered header.
    pub fn cnt_schema_mismatch(&self) -> u64 {
        self.cnt_schema_mismatch
    }

    /// Merge one record's keys into the header list.
    pub fn merge(&mut self, record: &SpecRecord) {
        for (key, field) in record.iter() {
            if TUP_RECORD_CONTROL_KEYS.iter().any(|c_key| *c_key == key) {
                continue;
            }
            match field {
                EnumRecordField::Nested(children) => {
                    self.merge_nested(key, children.iter().map(|(child, _)| child.as_str()));
                }
                EnumRecordField::Scalar(val) => self.merge_simple(key, val),
            }
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header.name() == name)
    }

    fn merge_simple(&mut self, name: &str, value: &EnumCellValue) {
        match self.position(name) {
            None => self.headers.push(EnumHeader::simple(name)),
            Some(n_idx) if !self.headers[n_idx].is_nested() => {}
            // null is plain missing
            Some(_) if value.is_missing() => {}
            Some(_) => {
                self.cnt_schema_mismatch += 1;
                warn!("Scalar value under nested header {name:?}; ignored for discovery.");
            }
        }
    }

    fn merge_nested<'c, I>(&mut self, name: &str, child_names: I)
    where
        I: Iterator<Item = &'c str>,
    {
        let Some(n_idx) = self.position(name) else {
            let mut l_children: Vec<String> = Vec::new();
            for child in child_names {
                if !l_children.iter().any(|c_name| c_name == child) {
                    l_children.push(child.to_string());
                }
            }
            self.headers.push(EnumHeader::Nested {
                name: name.to_string(),
                children: l_children,
            });
            return;
        };

        match &mut self.headers[n_idx] {
            EnumHeader::Nested { children, .. } => {
                for child in child_names {
                    if !children.iter().any(|c_name| c_name == child) {
                        debug!("Nested header {name:?} gained child {child:?}.");
                        children.push(child.to_string());
                    }
                }
            }
            EnumHeader::Simple(_) => {
                self.cnt_schema_mismatch += 1;
                warn!("Nested value under simple header {name:?}; ignored for discovery.");
            }
        }
    }
}
