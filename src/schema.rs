/*!
 * Schema definitions for the pharmacy license CSV files
 *
 * Columns are resolved by header name rather than position: the
 * `all_pharmacies` and `available_pharmacies` exports share the core columns
 * but differ in ordering and in the extra boolean columns they carry.
 */

use std::collections::HashMap;
use std::path::Path;

use log::debug;

use crate::constants::*;
use crate::{ExplorerError, Result};

/// License table schema
pub struct PharmacySchema;

impl PharmacySchema {
    /// Columns every source file must carry
    pub fn required_columns() -> &'static [&'static str] {
        &[COL_PHARMACY_NAME, COL_LICENSE_TYPE, COL_CITY]
    }

    /// Known columns that may be absent
    pub fn optional_columns() -> &'static [&'static str] {
        &[
            COL_LICENSE_NUMBER,
            COL_ENTITY_TYPE,
            COL_FACILITY_TYPE,
            COL_COUNTY,
            COL_STATE,
            COL_ZIP,
            COL_IS_GOVERNMENT,
            COL_IS_SATELLITE,
            COL_REGISTERED_OUTSOURCER,
            COL_SPECIALTIES,
            COL_CONDITIONS,
            COL_ACCREDITATIONS,
            COL_EXPIRATION_DATE,
            COL_LATITUDE,
            COL_LONGITUDE,
        ]
    }

    /// Every column the reader maps onto a record field
    pub fn known_columns() -> Vec<&'static str> {
        Self::required_columns()
            .iter()
            .chain(Self::optional_columns())
            .copied()
            .collect()
    }

    /// Validate that a header row contains every required column
    pub fn validate_headers(headers: &[String]) -> Result<()> {
        Self::resolve(headers, None).map(|_| ())
    }

    /// Map header names to column positions
    pub fn resolve(headers: &[String], file_path: Option<&Path>) -> Result<ColumnIndex> {
        let cleaned: Vec<String> = headers.iter().map(|h| clean_header(h)).collect();

        let mut positions = HashMap::new();
        let mut extra = Vec::new();

        for (idx, header) in cleaned.iter().enumerate() {
            match Self::known_columns().into_iter().find(|c| c.eq_ignore_ascii_case(header)) {
                Some(column) => {
                    positions.entry(column).or_insert(idx);
                }
                None if !header.is_empty() => extra.push((idx, header.clone())),
                None => {}
            }
        }

        for column in Self::required_columns() {
            if !positions.contains_key(column) {
                return Err(ExplorerError::missing_column(
                    column,
                    &cleaned,
                    file_path.map(Path::to_path_buf),
                ));
            }
        }

        debug!(
            "Resolved {} known columns and {} extra columns",
            positions.len(),
            extra.len()
        );

        Ok(ColumnIndex { positions, extra })
    }
}

/// Header positions for one source file
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    positions: HashMap<&'static str, usize>,
    extra: Vec<(usize, String)>,
}

impl ColumnIndex {
    /// Position of a known column, if the file carries it
    pub fn get(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    /// Columns outside the known schema, with their positions
    pub fn extra_columns(&self) -> &[(usize, String)] {
        &self.extra
    }
}

fn clean_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_by_name() {
        let index = PharmacySchema::resolve(
            &headers(&["City", "\u{feff}Pharmacy Name", "license type", "Oncology", "latitude"]),
            None,
        ).unwrap();
        assert_eq!(index.get(COL_PHARMACY_NAME), Some(1));
        assert_eq!(index.get(COL_LICENSE_TYPE), Some(2));
        assert_eq!(index.get(COL_LATITUDE), Some(4));
        assert!(!index.contains(COL_SPECIALTIES));
        assert_eq!(index.extra_columns(), &[(3, "Oncology".to_string())]);
    }

    #[test]
    fn test_missing_required_column() {
        let err = PharmacySchema::validate_headers(&headers(&["Pharmacy Name", "City"])).unwrap_err();
        match err {
            ExplorerError::MissingColumn { column, found_columns, .. } => {
                assert_eq!(column, COL_LICENSE_TYPE);
                assert_eq!(found_columns.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
