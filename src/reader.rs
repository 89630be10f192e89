/*!
 * CSV reader for pharmacy license files
 *
 * Reads the license exports into [`PharmacyRecord`]s, normalizing booleans,
 * dates and coordinates once at load time so that filtering never re-parses
 * text.
 */

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, info, warn};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    Result, ExplorerError, ErrorContext,
    data_types::PharmacyRecord,
    schema::{ColumnIndex, PharmacySchema},
    constants::*,
};

/// Date layouts seen in license exports, tried in order
///
/// `%y` must precede `%Y`, which also accepts a two-digit year.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Number of skipped-row warnings logged before going quiet
const MAX_LOGGED_WARNINGS: usize = 10;

/// License CSV reader
pub struct PharmacyReader {
    /// Whether to skip invalid records (true) or fail on first error (false)
    skip_invalid_records: bool,
    /// Whether to show progress bar
    #[cfg(feature = "progress")]
    show_progress_bar: bool,
}

impl Default for PharmacyReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PharmacyReader {
    pub fn new() -> Self {
        Self {
            skip_invalid_records: false,
            #[cfg(feature = "progress")]
            show_progress_bar: false,
        }
    }

    /// Enable or disable skipping invalid records
    pub fn with_skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable the progress bar
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    /// Load a license CSV file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<PharmacyRecord>> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExplorerError::file_not_found_with_suggestion(path.to_path_buf()));
        }

        let start_time = Instant::now();
        let file = File::open(path)?;
        let records = self.load_from_reader(file, Some(path))?;

        info!(
            "Loaded {} pharmacy records from {} in {:.2}s",
            records.len(),
            path.display(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(records)
    }

    /// Load license rows from any reader (the source path is only used in errors)
    pub fn load_from_reader<R: Read>(&self, source: R, path: Option<&Path>) -> Result<Vec<PharmacyRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        let index = PharmacySchema::resolve(&headers, path)?;

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            // +2 for header and 0-based index
            let line = idx + 2;
            match result {
                Ok(row) => rows.push((line, row)),
                Err(e) => {
                    let error = ExplorerError::CsvParse {
                        message: e.to_string(),
                        line: Some(line),
                        column: None,
                        context: ErrorContext {
                            file_path: path.map(Path::to_path_buf),
                            line_number: Some(line),
                            ..Default::default()
                        },
                    };
                    if self.skip_invalid_records {
                        warn!("Skipping unreadable row: {}", error);
                    } else {
                        return Err(error);
                    }
                }
            }
        }

        let flag_columns = detect_flag_columns(&index, &rows);
        if !flag_columns.is_empty() {
            debug!("Treating {} extra columns as boolean flags", flag_columns.len());
        }

        #[cfg(feature = "progress")]
        let progress_bar = if self.show_progress_bar {
            let pb = ProgressBar::new(rows.len() as u64);
            pb.set_style(
                ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows")
                    .map(|style| style.progress_chars("#>-"))
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(pb)
        } else {
            None
        };

        let mut records = Vec::with_capacity(rows.len());
        let mut invalid_count = 0;

        for (line, row) in &rows {
            #[cfg(feature = "progress")]
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }

            match parse_record(row, &index, &flag_columns, *line, path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    invalid_count += 1;
                    if !self.skip_invalid_records {
                        return Err(e);
                    }
                    if invalid_count <= MAX_LOGGED_WARNINGS {
                        warn!("Skipping invalid record at line {}: {}", line, e);
                    }
                }
            }
        }

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }

        if invalid_count > 0 {
            warn!("Skipped {} invalid records", invalid_count);
        }

        Ok(records)
    }
}

/// Extra columns whose every non-empty value is a boolean literal
fn detect_flag_columns(index: &ColumnIndex, rows: &[(usize, StringRecord)]) -> Vec<(usize, String)> {
    index
        .extra_columns()
        .iter()
        .filter(|(pos, _)| {
            let mut values = rows
                .iter()
                .filter_map(|(_, row)| row.get(*pos))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .peekable();
            values.peek().is_some() && values.all(|v| parse_bool(v).is_some())
        })
        .cloned()
        .collect()
}

fn parse_record(
    row: &StringRecord,
    index: &ColumnIndex,
    flag_columns: &[(usize, String)],
    line_number: usize,
    path: Option<&Path>,
) -> Result<PharmacyRecord> {
    let get_field = |column: &str| -> Option<String> {
        index.get(column)
            .and_then(|pos| row.get(pos))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let name_cell = get_field(COL_PHARMACY_NAME);

    let invalid = |column: &str, value: &str, message: String| ExplorerError::DataValidation {
        message,
        field: Some(column.to_string()),
        value: Some(value.to_string()),
        context: ErrorContext {
            file_path: path.map(Path::to_path_buf),
            line_number: Some(line_number),
            column_name: Some(column.to_string()),
            pharmacy_name: name_cell.clone(),
        },
    };

    let get_bool = |column: &str| -> Result<bool> {
        match get_field(column) {
            Some(value) => parse_bool(&value).ok_or_else(|| {
                invalid(column, &value, format!("Expected True or False in '{}', found '{}'", column, value))
            }),
            None => Ok(false),
        }
    };

    let get_coordinate = |column: &str| -> Result<Option<f64>> {
        match get_field(column) {
            Some(value) => value
                .parse::<f64>()
                .map(|v| if v.is_finite() { Some(v) } else { None })
                .map_err(|_| invalid(column, &value, format!("Invalid coordinate in '{}': '{}'", column, value))),
            None => Ok(None),
        }
    };

    let pharmacy_name = name_cell.clone().ok_or_else(|| ExplorerError::DataValidation {
        message: format!("Missing required field: {}", COL_PHARMACY_NAME),
        field: Some(COL_PHARMACY_NAME.to_string()),
        value: None,
        context: ErrorContext {
            file_path: path.map(Path::to_path_buf),
            line_number: Some(line_number),
            ..Default::default()
        },
    })?;

    let expiration_date = get_field(COL_EXPIRATION_DATE)
        .map(|s| parse_date(&s))
        .transpose()
        .map_err(|e| match e {
            ExplorerError::DateParse { value, expected_format, .. } => invalid(
                COL_EXPIRATION_DATE,
                &value,
                format!("Invalid date in '{}': '{}' (expected {})", COL_EXPIRATION_DATE, value, expected_format),
            ),
            other => other,
        })?;

    let mut flags = BTreeMap::new();
    for (pos, name) in flag_columns {
        if let Some(value) = row.get(*pos).and_then(|v| parse_bool(v.trim())) {
            flags.insert(name.clone(), value);
        }
    }

    Ok(PharmacyRecord {
        license_number: get_field(COL_LICENSE_NUMBER),
        entity_type: get_field(COL_ENTITY_TYPE),
        license_type: get_field(COL_LICENSE_TYPE),
        facility_type: get_field(COL_FACILITY_TYPE),
        city: get_field(COL_CITY),
        county: get_field(COL_COUNTY),
        state: get_field(COL_STATE),
        zip: get_field(COL_ZIP),
        is_government: get_bool(COL_IS_GOVERNMENT)?,
        is_satellite: get_bool(COL_IS_SATELLITE)?,
        registered_outsourcer: get_bool(COL_REGISTERED_OUTSOURCER)?,
        flags,
        specialties: get_field(COL_SPECIALTIES),
        conditions: get_field(COL_CONDITIONS),
        accreditations: get_field(COL_ACCREDITATIONS),
        expiration_date,
        latitude: get_coordinate(COL_LATITUDE)?,
        longitude: get_coordinate(COL_LONGITUDE)?,
        pharmacy_name,
    })
}

/// Parse the "True"/"False" text encoding (also 1/0)
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parse an expiration date in any of the supported layouts
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_str, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(date_str, fmt).ok())
                .map(|dt| dt.date())
        })
        .ok_or_else(|| ExplorerError::date_parse_with_format(date_str, "YYYY-MM-DD or MM/DD/YYYY"))
}
