/*!
 * Export functionality for filtered rows and count tables
 *
 * These are the hand-off points to the display collaborator: a filtered
 * table for tabular display and pre-aggregated `value,count` tables for
 * charting, as JSON, JSON Lines, or CSV.
 */

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::{Result, ExportFormat};
use crate::analytics::CountTable;
use crate::data_types::PharmacyRecord;

/// Header of the flat CSV export
const CSV_HEADERS: &[&str] = &[
    "Pharmacy Name",
    "License Number",
    "Entity Type",
    "License Type",
    "Facility Type",
    "City",
    "County",
    "State",
    "Zip",
    "isGovernment",
    "isSatellite",
    "Registered Outsourcer",
    "Specialties",
    "Conditions",
    "Accreditations",
    "Expiration Date",
    "latitude",
    "longitude",
];

/// Trait for implementing row exporters
pub trait RecordExporter {
    /// Write the given rows to any writer
    fn write_records<W: Write>(&self, records: &[&PharmacyRecord], writer: W) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;

    /// Write the given rows to a file
    fn export(&self, records: &[&PharmacyRecord], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_records(records, BufWriter::new(file))?;
        info!("Exported {} rows as {} to {}", records.len(), self.format(), path.display());
        Ok(())
    }
}

/// JSON exporter
pub struct JsonExporter {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
    /// Whether to export as JSON Lines (one record per line)
    pub json_lines: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self {
            pretty_print: true,
            json_lines: false,
        }
    }
}

impl JsonExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// Set JSON Lines format
    pub fn as_json_lines(mut self) -> Self {
        self.json_lines = true;
        self.pretty_print = false;
        self
    }
}

impl RecordExporter for JsonExporter {
    fn write_records<W: Write>(&self, records: &[&PharmacyRecord], mut writer: W) -> Result<()> {
        if self.json_lines {
            for record in records {
                serde_json::to_writer(&mut writer, record)?;
                writeln!(writer)?;
            }
        } else if self.pretty_print {
            serde_json::to_writer_pretty(&mut writer, records)?;
        } else {
            serde_json::to_writer(&mut writer, records)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        if self.json_lines {
            ExportFormat::JsonLines
        } else {
            ExportFormat::Json
        }
    }
}

/// CSV exporter writing the source column layout
pub struct CsvExporter {
    /// Whether to include headers
    pub include_headers: bool,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
        }
    }
}

impl CsvExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl RecordExporter for CsvExporter {
    fn write_records<W: Write>(&self, records: &[&PharmacyRecord], writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        // Extra flag columns follow the fixed layout, sorted by name
        let flag_names: BTreeSet<&str> = records
            .iter()
            .flat_map(|record| record.flags.keys().map(String::as_str))
            .collect();

        if self.include_headers {
            csv_writer.write_record(CSV_HEADERS.iter().copied().chain(flag_names.iter().copied()))?;
        }

        let bool_text = |b: bool| if b { "True" } else { "False" };
        for record in records {
            let expiration = record.expiration_date.map(|d| d.to_string()).unwrap_or_default();
            let latitude = record.latitude.map(|v| v.to_string()).unwrap_or_default();
            let longitude = record.longitude.map(|v| v.to_string()).unwrap_or_default();

            let fixed = [
                record.pharmacy_name.as_str(),
                record.license_number.as_deref().unwrap_or(""),
                record.entity_type.as_deref().unwrap_or(""),
                record.license_type.as_deref().unwrap_or(""),
                record.facility_type.as_deref().unwrap_or(""),
                record.city.as_deref().unwrap_or(""),
                record.county.as_deref().unwrap_or(""),
                record.state.as_deref().unwrap_or(""),
                record.zip.as_deref().unwrap_or(""),
                bool_text(record.is_government),
                bool_text(record.is_satellite),
                bool_text(record.registered_outsourcer),
                record.specialties.as_deref().unwrap_or(""),
                record.conditions.as_deref().unwrap_or(""),
                record.accreditations.as_deref().unwrap_or(""),
                expiration.as_str(),
                latitude.as_str(),
                longitude.as_str(),
            ];
            let flags = flag_names
                .iter()
                .map(|name| record.flag(name).map(bool_text).unwrap_or(""));
            csv_writer.write_record(fixed.into_iter().chain(flags))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// Export rows in the requested format
pub fn export_records(records: &[&PharmacyRecord], path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Json => JsonExporter::new().export(records, path),
        ExportFormat::JsonLines => JsonExporter::new().as_json_lines().export(records, path),
        ExportFormat::Csv => CsvExporter::new().export(records, path),
    }
}

#[derive(Serialize)]
struct CountRow<'a> {
    value: &'a str,
    count: usize,
}

/// Write a count table (`value`, `count`) for a charting collaborator
pub fn write_counts<W: Write>(table: &CountTable, label: &str, format: ExportFormat, mut writer: W) -> Result<()> {
    let rows: Vec<CountRow> = table
        .iter()
        .map(|(value, count)| CountRow { value, count: *count })
        .collect();

    match format {
        ExportFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            csv_writer.write_record([label, "Count"])?;
            for row in &rows {
                csv_writer.write_record([row.value, row.count.to_string().as_str()])?;
            }
            csv_writer.flush()?;
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &rows)?;
            writer.flush()?;
        }
        ExportFormat::JsonLines => {
            for row in &rows {
                serde_json::to_writer(&mut writer, row)?;
                writeln!(writer)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

/// Write a count table to a file
pub fn export_counts(table: &CountTable, label: &str, path: &Path, format: ExportFormat) -> Result<()> {
    let file = File::create(path)?;
    write_counts(table, label, format, BufWriter::new(file))?;
    info!("Exported {} {} counts to {}", table.len(), label, path.display());
    Ok(())
}
