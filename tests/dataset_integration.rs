/*!
 * Integration tests for loading license files from disk and exploring them
 *
 * Each test writes small license CSVs into a temporary directory, then goes
 * through the public dataset, filter, analytics and export APIs.
 */

use std::fs;
use std::path::Path;

use ca_compounding::export::{export_counts, export_records};
use ca_compounding::prelude::*;
use tempfile::TempDir;

const ALL_PHARMACIES: &str = "\
Pharmacy Name,License Number,License Type,Facility Type,City,County,Registered Outsourcer,isGovernment,isSatellite,Specialties,Conditions,Accreditations,Expiration Date,latitude,longitude
Alpha Compounding,LSC 100,Sterile Compounding,Community,Los Angeles,Los Angeles,False,False,False,\"Oncology, Pediatrics\",Cancer,Pharmacy Compounding Accreditation Board,2025-03-31,34.05,-118.24
Bay Infusion,LSC 200,Sterile Compounding,Hospital,San Francisco,San Francisco,False,True,False,Oncology,\"Cancer, Nutrition\",\"PCAB, The Joint Commission\",2025-03-15,37.77,-122.42
Central Outsourcing,OSF 300,Outsourcing Facility,Manufacturer,Fresno,Fresno,True,False,False,\"Pediatrics, Ophthalmology\",,URAC,2026-01-31,,
Delta Rx,LSC 400,Sterile Compounding,Community,Sacramento,,False,False,True,,,,03/31/2025,38.58,-121.49
";

const AVAILABLE_PHARMACIES: &str = "\
Pharmacy Name,License Type,City,Registered Outsourcer,Specialties
Bay Infusion,Sterile Compounding,San Francisco,False,Oncology
";

fn write_data_dir(with_available: bool) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("all_pharmacies.csv"), ALL_PHARMACIES).unwrap();
    if with_available {
        fs::write(dir.path().join("available_pharmacies.csv"), AVAILABLE_PHARMACIES).unwrap();
    }
    dir
}

fn names(rows: &[&PharmacyRecord]) -> Vec<String> {
    rows.iter().map(|r| r.pharmacy_name.clone()).collect()
}

#[test]
fn test_load_standard_directory() {
    let dir = write_data_dir(true);
    let dataset = PharmacyDataset::load_standard(dir.path()).unwrap();

    assert_eq!(dataset.len(), 4);
    assert_eq!(dataset.available().map(|rows| rows.len()), Some(1));

    let stats = dataset.statistics();
    assert_eq!(stats.total_pharmacies, 4);
    assert_eq!(stats.outsourcing_facilities, 1);
    assert_eq!(stats.government_owned, 1);
    assert_eq!(stats.satellites, 1);
    assert_eq!(stats.geocoded, 3);
}

#[test]
fn test_vocabularies_are_sorted_and_normalized() {
    let dir = write_data_dir(false);
    let dataset = PharmacyDataset::load_standard(dir.path()).unwrap();

    let specialties: Vec<&str> = dataset.vocabulary(TagField::Specialties).iter().map(String::as_str).collect();
    assert_eq!(specialties, vec!["Oncology", "Ophthalmology", "Pediatrics"]);

    let accreditations: Vec<&str> = dataset.vocabulary(TagField::Accreditations).iter().map(String::as_str).collect();
    assert_eq!(accreditations, vec!["PCAB", "TJC", "URAC"]);

    let cities: Vec<&str> = dataset.options(CategoricalField::City).into_iter().collect();
    assert_eq!(cities, vec!["Fresno", "Los Angeles", "Sacramento", "San Francisco"]);
}

#[test]
fn test_facet_filters_end_to_end() {
    let dir = write_data_dir(false);
    let dataset = PharmacyDataset::load_standard(dir.path()).unwrap();

    // OR within a column
    let coastal = dataset
        .filter(&FacetSelections::new().select("City", ["Los Angeles", "San Francisco"]))
        .unwrap();
    assert_eq!(names(&coastal), vec!["Alpha Compounding", "Bay Infusion"]);

    // AND across tags, matched after synonym normalization
    let both = dataset
        .filter(&FacetSelections::new().select("Accreditations", ["PCAB", "TJC"]))
        .unwrap();
    assert_eq!(names(&both), vec!["Bay Infusion"]);

    let pcab = dataset
        .filter(&FacetSelections::new().select("Accreditations", ["PCAB"]))
        .unwrap();
    assert_eq!(names(&pcab), vec!["Alpha Compounding", "Bay Infusion"]);

    // Purchasing style
    let bulk = dataset
        .filter(&FacetSelections::new().purchasing_styles([PurchasingStyle::Bulk]))
        .unwrap();
    assert_eq!(names(&bulk), vec!["Central Outsourcing"]);

    let both_styles = dataset
        .filter(&FacetSelections::new().purchasing_styles(PurchasingStyle::ALL))
        .unwrap();
    assert_eq!(both_styles.len(), dataset.len());

    // Empty selection returns every row in order
    let all = dataset.filter(&FacetSelections::new()).unwrap();
    assert_eq!(names(&all), names(&dataset.records().iter().collect::<Vec<_>>()));
}

#[test]
fn test_unknown_facet_and_invalid_style_are_errors() {
    let dir = write_data_dir(false);
    let dataset = PharmacyDataset::load_standard(dir.path()).unwrap();

    let unknown = dataset.filter(&FacetSelections::new().select("Favorite Color", ["Blue"]));
    assert!(matches!(unknown, Err(ExplorerError::UnknownFacet { .. })));

    let invalid = dataset.filter(&FacetSelections::new().select("Purchasing Style", ["Wholesale"]));
    assert!(matches!(invalid, Err(ExplorerError::InvalidFacetValue { .. })));
}

#[test]
fn test_filter_available_rows() {
    let dir = write_data_dir(true);
    let dataset = PharmacyDataset::load_standard(dir.path()).unwrap();

    let oncology = FacetSelections::new().select("Specialties", ["Oncology"]);
    assert_eq!(dataset.filter(&oncology).unwrap().len(), 2);
    assert_eq!(names(&dataset.filter_available(&oncology).unwrap()), vec!["Bay Infusion"]);
}

#[test]
fn test_analytics_over_filtered_rows() {
    let dir = write_data_dir(false);
    let dataset = PharmacyDataset::load_standard(dir.path()).unwrap();

    let sterile = dataset
        .filter(&FacetSelections::new().select("License Type", ["Sterile Compounding"]))
        .unwrap();
    let analytics = PharmacyAnalytics::new(sterile.iter().copied());

    assert_eq!(
        analytics.tag_counts(TagField::Conditions),
        vec![("Cancer".to_string(), 2), ("Nutrition".to_string(), 1)]
    );
    assert_eq!(
        analytics.expirations_by_month(),
        vec![("2025-03".to_string(), 3)]
    );
    assert_eq!(analytics.geocoded_points().len(), 3);
}

#[test]
fn test_missing_required_column() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("all_pharmacies.csv"), "Pharmacy Name,City\nAlpha,Los Angeles\n").unwrap();

    let err = PharmacyDataset::load_standard(dir.path()).unwrap_err();
    assert!(matches!(err, ExplorerError::MissingColumn { ref column, .. } if column == "License Type"));
}

#[test]
fn test_missing_license_list() {
    let dir = TempDir::new().unwrap();
    let err = PharmacyDataset::load_standard(dir.path()).unwrap_err();
    assert!(matches!(err, ExplorerError::FileNotFound { .. }));
}

#[test]
fn test_builder_from_config_applies_synonyms() {
    let dir = write_data_dir(false);
    let config = ConfigBuilder::new()
        .synonym("Ophthalmology", "Eye Care")
        .build();

    let dataset = PharmacyDatasetBuilder::from_config(&config)
        .discover(dir.path())
        .unwrap()
        .build()
        .unwrap();

    assert!(dataset.vocabulary(TagField::Specialties).contains("Eye Care"));
    assert_eq!(dataset.query().specialty("Eye Care").count().unwrap(), 1);
}

#[test]
fn test_export_filtered_rows_and_counts() {
    let dir = write_data_dir(false);
    let dataset = PharmacyDataset::load_standard(dir.path()).unwrap();
    let out = TempDir::new().unwrap();

    let selections = FacetSelections::new().select("Specialties", ["Oncology"]);
    let csv_path = out.path().join("oncology.csv");
    let written = dataset.export_filtered(&selections, &csv_path, ExportFormat::Csv).unwrap();
    assert_eq!(written, 2);

    // The exported CSV loads back as a license list
    let reloaded = PharmacyReader::new().load(&csv_path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded[1].accreditations.as_deref(), Some("PCAB, The Joint Commission"));

    let rows = dataset.filter(&selections).unwrap();
    let jsonl_path = out.path().join("oncology.jsonl");
    export_records(&rows, &jsonl_path, ExportFormat::JsonLines).unwrap();
    assert_eq!(read(&jsonl_path).lines().count(), 2);

    let counts = dataset.analytics().value_counts(CategoricalField::LicenseType);
    let counts_path = out.path().join("license_types.json");
    export_counts(&counts, "License Type", &counts_path, ExportFormat::Json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&read(&counts_path)).unwrap();
    assert_eq!(parsed[0]["value"], "Sterile Compounding");
    assert_eq!(parsed[0]["count"], 3);
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
