/*!
 * # California Compounding Pharmacy License Explorer
 *
 * A Rust library for exploring California sterile-compounding pharmacy
 * license exports.
 *
 * ## Features
 *
 * - **Tag Vocabularies**: Split comma-joined Specialties, Conditions and
 *   Accreditations cells into a sorted, de-duplicated vocabulary
 * - **Facet Filtering**: OR within a column, AND across columns, AND over
 *   selected tags, plus the Patient-Specific / Bulk purchasing style rule
 * - **Chart-Ready Aggregations**: Value counts, county counts, expirations
 *   per month and geocoded map points
 * - **Export**: Filtered rows and count tables as JSON, JSON Lines or CSV
 *
 * ## Quick Start
 *
 * ```no_run
 * use ca_compounding::prelude::*;
 *
 * # fn main() -> Result<()> {
 * // Loads all_pharmacies.csv (and available_pharmacies.csv if present)
 * let dataset = PharmacyDataset::load_standard("./data")?;
 *
 * // Options for the specialty selector
 * for term in dataset.vocabulary(TagField::Specialties) {
 *     println!("{}", term);
 * }
 *
 * let matches = dataset
 *     .query()
 *     .city("Los Angeles")
 *     .city("San Francisco")
 *     .specialty("Oncology")
 *     .purchasing_style(PurchasingStyle::PatientSpecific)
 *     .execute()?;
 *
 * println!("Found {} pharmacies", matches.len());
 * # Ok(())
 * # }
 * ```
 *
 * ## Filtering With Selections
 *
 * ```no_run
 * # use ca_compounding::prelude::*;
 * # fn main() -> Result<()> {
 * # let dataset = PharmacyDataset::load_standard("./data")?;
 * let selections = FacetSelections::new()
 *     .select("Facility Type", ["Hospital"])
 *     .select("Accreditations", ["PCAB", "TJC"])
 *     .purchasing_styles([PurchasingStyle::Bulk]);
 *
 * let rows = dataset.filter(&selections)?;
 *
 * // Aggregate the filtered rows for charts
 * let analytics = PharmacyAnalytics::new(rows.iter().copied());
 * let by_license = analytics.value_counts(CategoricalField::LicenseType);
 * ca_compounding::export::export_counts(
 *     &by_license,
 *     "License Type",
 *     std::path::Path::new("license_types.csv"),
 *     ExportFormat::Csv,
 * )?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Configuration
 *
 * ```no_run
 * # use ca_compounding::prelude::*;
 * # fn main() -> Result<()> {
 * let config = ConfigBuilder::new()
 *     .skip_invalid_records(true)
 *     .synonym("Peds", "Pediatrics")
 *     .build();
 *
 * let dataset = PharmacyDatasetBuilder::from_config(&config)
 *     .discover("./data")?
 *     .build()?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Data Files
 *
 * - **License list**: `all_pharmacies*.csv`, one row per license
 * - **Available pharmacies**: `available_pharmacies*.csv`, same layout
 */

// Re-export error types from root
pub use error::{ExplorerError, Result, ErrorContext, ExportFormat};

// Public modules
pub mod data_types;
pub mod reader;
pub mod schema;
pub mod error;
pub mod tags;
pub mod filter;
pub mod analytics;
pub mod dataset;
pub mod export;
pub mod config;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use ca_compounding::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::*;
    pub use crate::reader::PharmacyReader;
    pub use crate::schema::PharmacySchema;
    pub use crate::error::{ExplorerError, Result};
    pub use crate::tags::{SynonymTable, TagExtractor};
    pub use crate::filter::{FacetFilter, FacetSelections, apply_filters};
    pub use crate::analytics::{PharmacyAnalytics, DatasetStats, CountTable};
    pub use crate::dataset::{PharmacyDataset, PharmacyDatasetBuilder};
    pub use crate::export::{RecordExporter, JsonExporter, CsvExporter};
    pub use crate::config::{ConfigBuilder, ExplorerConfig};
    pub use crate::ExportFormat;
}

/// Column names and file naming conventions of the license exports
pub mod constants {
    pub const COL_PHARMACY_NAME: &str = "Pharmacy Name";
    pub const COL_LICENSE_NUMBER: &str = "License Number";
    pub const COL_ENTITY_TYPE: &str = "Entity Type";
    pub const COL_LICENSE_TYPE: &str = "License Type";
    pub const COL_FACILITY_TYPE: &str = "Facility Type";
    pub const COL_CITY: &str = "City";
    pub const COL_COUNTY: &str = "County";
    pub const COL_STATE: &str = "State";
    pub const COL_ZIP: &str = "Zip";
    pub const COL_IS_GOVERNMENT: &str = "isGovernment";
    pub const COL_IS_SATELLITE: &str = "isSatellite";
    pub const COL_REGISTERED_OUTSOURCER: &str = "Registered Outsourcer";
    pub const COL_SPECIALTIES: &str = "Specialties";
    pub const COL_CONDITIONS: &str = "Conditions";
    pub const COL_ACCREDITATIONS: &str = "Accreditations";
    pub const COL_EXPIRATION_DATE: &str = "Expiration Date";
    pub const COL_LATITUDE: &str = "latitude";
    pub const COL_LONGITUDE: &str = "longitude";

    /// Derived facet; not a column of the source files
    pub const COL_PURCHASING_STYLE: &str = "Purchasing Style";

    /// Separator between labels inside a tag cell
    pub const TAG_DELIMITER: char = ',';

    /// Purchasing style labels (503A / 503B)
    pub const PATIENT_SPECIFIC_LABEL: &str = "Patient-Specific";
    pub const BULK_LABEL: &str = "Bulk";

    /// Data file naming patterns
    pub const ALL_PHARMACIES_FILE_PREFIX: &str = "all_pharmacies";
    pub const AVAILABLE_PHARMACIES_FILE_PREFIX: &str = "available_pharmacies";
}

/// Common recipes and utility functions
pub mod cookbook {
    use crate::prelude::*;

    /// Pharmacies in a city that list a specialty
    ///
    /// # Example
    /// ```no_run
    /// # use ca_compounding::prelude::*;
    /// # use ca_compounding::cookbook::find_specialists_in_city;
    /// # fn main() -> Result<()> {
    /// # let dataset = PharmacyDataset::load_standard("./data")?;
    /// let oncology = find_specialists_in_city(&dataset, "Oncology", "Los Angeles")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn find_specialists_in_city<'a>(
        dataset: &'a PharmacyDataset,
        specialty: &str,
        city: &str,
    ) -> Result<Vec<&'a PharmacyRecord>> {
        dataset.query()
            .city(city)
            .specialty(specialty)
            .execute()
    }

    /// Registered outsourcing facilities (503B)
    pub fn outsourcing_facilities(dataset: &PharmacyDataset) -> Result<Vec<&PharmacyRecord>> {
        dataset.query()
            .purchasing_style(PurchasingStyle::Bulk)
            .execute()
    }

    /// Case-insensitive substring search on the pharmacy name
    pub fn find_by_partial_name<'a>(
        dataset: &'a PharmacyDataset,
        name_query: &str,
    ) -> Vec<&'a PharmacyRecord> {
        let query_lower = name_query.to_lowercase();

        dataset.records().iter()
            .filter(|p| p.pharmacy_name.to_lowercase().contains(&query_lower))
            .collect()
    }

    /// Number of rows per specialty, most common first
    pub fn specialty_distribution(dataset: &PharmacyDataset) -> CountTable {
        dataset.analytics().tag_counts(TagField::Specialties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    fn dataset() -> PharmacyDataset {
        let mut alpha = PharmacyRecord::new("Alpha Compounding");
        alpha.city = Some("Los Angeles".into());
        alpha.specialties = Some("Oncology, Pediatrics".into());

        let mut beta = PharmacyRecord::new("Beta Outsourcing");
        beta.city = Some("Fresno".into());
        beta.registered_outsourcer = true;
        beta.specialties = Some("Oncology".into());

        PharmacyDataset::new(vec![alpha, beta])
    }

    #[test]
    fn test_facet_names() {
        assert_eq!(Facet::parse(constants::COL_CITY).unwrap(), Facet::Categorical(CategoricalField::City));
        assert_eq!(Facet::parse(constants::COL_PURCHASING_STYLE).unwrap(), Facet::PurchasingStyle);
        assert!(Facet::parse("Favorite Color").is_err());
    }

    #[test]
    fn test_cookbook_recipes() {
        let dataset = dataset();
        let specialists = cookbook::find_specialists_in_city(&dataset, "Oncology", "Los Angeles").unwrap();
        assert_eq!(specialists.len(), 1);

        let outsourcers = cookbook::outsourcing_facilities(&dataset).unwrap();
        assert_eq!(outsourcers[0].pharmacy_name, "Beta Outsourcing");

        assert_eq!(cookbook::find_by_partial_name(&dataset, "alpha").len(), 1);
        assert_eq!(cookbook::specialty_distribution(&dataset)[0], ("Oncology".to_string(), 2));
    }
}
