/*!
 * Unified dataset API for the license exports
 *
 * Provides a builder for loading the license files once at startup, and an
 * immutable [`PharmacyDataset`] that is passed explicitly to everything that
 * extracts vocabularies, filters, or aggregates.
 */

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{debug, info};

use crate::{Result, ExplorerError, ExportFormat};
use crate::analytics::{DatasetStats, PharmacyAnalytics};
use crate::config::ExplorerConfig;
use crate::constants::{ALL_PHARMACIES_FILE_PREFIX, AVAILABLE_PHARMACIES_FILE_PREFIX};
use crate::data_types::*;
use crate::filter::{FacetFilter, FacetSelections};
use crate::reader::PharmacyReader;
use crate::tags::{SynonymTable, TagExtractor};

/// Builder for loading a license dataset
///
/// # Example
/// ```no_run
/// # use ca_compounding::dataset::PharmacyDatasetBuilder;
/// let dataset = PharmacyDatasetBuilder::new()
///     .all_pharmacies("data/all_pharmacies.csv")
///     .available_pharmacies("data/available_pharmacies.csv")
///     .build()?;
/// # Ok::<(), ca_compounding::ExplorerError>(())
/// ```
pub struct PharmacyDatasetBuilder {
    all_pharmacies_path: Option<PathBuf>,
    available_pharmacies_path: Option<PathBuf>,
    synonyms: SynonymTable,
    tag_delimiter: char,
    skip_invalid_records: bool,
    #[cfg(feature = "progress")]
    show_progress: bool,
}

impl Default for PharmacyDatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PharmacyDatasetBuilder {
    pub fn new() -> Self {
        Self {
            all_pharmacies_path: None,
            available_pharmacies_path: None,
            synonyms: SynonymTable::default(),
            tag_delimiter: crate::constants::TAG_DELIMITER,
            skip_invalid_records: false,
            #[cfg(feature = "progress")]
            show_progress: false,
        }
    }

    /// Start from configuration (synonyms, delimiter, skip/progress settings)
    pub fn from_config(config: &ExplorerConfig) -> Self {
        let builder = Self::new()
            .synonyms(SynonymTable::default().with_entries(&config.synonyms))
            .tag_delimiter(config.tag_delimiter)
            .skip_invalid_records(config.skip_invalid_records);

        #[cfg(feature = "progress")]
        let builder = builder.show_progress(config.enable_progress_bar);

        builder
    }

    /// Set the path to the full license list
    pub fn all_pharmacies<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.all_pharmacies_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the path to the available pharmacies file
    pub fn available_pharmacies<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.available_pharmacies_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replace the synonym table used for tag normalization
    pub fn synonyms(mut self, synonyms: SynonymTable) -> Self {
        self.synonyms = synonyms;
        self
    }

    pub fn tag_delimiter(mut self, delimiter: char) -> Self {
        self.tag_delimiter = delimiter;
        self
    }

    /// Enable or disable skipping invalid records
    pub fn skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable progress bars
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build the dataset, loading all specified files
    pub fn build(self) -> Result<PharmacyDataset> {
        let all_path = self.all_pharmacies_path
            .ok_or_else(|| ExplorerError::Custom {
                message: "License list path not specified".to_string(),
                suggestion: Some("Use .all_pharmacies() to specify the all_pharmacies CSV file".to_string()),
            })?;

        let reader = PharmacyReader::new()
            .with_skip_invalid_records(self.skip_invalid_records);

        #[cfg(feature = "progress")]
        let reader = reader.with_progress_bar(self.show_progress);

        info!("Loading license list from: {}", all_path.display());
        let records = reader.load(&all_path)?;

        let available = match self.available_pharmacies_path {
            Some(path) => {
                info!("Loading available pharmacies from: {}", path.display());
                Some(reader.load(&path)?)
            }
            None => None,
        };

        let extractor = TagExtractor::new(self.synonyms).with_delimiter(self.tag_delimiter);
        Ok(PharmacyDataset::with_extractor(records, available, extractor))
    }

    /// Find the license files in a directory by their standard names
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::new().discover(dir)
    }

    /// Fill in file paths from a directory, keeping other settings
    pub fn discover<P: AsRef<Path>>(mut self, dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        if !dir.is_dir() {
            return Err(ExplorerError::Custom {
                message: format!("'{}' is not a directory", dir.display()),
                suggestion: Some("Provide a directory containing all_pharmacies.csv".to_string()),
            });
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for path in entries {
            let filename = path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("");

            if !filename.ends_with(".csv") {
                continue;
            }
            if filename.starts_with(ALL_PHARMACIES_FILE_PREFIX) && self.all_pharmacies_path.is_none() {
                self = self.all_pharmacies(&path);
            } else if filename.starts_with(AVAILABLE_PHARMACIES_FILE_PREFIX) && self.available_pharmacies_path.is_none() {
                self = self.available_pharmacies(&path);
            }
        }

        if self.all_pharmacies_path.is_none() {
            return Err(ExplorerError::file_not_found_with_suggestion(
                dir.join(format!("{}.csv", ALL_PHARMACIES_FILE_PREFIX)),
            ));
        }

        Ok(self)
    }
}

/// Immutable license dataset with memoized tag vocabularies
#[derive(Debug)]
pub struct PharmacyDataset {
    records: Vec<PharmacyRecord>,
    available: Option<Vec<PharmacyRecord>>,
    extractor: TagExtractor,
    vocabularies: [OnceLock<BTreeSet<String>>; 3],
}

impl PharmacyDataset {
    /// Wrap already-loaded records using the default tag extractor
    pub fn new(records: Vec<PharmacyRecord>) -> Self {
        Self::with_extractor(records, None, TagExtractor::default())
    }

    pub fn with_extractor(
        records: Vec<PharmacyRecord>,
        available: Option<Vec<PharmacyRecord>>,
        extractor: TagExtractor,
    ) -> Self {
        Self {
            records,
            available,
            extractor,
            vocabularies: [OnceLock::new(), OnceLock::new(), OnceLock::new()],
        }
    }

    /// Load the standard files from a directory
    ///
    /// # Example
    /// ```no_run
    /// # use ca_compounding::dataset::PharmacyDataset;
    /// let dataset = PharmacyDataset::load_standard("./data")?;
    /// # Ok::<(), ca_compounding::ExplorerError>(())
    /// ```
    pub fn load_standard<P: AsRef<Path>>(dir: P) -> Result<Self> {
        PharmacyDatasetBuilder::from_directory(dir)?.build()
    }

    /// Every license row
    pub fn records(&self) -> &[PharmacyRecord] {
        &self.records
    }

    /// Rows of the available pharmacies file, if one was loaded
    pub fn available(&self) -> Option<&[PharmacyRecord]> {
        self.available.as_deref()
    }

    pub fn extractor(&self) -> &TagExtractor {
        &self.extractor
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct tags of a column, computed on first use and reused afterwards
    pub fn vocabulary(&self, field: TagField) -> &BTreeSet<String> {
        let slot = match field {
            TagField::Specialties => &self.vocabularies[0],
            TagField::Conditions => &self.vocabularies[1],
            TagField::Accreditations => &self.vocabularies[2],
        };
        slot.get_or_init(|| {
            let vocabulary = self.extractor.vocabulary(&self.records, field);
            debug!("Built {} vocabulary with {} terms", field, vocabulary.len());
            vocabulary
        })
    }

    /// Distinct non-null values of a categorical column, sorted
    pub fn options(&self, field: CategoricalField) -> BTreeSet<&str> {
        self.records.iter().filter_map(|r| r.categorical(field)).collect()
    }

    /// Rows matching a facet selection
    pub fn filter(&self, selections: &FacetSelections) -> Result<Vec<&PharmacyRecord>> {
        let filter = FacetFilter::compile(selections, &self.extractor)?;
        Ok(filter.apply(&self.records))
    }

    /// Rows of the available pharmacies file matching a selection (full list if absent)
    pub fn filter_available(&self, selections: &FacetSelections) -> Result<Vec<&PharmacyRecord>> {
        let filter = FacetFilter::compile(selections, &self.extractor)?;
        Ok(filter.apply(self.available().unwrap_or(&self.records)))
    }

    /// Create a query builder for this dataset
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    /// Create an analytics engine over every row
    pub fn analytics(&self) -> PharmacyAnalytics<'_> {
        PharmacyAnalytics::new(&self.records).with_extractor(self.extractor.clone())
    }

    /// Get dataset statistics
    pub fn statistics(&self) -> DatasetStats {
        self.analytics().stats()
    }

    /// Export the rows matching a selection
    ///
    /// Returns the number of rows written.
    pub fn export_filtered<P: AsRef<Path>>(
        &self,
        selections: &FacetSelections,
        path: P,
        format: ExportFormat,
    ) -> Result<usize> {
        let rows = self.filter(selections)?;
        crate::export::export_records(&rows, path.as_ref(), format)?;
        Ok(rows.len())
    }
}

/// Fluent builder over [`FacetSelections`]
pub struct QueryBuilder<'a> {
    dataset: &'a PharmacyDataset,
    selections: FacetSelections,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(dataset: &'a PharmacyDataset) -> Self {
        Self {
            dataset,
            selections: FacetSelections::new(),
        }
    }

    /// Filter by any facet column
    pub fn facet<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections.insert(column, values);
        self
    }

    pub fn city(self, city: &str) -> Self {
        self.facet(CategoricalField::City.column_name(), [city])
    }

    pub fn facility_type(self, facility_type: &str) -> Self {
        self.facet(CategoricalField::FacilityType.column_name(), [facility_type])
    }

    pub fn license_type(self, license_type: &str) -> Self {
        self.facet(CategoricalField::LicenseType.column_name(), [license_type])
    }

    pub fn specialty(self, specialty: &str) -> Self {
        self.facet(TagField::Specialties.column_name(), [specialty])
    }

    pub fn condition(self, condition: &str) -> Self {
        self.facet(TagField::Conditions.column_name(), [condition])
    }

    pub fn accreditation(self, accreditation: &str) -> Self {
        self.facet(TagField::Accreditations.column_name(), [accreditation])
    }

    pub fn purchasing_style(mut self, style: PurchasingStyle) -> Self {
        self.selections = self.selections.purchasing_styles([style]);
        self
    }

    pub fn selections(&self) -> &FacetSelections {
        &self.selections
    }

    /// Execute the query and return matching pharmacies
    pub fn execute(self) -> Result<Vec<&'a PharmacyRecord>> {
        self.dataset.filter(&self.selections)
    }

    /// Execute the query and return count only
    pub fn count(self) -> Result<usize> {
        let filter = FacetFilter::compile(&self.selections, &self.dataset.extractor)?;
        Ok(filter.count(&self.dataset.records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> PharmacyDataset {
        let mut a = PharmacyRecord::new("Alpha");
        a.city = Some("LA".into());
        a.facility_type = Some("Hospital".into());
        a.specialties = Some("Oncology, Pediatrics".into());
        a.accreditations = Some("Pharmacy Compounding Accreditation Board".into());

        let mut b = PharmacyRecord::new("Beta");
        b.city = Some("SF".into());
        b.specialties = Some("Oncology".into());
        b.accreditations = Some("PCAB, URAC".into());
        b.registered_outsourcer = true;

        PharmacyDataset::new(vec![a, b])
    }

    #[test]
    fn test_vocabulary_is_memoized() {
        let dataset = dataset();
        let first = dataset.vocabulary(TagField::Accreditations) as *const _;
        let second = dataset.vocabulary(TagField::Accreditations) as *const _;
        assert_eq!(first, second);
        assert_eq!(
            dataset.vocabulary(TagField::Accreditations).iter().cloned().collect::<Vec<_>>(),
            vec!["PCAB", "URAC"]
        );
        assert!(dataset.vocabulary(TagField::Conditions).is_empty());
    }

    #[test]
    fn test_query_builder() {
        let dataset = dataset();
        let results = dataset.query().specialty("Oncology").execute().unwrap();
        assert_eq!(results.len(), 2);

        let bulk = dataset.query()
            .specialty("Oncology")
            .purchasing_style(PurchasingStyle::Bulk)
            .execute()
            .unwrap();
        assert_eq!(bulk.len(), 1);
        assert_eq!(bulk[0].pharmacy_name, "Beta");

        assert_eq!(dataset.query().city("LA").facility_type("Hospital").count().unwrap(), 1);
        assert!(dataset.query().facet("Nonexistent", ["x"]).execute().is_err());
    }

    #[test]
    fn test_options_and_available_fallback() {
        let dataset = dataset();
        assert_eq!(dataset.options(CategoricalField::City).into_iter().collect::<Vec<_>>(), vec!["LA", "SF"]);
        assert!(dataset.available().is_none());
        assert_eq!(dataset.filter_available(&FacetSelections::new()).unwrap().len(), 2);
        assert_eq!(dataset.statistics().total_pharmacies, 2);
    }

    #[test]
    fn test_builder_requires_license_list() {
        assert!(matches!(
            PharmacyDatasetBuilder::new().build(),
            Err(ExplorerError::Custom { .. })
        ));
    }
}
