/*!
 * Tag extraction for multi-valued columns
 *
 * Cells in the Specialties, Conditions and Accreditations columns hold zero or
 * more comma-joined labels. This module splits them into trimmed terms,
 * collapses known synonyms, and builds the selectable vocabulary for each
 * column.
 */

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::TAG_DELIMITER;
use crate::data_types::{PharmacyRecord, TagField};
use crate::{ExplorerError, Result};

/// Built-in long-form labels and the canonical label they collapse to
const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("Pharmacy Compounding Accreditation Board", "PCAB"),
    ("Accreditation Commission for Health Care", "ACHC"),
    ("The Joint Commission", "TJC"),
    ("Joint Commission", "TJC"),
    ("Center for Pharmacy Practice Accreditation", "CPPA"),
    ("Utilization Review Accreditation Commission", "URAC"),
    ("Hormone Replacement Therapy", "HRT"),
    ("Bioidentical Hormone Replacement Therapy", "BHRT"),
    ("Total Parenteral Nutrition", "TPN"),
];

/// Lookup table from a label variant to its canonical form
///
/// Keys are matched case-insensitively against the trimmed term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymTable {
    entries: BTreeMap<String, String>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (variant, canonical) in DEFAULT_SYNONYMS {
            table.insert(*variant, *canonical);
        }
        table
    }
}

impl SynonymTable {
    /// A table that leaves every term unchanged
    pub fn empty() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Add or replace a synonym
    pub fn insert<V: AsRef<str>, C: Into<String>>(&mut self, variant: V, canonical: C) {
        self.entries.insert(variant.as_ref().trim().to_lowercase(), canonical.into().trim().to_string());
    }

    /// Add every entry of a map (e.g. from configuration)
    pub fn with_entries<'a, I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (variant, canonical) in entries {
            self.insert(variant, canonical.as_str());
        }
        self
    }

    /// Canonical form of a trimmed term
    pub fn normalize<'a>(&'a self, term: &'a str) -> &'a str {
        self.entries
            .get(&term.to_lowercase())
            .map(String::as_str)
            .unwrap_or(term)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits tag cells and builds vocabularies
#[derive(Debug, Clone)]
pub struct TagExtractor {
    synonyms: SynonymTable,
    delimiter: char,
}

impl Default for TagExtractor {
    fn default() -> Self {
        Self::new(SynonymTable::default())
    }
}

impl TagExtractor {
    pub fn new(synonyms: SynonymTable) -> Self {
        Self {
            synonyms,
            delimiter: TAG_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// Normalize a single user-supplied term the same way cell terms are
    pub fn normalize_term(&self, term: &str) -> Option<String> {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(self.synonyms.normalize(trimmed).to_string())
        }
    }

    /// Split one cell into distinct, trimmed, normalized terms (first-seen order)
    pub fn split(&self, cell: &str) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for raw in cell.split(self.delimiter) {
            if let Some(term) = self.normalize_term(raw) {
                if !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }
        terms
    }

    /// Distinct terms of a column across all rows, in lexicographic order
    ///
    /// Null cells are skipped; a column with no values yields an empty set.
    pub fn vocabulary<'r, I>(&self, rows: I, field: TagField) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'r PharmacyRecord>,
    {
        rows.into_iter()
            .filter_map(|row| row.tag_cell(field))
            .flat_map(|cell| self.split(cell))
            .collect()
    }

    /// Number of rows carrying each term, most frequent first
    ///
    /// A term repeated inside one cell counts once for that row.
    pub fn counts<'r, I>(&self, rows: I, field: TagField) -> Vec<(String, usize)>
    where
        I: IntoIterator<Item = &'r PharmacyRecord>,
    {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for cell in rows.into_iter().filter_map(|row| row.tag_cell(field)) {
            for term in self.split(cell) {
                *counts.entry(term).or_insert(0) += 1;
            }
        }

        let mut sorted: Vec<_> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted
    }
}

/// Split a cell with the given synonyms and the default delimiter
pub fn split_tags(cell: &str, synonyms: &SynonymTable) -> Vec<String> {
    TagExtractor::new(synonyms.clone()).split(cell)
}

/// Vocabulary of a tag column using the default synonym table
pub fn extract_vocabulary(rows: &[PharmacyRecord], field: TagField) -> BTreeSet<String> {
    TagExtractor::default().vocabulary(rows, field)
}

/// Rows per term of a tag column, most frequent first
pub fn tag_counts(rows: &[PharmacyRecord], field: TagField, synonyms: &SynonymTable) -> Vec<(String, usize)> {
    TagExtractor::new(synonyms.clone()).counts(rows, field)
}

/// Vocabulary of a tag column named by its header
pub fn extract_vocabulary_by_name(rows: &[PharmacyRecord], column: &str) -> Result<BTreeSet<String>> {
    let field = TagField::from_column(column).ok_or_else(|| ExplorerError::unknown_facet(column))?;
    Ok(extract_vocabulary(rows, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_with_specialties(cells: &[Option<&str>]) -> Vec<PharmacyRecord> {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| PharmacyRecord {
                pharmacy_name: format!("Pharmacy {}", i),
                specialties: cell.map(str::to_string),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_vocabulary_skips_nulls() {
        let rows = rows_with_specialties(&[Some("A, B"), Some("B, C"), None]);
        let vocab = extract_vocabulary(&rows, TagField::Specialties);
        assert_eq!(vocab.into_iter().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_all_null_column_is_empty() {
        let rows = rows_with_specialties(&[None, None]);
        assert!(extract_vocabulary(&rows, TagField::Specialties).is_empty());
        assert!(extract_vocabulary(&rows, TagField::Conditions).is_empty());
    }

    #[test]
    fn test_vocabulary_is_order_independent() {
        let mut rows = rows_with_specialties(&[Some("Oncology, Pediatrics"), Some("Dermatology"), Some(" ,Oncology,,")]);
        let forward = extract_vocabulary(&rows, TagField::Specialties);
        rows.reverse();
        let reversed = extract_vocabulary(&rows, TagField::Specialties);
        assert_eq!(forward, reversed);
        assert_eq!(forward, extract_vocabulary(&rows, TagField::Specialties));
        assert_eq!(forward.len(), 3);
    }

    #[test]
    fn test_split_trims_and_dedupes() {
        let synonyms = SynonymTable::empty();
        assert_eq!(split_tags("  Oncology ,Pediatrics, Oncology,, ", &synonyms), vec!["Oncology", "Pediatrics"]);
        assert!(split_tags("", &synonyms).is_empty());
        assert!(split_tags(" , ", &synonyms).is_empty());
    }

    #[test]
    fn test_synonyms_collapse_long_forms() {
        let extractor = TagExtractor::default();
        assert_eq!(
            extractor.split("Pharmacy Compounding Accreditation Board, PCAB, the joint commission"),
            vec!["PCAB", "TJC"]
        );
    }

    #[test]
    fn test_synonyms_from_config_entries() {
        let extra: BTreeMap<String, String> =
            [("Peds".to_string(), "Pediatrics".to_string())].into_iter().collect();
        let synonyms = SynonymTable::empty().with_entries(&extra);
        assert_eq!(synonyms.len(), 1);
        assert_eq!(split_tags("peds, Pediatrics", &synonyms), vec!["Pediatrics"]);
    }

    #[test]
    fn test_counts_rank_by_frequency() {
        let rows = rows_with_specialties(&[Some("A, B"), Some("B, C, B"), Some("B"), None]);
        let counts = tag_counts(&rows, TagField::Specialties, &SynonymTable::empty());
        assert_eq!(
            counts,
            vec![("B".to_string(), 3), ("A".to_string(), 1), ("C".to_string(), 1)]
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let extractor = TagExtractor::new(SynonymTable::empty()).with_delimiter(';');
        assert_eq!(extractor.split("A; B, C"), vec!["A", "B, C"]);
    }

    #[test]
    fn test_vocabulary_by_name_rejects_unknown_column() {
        let rows = rows_with_specialties(&[Some("A")]);
        assert!(extract_vocabulary_by_name(&rows, "specialties").is_ok());
        assert!(matches!(
            extract_vocabulary_by_name(&rows, "City"),
            Err(ExplorerError::UnknownFacet { .. })
        ));
    }
}
