/*!
 * Facet filtering over the loaded license table
 *
 * A [`FacetSelections`] maps column names to the set of values a user picked.
 * [`FacetFilter`] compiles it once into row predicates:
 *
 * - categorical facets keep rows whose value is one of the selected values
 * - tag facets keep rows whose cell contains every selected tag
 * - the purchasing style facet keeps 503A or 503B rows when exactly one style
 *   is selected, and applies no constraint when both or neither are
 *
 * An empty value set never constrains anything. A column name that is not a
 * facet is rejected with [`ExplorerError::UnknownFacet`].
 */

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;

use crate::constants::COL_PURCHASING_STYLE;
use crate::data_types::*;
use crate::tags::TagExtractor;
use crate::Result;

type Predicate = Box<dyn Fn(&PharmacyRecord) -> bool + Send + Sync>;

/// User-selected values per facet column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSelections {
    columns: BTreeMap<String, BTreeSet<String>>,
    purchasing_styles: BTreeSet<PurchasingStyle>,
}

impl FacetSelections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add values for a column, merging with anything already selected
    pub fn select<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(column, values);
        self
    }

    pub fn insert<I, S>(&mut self, column: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns
            .entry(column.to_string())
            .or_default()
            .extend(values.into_iter().map(|v| v.into().trim().to_string()));
    }

    /// Select purchasing styles (the 503A/503B toggle)
    pub fn purchasing_styles<I: IntoIterator<Item = PurchasingStyle>>(mut self, styles: I) -> Self {
        self.purchasing_styles.extend(styles);
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn selected_purchasing_styles(&self) -> &BTreeSet<PurchasingStyle> {
        &self.purchasing_styles
    }

    /// No value selected anywhere
    pub fn is_empty(&self) -> bool {
        self.purchasing_styles.is_empty() && self.columns.values().all(BTreeSet::is_empty)
    }
}

impl From<BTreeMap<String, BTreeSet<String>>> for FacetSelections {
    fn from(columns: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self {
            columns,
            purchasing_styles: BTreeSet::new(),
        }
    }
}

/// Required value of the registered outsourcer flag for a style selection
///
/// Returns `None` when both or neither style is selected.
pub fn purchasing_constraint(styles: &BTreeSet<PurchasingStyle>) -> Option<bool> {
    let patient_specific = styles.contains(&PurchasingStyle::PatientSpecific);
    let bulk = styles.contains(&PurchasingStyle::Bulk);
    match (patient_specific, bulk) {
        (true, false) => Some(false),
        (false, true) => Some(true),
        _ => None,
    }
}

/// Compiled set of facet predicates
pub struct FacetFilter {
    predicates: Vec<(Facet, Predicate)>,
}

impl FacetFilter {
    /// Resolve every selected column and build its predicate
    pub fn compile(selections: &FacetSelections, extractor: &TagExtractor) -> Result<Self> {
        let extractor = Arc::new(extractor.clone());
        let mut predicates: Vec<(Facet, Predicate)> = Vec::new();
        let mut styles = selections.purchasing_styles.clone();

        for (column, values) in &selections.columns {
            let facet = Facet::parse(column)?;

            match facet {
                Facet::Categorical(field) => {
                    if values.is_empty() {
                        continue;
                    }
                    let accepted = values.clone();
                    predicates.push((
                        facet,
                        Box::new(move |record: &PharmacyRecord| {
                            record.categorical(field)
                                .map(|value| accepted.contains(value))
                                .unwrap_or(false)
                        }) as Predicate,
                    ));
                }
                Facet::Tag(field) => {
                    let required: BTreeSet<String> = values
                        .iter()
                        .filter_map(|v| extractor.normalize_term(v))
                        .collect();
                    if required.is_empty() {
                        continue;
                    }
                    let extractor = Arc::clone(&extractor);
                    predicates.push((
                        facet,
                        Box::new(move |record: &PharmacyRecord| match record.tag_cell(field) {
                            Some(cell) => {
                                let terms = extractor.split(cell);
                                required.iter().all(|tag| terms.contains(tag))
                            }
                            None => false,
                        }) as Predicate,
                    ));
                }
                Facet::PurchasingStyle => {
                    for value in values {
                        styles.insert(PurchasingStyle::from_label(value)?);
                    }
                }
            }
        }

        if let Some(outsourcer) = purchasing_constraint(&styles) {
            predicates.push((
                Facet::PurchasingStyle,
                Box::new(move |record: &PharmacyRecord| record.registered_outsourcer == outsourcer) as Predicate,
            ));
        }

        debug!(
            "Compiled facet filter on [{}]",
            predicates.iter().map(|(f, _)| f.column_name()).collect::<Vec<_>>().join(", ")
        );

        Ok(Self { predicates })
    }

    /// Facets that actually constrain rows
    pub fn active_facets(&self) -> Vec<Facet> {
        self.predicates.iter().map(|(facet, _)| *facet).collect()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Whether a single record satisfies every facet
    pub fn matches(&self, record: &PharmacyRecord) -> bool {
        self.predicates.iter().all(|(_, predicate)| predicate(record))
    }

    /// Matching rows, in source order
    pub fn apply<'r>(&self, rows: &'r [PharmacyRecord]) -> Vec<&'r PharmacyRecord> {
        if self.is_unconstrained() {
            return rows.iter().collect();
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            rows.par_iter()
                .filter(|record| self.matches(record))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            rows.iter()
                .filter(|record| self.matches(record))
                .collect()
        }
    }

    /// Number of matching rows
    pub fn count(&self, rows: &[PharmacyRecord]) -> usize {
        rows.iter().filter(|record| self.matches(record)).count()
    }
}

/// Filter rows with the default tag extractor
pub fn apply_filters<'r>(rows: &'r [PharmacyRecord], selections: &FacetSelections) -> Result<Vec<&'r PharmacyRecord>> {
    let filter = FacetFilter::compile(selections, &TagExtractor::default())?;
    Ok(filter.apply(rows))
}

/// Column name the purchasing style toggle is addressed by in a selection map
pub fn purchasing_style_column() -> &'static str {
    COL_PURCHASING_STYLE
}
