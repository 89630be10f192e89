/*!
 * Data type definitions for pharmacy license records
 *
 * Type-safe representations of one row of the license table, plus the
 * column enums the extractor and the filter are keyed by.
 */

use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

use crate::constants::*;
use crate::{ExplorerError, Result};

/// Multi-valued columns whose cells hold comma-joined tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagField {
    Specialties,
    Conditions,
    Accreditations,
}

impl TagField {
    pub const ALL: [TagField; 3] = [
        TagField::Specialties,
        TagField::Conditions,
        TagField::Accreditations,
    ];

    /// Header name of the column in the source CSV
    pub fn column_name(&self) -> &'static str {
        match self {
            TagField::Specialties => COL_SPECIALTIES,
            TagField::Conditions => COL_CONDITIONS,
            TagField::Accreditations => COL_ACCREDITATIONS,
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for TagField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Single-valued categorical columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CategoricalField {
    EntityType,
    LicenseType,
    FacilityType,
    City,
    County,
    State,
    Zip,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 7] = [
        CategoricalField::EntityType,
        CategoricalField::LicenseType,
        CategoricalField::FacilityType,
        CategoricalField::City,
        CategoricalField::County,
        CategoricalField::State,
        CategoricalField::Zip,
    ];

    /// Header name of the column in the source CSV
    pub fn column_name(&self) -> &'static str {
        match self {
            CategoricalField::EntityType => COL_ENTITY_TYPE,
            CategoricalField::LicenseType => COL_LICENSE_TYPE,
            CategoricalField::FacilityType => COL_FACILITY_TYPE,
            CategoricalField::City => COL_CITY,
            CategoricalField::County => COL_COUNTY,
            CategoricalField::State => COL_STATE,
            CategoricalField::Zip => COL_ZIP,
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Purchasing style: 503A patient-specific compounding or 503B bulk outsourcing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PurchasingStyle {
    PatientSpecific,
    Bulk,
}

impl PurchasingStyle {
    pub const ALL: [PurchasingStyle; 2] = [PurchasingStyle::PatientSpecific, PurchasingStyle::Bulk];

    /// Label shown in selection widgets
    pub fn label(&self) -> &'static str {
        match self {
            PurchasingStyle::PatientSpecific => PATIENT_SPECIFIC_LABEL,
            PurchasingStyle::Bulk => BULK_LABEL,
        }
    }

    /// Regulatory category
    pub fn category(&self) -> &'static str {
        match self {
            PurchasingStyle::PatientSpecific => "503A",
            PurchasingStyle::Bulk => "503B",
        }
    }

    /// Parse a widget label or regulatory category
    pub fn from_label(value: &str) -> Result<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|style| {
                style.label().eq_ignore_ascii_case(value) || style.category().eq_ignore_ascii_case(value)
            })
            .ok_or_else(|| ExplorerError::invalid_purchasing_style(value))
    }

    /// Style implied by the registered outsourcer (503B) flag
    pub fn from_outsourcer_flag(registered_outsourcer: bool) -> Self {
        if registered_outsourcer {
            PurchasingStyle::Bulk
        } else {
            PurchasingStyle::PatientSpecific
        }
    }
}

impl fmt::Display for PurchasingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named filter dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facet {
    Categorical(CategoricalField),
    Tag(TagField),
    PurchasingStyle,
}

impl Facet {
    /// Every facet a selection may reference
    pub fn all() -> Vec<Facet> {
        CategoricalField::ALL
            .into_iter()
            .map(Facet::Categorical)
            .chain(TagField::ALL.into_iter().map(Facet::Tag))
            .chain(std::iter::once(Facet::PurchasingStyle))
            .collect()
    }

    pub fn column_name(&self) -> &'static str {
        match self {
            Facet::Categorical(field) => field.column_name(),
            Facet::Tag(field) => field.column_name(),
            Facet::PurchasingStyle => COL_PURCHASING_STYLE,
        }
    }

    /// Resolve a column name, failing loudly on names that are not facets
    pub fn parse(name: &str) -> Result<Self> {
        if let Some(field) = CategoricalField::from_column(name) {
            return Ok(Facet::Categorical(field));
        }
        if let Some(field) = TagField::from_column(name) {
            return Ok(Facet::Tag(field));
        }
        if COL_PURCHASING_STYLE.eq_ignore_ascii_case(name.trim()) {
            return Ok(Facet::PurchasingStyle);
        }
        Err(ExplorerError::unknown_facet(name))
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// One licensed sterile-compounding pharmacy
///
/// Booleans are normalized at load time; tag columns keep the raw
/// comma-joined cell and are split on demand by [`crate::tags`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PharmacyRecord {
    pub pharmacy_name: String,
    pub license_number: Option<String>,

    pub entity_type: Option<String>,
    pub license_type: Option<String>,
    pub facility_type: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,

    pub is_government: bool,
    pub is_satellite: bool,
    /// 503B flag
    pub registered_outsourcer: bool,
    /// Extra boolean columns (per-specialty / per-condition in the available pharmacies file)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,

    pub specialties: Option<String>,
    pub conditions: Option<String>,
    pub accreditations: Option<String>,

    pub expiration_date: Option<NaiveDate>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl PharmacyRecord {
    /// Create a record with only a name set
    pub fn new<S: Into<String>>(pharmacy_name: S) -> Self {
        Self {
            pharmacy_name: pharmacy_name.into(),
            ..Default::default()
        }
    }

    /// Value of a single-valued categorical column
    pub fn categorical(&self, field: CategoricalField) -> Option<&str> {
        match field {
            CategoricalField::EntityType => self.entity_type.as_deref(),
            CategoricalField::LicenseType => self.license_type.as_deref(),
            CategoricalField::FacilityType => self.facility_type.as_deref(),
            CategoricalField::City => self.city.as_deref(),
            CategoricalField::County => self.county.as_deref(),
            CategoricalField::State => self.state.as_deref(),
            CategoricalField::Zip => self.zip.as_deref(),
        }
    }

    /// Raw comma-joined cell of a tag column
    pub fn tag_cell(&self, field: TagField) -> Option<&str> {
        match field {
            TagField::Specialties => self.specialties.as_deref(),
            TagField::Conditions => self.conditions.as_deref(),
            TagField::Accreditations => self.accreditations.as_deref(),
        }
    }

    pub fn purchasing_style(&self) -> PurchasingStyle {
        PurchasingStyle::from_outsourcer_flag(self.registered_outsourcer)
    }

    /// Latitude/longitude pair, only when both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn is_geocoded(&self) -> bool {
        self.coordinates().is_some()
    }

    /// Value of an extra boolean column
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    /// License has an expiration date strictly before `date`
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiration_date.map(|d| d < date).unwrap_or(false)
    }

    /// "City, State" style location line
    pub fn display_location(&self) -> String {
        [self.city.as_deref(), self.state.as_deref(), self.zip.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ")
    }
}
