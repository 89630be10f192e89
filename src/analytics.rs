/*!
 * Aggregations over pharmacy license records
 *
 * Everything here is a pure pass over a set of records and returns a
 * chart-ready table: value counts for bar and pie charts, county counts for
 * the choropleth, geocoded points for the scatter map, and expirations per
 * month for the area chart.
 */

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::data_types::*;
use crate::tags::TagExtractor;

/// Category value and the number of rows carrying it
pub type CountTable = Vec<(String, usize)>;

/// Analytics engine over a borrowed set of records
pub struct PharmacyAnalytics<'a> {
    records: Vec<&'a PharmacyRecord>,
    extractor: TagExtractor,
}

impl<'a> PharmacyAnalytics<'a> {
    /// Create an analytics engine over any set of records (full table or a filter result)
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PharmacyRecord>,
    {
        Self {
            records: records.into_iter().collect(),
            extractor: TagExtractor::default(),
        }
    }

    /// Use a specific tag extractor for tag counts
    pub fn with_extractor(mut self, extractor: TagExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Occurrences of each value of a categorical column, most frequent first
    ///
    /// Rows with no value are left out.
    pub fn value_counts(&self, field: CategoricalField) -> CountTable {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in self.records.iter().filter_map(|r| r.categorical(field)) {
            *counts.entry(value).or_insert(0) += 1;
        }
        rank(counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Rows per term of a tag column, most frequent first
    pub fn tag_counts(&self, field: TagField) -> CountTable {
        self.extractor.counts(self.records.iter().copied(), field)
    }

    /// Rows per county, for the choropleth
    pub fn county_counts(&self) -> CountTable {
        self.value_counts(CategoricalField::County)
    }

    /// 503A vs 503B split
    pub fn purchasing_style_counts(&self) -> Vec<(PurchasingStyle, usize)> {
        let bulk = self.records.iter().filter(|r| r.registered_outsourcer).count();
        vec![
            (PurchasingStyle::PatientSpecific, self.records.len() - bulk),
            (PurchasingStyle::Bulk, bulk),
        ]
    }

    /// Sum of every boolean column
    pub fn flag_totals(&self) -> FlagTotals {
        let mut totals = FlagTotals::default();
        for record in &self.records {
            totals.government += record.is_government as usize;
            totals.satellite += record.is_satellite as usize;
            totals.registered_outsourcer += record.registered_outsourcer as usize;
            for (name, value) in &record.flags {
                *totals.extra.entry(name.clone()).or_insert(0) += *value as usize;
            }
        }
        totals
    }

    /// Geocoded rows for the scatter map; rows without coordinates are skipped
    pub fn geocoded_points(&self) -> Vec<MapPoint> {
        self.records
            .iter()
            .filter_map(|r| {
                r.coordinates().map(|(latitude, longitude)| MapPoint {
                    pharmacy_name: r.pharmacy_name.clone(),
                    city: r.city.clone(),
                    purchasing_style: r.purchasing_style(),
                    latitude,
                    longitude,
                })
            })
            .collect()
    }

    /// License expirations per calendar month (`YYYY-MM`), in chronological order
    pub fn expirations_by_month(&self) -> CountTable {
        let mut counts: BTreeMap<(i32, u32), usize> = BTreeMap::new();
        for date in self.records.iter().filter_map(|r| r.expiration_date) {
            *counts.entry((date.year(), date.month())).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|((year, month), count)| (format!("{:04}-{:02}", year, month), count))
            .collect()
    }

    /// Licenses expiring within `[start, end]`
    pub fn expiring_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<&'a PharmacyRecord> {
        self.records
            .iter()
            .copied()
            .filter(|r| r.expiration_date.map(|d| d >= start && d <= end).unwrap_or(false))
            .collect()
    }

    /// Summary statistics
    pub fn stats(&self) -> DatasetStats {
        let distinct = |field: CategoricalField| {
            self.records
                .iter()
                .filter_map(|r| r.categorical(field))
                .collect::<HashSet<_>>()
                .len()
        };
        let expirations = self.records.iter().filter_map(|r| r.expiration_date);

        DatasetStats {
            total_pharmacies: self.records.len(),
            outsourcing_facilities: self.records.iter().filter(|r| r.registered_outsourcer).count(),
            government_owned: self.records.iter().filter(|r| r.is_government).count(),
            satellites: self.records.iter().filter(|r| r.is_satellite).count(),
            geocoded: self.records.iter().filter(|r| r.is_geocoded()).count(),
            unique_cities: distinct(CategoricalField::City),
            unique_counties: distinct(CategoricalField::County),
            unique_license_types: distinct(CategoricalField::LicenseType),
            earliest_expiration: expirations.clone().min(),
            latest_expiration: expirations.max(),
        }
    }
}

fn rank(mut table: CountTable) -> CountTable {
    table.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    table
}

/// Totals of the boolean columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagTotals {
    pub government: usize,
    pub satellite: usize,
    pub registered_outsourcer: usize,
    /// Extra flag columns by header name
    pub extra: BTreeMap<String, usize>,
}

impl FlagTotals {
    /// All totals as one table, built-in flags first
    pub fn as_table(&self) -> CountTable {
        let mut table = vec![
            ("isGovernment".to_string(), self.government),
            ("isSatellite".to_string(), self.satellite),
            ("Registered Outsourcer".to_string(), self.registered_outsourcer),
        ];
        table.extend(self.extra.iter().map(|(k, v)| (k.clone(), *v)));
        table
    }
}

/// One marker on the scatter map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub pharmacy_name: String,
    pub city: Option<String>,
    pub purchasing_style: PurchasingStyle,
    pub latitude: f64,
    pub longitude: f64,
}

/// Statistics about a set of license records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    pub total_pharmacies: usize,
    pub outsourcing_facilities: usize,
    pub government_owned: usize,
    pub satellites: usize,
    pub geocoded: usize,
    pub unique_cities: usize,
    pub unique_counties: usize,
    pub unique_license_types: usize,
    pub earliest_expiration: Option<NaiveDate>,
    pub latest_expiration: Option<NaiveDate>,
}

impl DatasetStats {
    /// Print formatted statistics
    pub fn print_summary(&self) {
        println!("=== Sterile Compounding License Statistics ===");
        println!("Total Pharmacies: {}", self.total_pharmacies);
        println!("  Patient-Specific (503A): {}", self.total_pharmacies - self.outsourcing_facilities);
        println!("  Bulk / Outsourcing (503B): {}", self.outsourcing_facilities);
        println!("Government Owned: {}", self.government_owned);
        println!("Satellite Locations: {}", self.satellites);
        println!("Cities: {}", self.unique_cities);
        println!("Counties: {}", self.unique_counties);
        println!("License Types: {}", self.unique_license_types);

        if self.total_pharmacies > 0 {
            let geocoded_percent = (self.geocoded as f64 / self.total_pharmacies as f64) * 100.0;
            println!("Geocoded: {} ({:.1}%)", self.geocoded, geocoded_percent);
        }
        if let (Some(first), Some(last)) = (self.earliest_expiration, self.latest_expiration) {
            println!("Expirations: {} to {}", first, last);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<PharmacyRecord> {
        let mut a = PharmacyRecord::new("Alpha");
        a.license_type = Some("Sterile Compounding".into());
        a.county = Some("Los Angeles".into());
        a.city = Some("Pasadena".into());
        a.specialties = Some("Oncology, Pediatrics".into());
        a.latitude = Some(34.1);
        a.longitude = Some(-118.1);
        a.expiration_date = NaiveDate::from_ymd_opt(2025, 3, 31);
        a.flags.insert("Oncology".into(), true);

        let mut b = PharmacyRecord::new("Beta");
        b.license_type = Some("Outsourcing Facility".into());
        b.county = Some("Los Angeles".into());
        b.registered_outsourcer = true;
        b.is_government = true;
        b.specialties = Some("Oncology".into());
        b.expiration_date = NaiveDate::from_ymd_opt(2025, 3, 1);
        b.flags.insert("Oncology".into(), false);

        let mut c = PharmacyRecord::new("Gamma");
        c.license_type = Some("Sterile Compounding".into());
        c.county = Some("Fresno".into());
        c.expiration_date = NaiveDate::from_ymd_opt(2024, 12, 15);

        vec![a, b, c]
    }

    #[test]
    fn test_value_counts() {
        let rows = sample();
        let analytics = PharmacyAnalytics::new(&rows);
        assert_eq!(
            analytics.value_counts(CategoricalField::LicenseType),
            vec![("Sterile Compounding".to_string(), 2), ("Outsourcing Facility".to_string(), 1)]
        );
        assert_eq!(analytics.value_counts(CategoricalField::City), vec![("Pasadena".to_string(), 1)]);
        assert_eq!(analytics.county_counts()[0], ("Los Angeles".to_string(), 2));
    }

    #[test]
    fn test_map_points_skip_ungeocoded() {
        let rows = sample();
        let points = PharmacyAnalytics::new(&rows).geocoded_points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].pharmacy_name, "Alpha");
    }

    #[test]
    fn test_flags_and_styles() {
        let rows = sample();
        let analytics = PharmacyAnalytics::new(&rows);
        let totals = analytics.flag_totals();
        assert_eq!(totals.government, 1);
        assert_eq!(totals.registered_outsourcer, 1);
        assert_eq!(totals.extra.get("Oncology"), Some(&1));
        assert_eq!(totals.as_table().len(), 4);
        assert_eq!(
            analytics.purchasing_style_counts(),
            vec![(PurchasingStyle::PatientSpecific, 2), (PurchasingStyle::Bulk, 1)]
        );
    }

    #[test]
    fn test_expirations_by_month_are_chronological() {
        let rows = sample();
        let analytics = PharmacyAnalytics::new(&rows);
        assert_eq!(
            analytics.expirations_by_month(),
            vec![("2024-12".to_string(), 1), ("2025-03".to_string(), 2)]
        );
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let expiring = analytics.expiring_between(start, end);
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].pharmacy_name, "Beta");
    }

    #[test]
    fn test_stats_on_subset() {
        let rows = sample();
        let subset: Vec<&PharmacyRecord> = rows.iter().filter(|r| !r.registered_outsourcer).collect();
        let stats = PharmacyAnalytics::new(subset).stats();
        assert_eq!(stats.total_pharmacies, 2);
        assert_eq!(stats.outsourcing_facilities, 0);
        assert_eq!(stats.unique_counties, 2);
        assert_eq!(stats.earliest_expiration, NaiveDate::from_ymd_opt(2024, 12, 15));
        assert_eq!(stats.latest_expiration, NaiveDate::from_ymd_opt(2025, 3, 31));
        assert_eq!(
            PharmacyAnalytics::new(&rows).tag_counts(TagField::Specialties)[0],
            ("Oncology".to_string(), 2)
        );
    }

    #[test]
    fn test_empty_input() {
        let rows: Vec<PharmacyRecord> = Vec::new();
        let analytics = PharmacyAnalytics::new(&rows);
        assert!(analytics.is_empty());
        assert!(analytics.value_counts(CategoricalField::City).is_empty());
        assert_eq!(analytics.stats().earliest_expiration, None);
    }
}
