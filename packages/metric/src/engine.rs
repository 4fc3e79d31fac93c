//! The metric layer engine.
//!
//! [`MetricLayerEngine`] is built once from region data and then answers
//! read-only queries. The selected year is never stored: every query takes
//! it as a parameter and clamps it into the configured [`YearRange`], so a
//! slider overshooting its bounds mid-drag simply reads the nearest year.

use std::collections::{BTreeMap, BTreeSet};

use opioid_map_metric_models::{
    Category, LegendScale, MagnitudeResult, RegionId, RegionRecord, SeriesPoint, YearRange,
};

use crate::config::LayerConfig;
use crate::keys::{parse_column_key, parse_value};
use crate::magnitude::{self, ScaleFactor};
use crate::{ConfigError, legend};

/// A region's metric cells keyed by `(Category, year)`.
///
/// A `None` cell was present in the source but not numeric. Cells that
/// were never present are simply absent. Both read as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    id: RegionId,
    values: BTreeMap<(Category, i32), Option<f64>>,
}

impl Region {
    /// Creates a region with no cells.
    #[must_use]
    pub const fn new(id: RegionId) -> Self {
        Self {
            id,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style [`Region::insert`].
    #[must_use]
    pub fn with_value(mut self, category: Category, year: i32, value: Option<f64>) -> Self {
        self.insert(category, year, value);
        self
    }

    /// Sets one cell, replacing any previous value.
    pub fn insert(&mut self, category: Category, year: i32, value: Option<f64>) {
        self.values.insert((category, year), value);
    }

    /// Parses a raw record's `"<CATEGORY><YEAR>"` properties into cells.
    ///
    /// Properties that are not metric columns are ignored. Metric columns
    /// holding non-numeric values are kept as `None` cells.
    #[must_use]
    pub fn from_record(record: &RegionRecord) -> Self {
        let mut region = Self::new(record.id.clone());

        for (key, raw) in &record.properties {
            let Some((category, year)) = parse_column_key(key) else {
                continue;
            };
            let value = parse_value(raw);
            if value.is_none() && !raw.is_null() {
                log::debug!("Region {}: non-numeric {key} value {raw}", record.id);
            }
            region.insert(category, year, value);
        }

        region
    }

    /// The region identifier.
    #[must_use]
    pub const fn id(&self) -> &RegionId {
        &self.id
    }

    /// Reads a cell, degrading missing and non-numeric values to zero.
    #[must_use]
    pub fn value(&self, category: Category, year: i32) -> f64 {
        self.values
            .get(&(category, year))
            .copied()
            .flatten()
            .map_or(0.0, magnitude::sanitize)
    }

    /// Whether any cell exists for `category`, numeric or not.
    #[must_use]
    pub fn has_category(&self, category: Category) -> bool {
        self.values.keys().any(|(c, _)| *c == category)
    }

    fn retain_categories(&mut self, categories: &[Category]) -> usize {
        let before = self.values.len();
        self.values.retain(|(c, _), _| categories.contains(c));
        before - self.values.len()
    }
}

/// Maps a selected year and category to proportional-symbol magnitudes.
///
/// Immutable after construction; all queries are pure.
#[derive(Debug, Clone)]
pub struct MetricLayerEngine {
    regions: BTreeMap<RegionId, Region>,
    categories: Vec<Category>,
    year_range: YearRange,
    scale_factor: ScaleFactor,
}

impl MetricLayerEngine {
    /// Builds an engine from typed regions.
    ///
    /// Cells for undeclared categories are dropped. Per-year gaps are
    /// tolerated and read as zero.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::EmptyRegions`] if `regions` is empty
    /// * [`ConfigError::NoCategories`] if `categories` is empty
    /// * [`ConfigError::DuplicateRegion`] if two regions share an id
    /// * [`ConfigError::MissingCategory`] if a region has no cell at all for
    ///   a declared category
    pub fn new(
        regions: Vec<Region>,
        categories: &[Category],
        year_range: YearRange,
        scale_factor: ScaleFactor,
    ) -> Result<Self, ConfigError> {
        if regions.is_empty() {
            return Err(ConfigError::EmptyRegions);
        }

        let mut declared = Vec::with_capacity(categories.len());
        for &category in categories {
            if !declared.contains(&category) {
                declared.push(category);
            }
        }
        if declared.is_empty() {
            return Err(ConfigError::NoCategories);
        }

        let mut indexed = BTreeMap::new();
        let mut dropped = 0;

        for mut region in regions {
            for &category in &declared {
                if !region.has_category(category) {
                    return Err(ConfigError::MissingCategory {
                        region: region.id.clone(),
                        category,
                    });
                }
            }
            dropped += region.retain_categories(&declared);

            if indexed.contains_key(&region.id) {
                return Err(ConfigError::DuplicateRegion(region.id));
            }
            indexed.insert(region.id.clone(), region);
        }

        if dropped > 0 {
            log::debug!("Dropped {dropped} cells for undeclared categories");
        }
        log::info!(
            "Indexed {} regions across {} categories for {year_range}",
            indexed.len(),
            declared.len()
        );

        Ok(Self {
            regions: indexed,
            categories: declared,
            year_range,
            scale_factor,
        })
    }

    /// Builds an engine from raw loader records.
    ///
    /// # Errors
    ///
    /// See [`MetricLayerEngine::new`].
    pub fn from_records(
        records: &[RegionRecord],
        categories: &[Category],
        year_range: YearRange,
        scale_factor: ScaleFactor,
    ) -> Result<Self, ConfigError> {
        let regions = records.iter().map(Region::from_record).collect();
        Self::new(regions, categories, year_range, scale_factor)
    }

    /// Builds an engine from raw records using a [`LayerConfig`].
    ///
    /// When the config has no fixed year range, the range spans every year
    /// present in the declared categories' columns.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoYears`] if the range must be inferred but no
    /// metric columns exist, plus every error of [`MetricLayerEngine::new`].
    pub fn from_config(records: &[RegionRecord], config: &LayerConfig) -> Result<Self, ConfigError> {
        if records.is_empty() {
            return Err(ConfigError::EmptyRegions);
        }

        let regions: Vec<Region> = records.iter().map(Region::from_record).collect();

        let year_range = match config.years {
            Some(range) => range,
            None => {
                let range = infer_year_range(&regions, &config.categories)?;
                log::info!("Inferred year range {range} from data");
                range
            }
        };

        Self::new(regions, &config.categories, year_range, config.scale_factor)
    }

    /// Computes every region's magnitude for every declared category at
    /// `year`.
    ///
    /// Out-of-range years are clamped to the nearest bound. Missing and
    /// non-numeric cells read as zero. Returns a fresh map each call.
    #[must_use]
    pub fn compute_magnitudes(
        &self,
        year: i32,
    ) -> BTreeMap<RegionId, BTreeMap<Category, MagnitudeResult>> {
        let year = self.year_range.clamp(year);

        self.regions
            .iter()
            .map(|(id, region)| (id.clone(), self.region_cells(region, year)))
            .collect()
    }

    /// Largest value observed across all regions and in-range years,
    /// optionally restricted to one category.
    ///
    /// Returns `0.0` when there is no data or the category is not declared.
    #[must_use]
    pub fn max_observed_value(&self, category: Option<Category>) -> f64 {
        self.regions
            .values()
            .flat_map(|region| region.values.iter())
            .filter(|((c, year), _)| {
                category.is_none_or(|wanted| wanted == *c) && self.year_range.contains(*year)
            })
            .filter_map(|(_, value)| *value)
            .map(magnitude::sanitize)
            .fold(0.0, f64::max)
    }

    /// One region's time series for one category, one point per year in
    /// range.
    ///
    /// Returns `None` for an unknown region or an undeclared category.
    #[must_use]
    pub fn series(&self, region: &RegionId, category: Category) -> Option<Vec<SeriesPoint>> {
        if !self.categories.contains(&category) {
            return None;
        }
        let region = self.regions.get(region)?;

        Some(
            self.year_range
                .years()
                .map(|year| SeriesPoint {
                    year,
                    value: region.value(category, year),
                })
                .collect(),
        )
    }

    /// One region's magnitudes for every declared category at `year`
    /// (clamped).
    #[must_use]
    pub fn snapshot(
        &self,
        region: &RegionId,
        year: i32,
    ) -> Option<BTreeMap<Category, MagnitudeResult>> {
        let region = self.regions.get(region)?;
        Some(self.region_cells(region, self.year_range.clamp(year)))
    }

    /// Reference symbol sizes for a legend over the observed maximum.
    #[must_use]
    pub fn legend_scale(&self, category: Option<Category>, round_to: f64) -> LegendScale {
        legend::scale(
            self.max_observed_value(category),
            round_to,
            self.scale_factor,
        )
    }

    /// Radius for an arbitrary value under this engine's scale factor.
    #[must_use]
    pub fn magnitude(&self, value: f64) -> f64 {
        magnitude::radius(value, self.scale_factor)
    }

    /// The inclusive year range queries are clamped to.
    #[must_use]
    pub const fn year_range(&self) -> YearRange {
        self.year_range
    }

    /// Declared categories, in declaration order.
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// The radius multiplier.
    #[must_use]
    pub const fn scale_factor(&self) -> ScaleFactor {
        self.scale_factor
    }

    /// Region identifiers in sorted order.
    pub fn region_ids(&self) -> impl Iterator<Item = &RegionId> {
        self.regions.keys()
    }

    /// Looks up a region by id.
    #[must_use]
    pub fn region(&self, id: &RegionId) -> Option<&Region> {
        self.regions.get(id)
    }

    fn region_cells(&self, region: &Region, year: i32) -> BTreeMap<Category, MagnitudeResult> {
        self.categories
            .iter()
            .map(|&category| {
                let value = region.value(category, year);
                let result = MagnitudeResult {
                    value,
                    radius: magnitude::radius(value, self.scale_factor),
                };
                (category, result)
            })
            .collect()
    }
}

/// Spans every year present in the declared categories' cells.
fn infer_year_range(regions: &[Region], categories: &[Category]) -> Result<YearRange, ConfigError> {
    let years: BTreeSet<i32> = regions
        .iter()
        .flat_map(|region| region.values.keys())
        .filter(|(c, _)| categories.contains(c))
        .map(|(_, year)| *year)
        .collect();

    match (years.first(), years.last()) {
        (Some(&min), Some(&max)) => Ok(YearRange::new(min, max)?),
        _ => Err(ConfigError::NoYears),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn range() -> YearRange {
        YearRange::new(2006, 2018).unwrap()
    }

    /// A region with a constant value in every year for every category.
    fn full_region(id: &str, value: f64) -> Region {
        let mut region = Region::new(RegionId::new(id));
        for &category in Category::all() {
            for year in range().years() {
                region.insert(category, year, Some(value));
            }
        }
        region
    }

    fn sample_engine() -> MetricLayerEngine {
        let ohio = full_region("Ohio", 10.0)
            .with_value(Category::Natural, 2006, Some(100.0))
            .with_value(Category::Natural, 2012, Some(400.0))
            .with_value(Category::Natural, 2018, Some(900.0));
        let utah = full_region("Utah", 5.0);
        MetricLayerEngine::new(
            vec![ohio, utah],
            Category::all(),
            range(),
            ScaleFactor::default(),
        )
        .unwrap()
    }

    #[test]
    fn empty_region_list_is_rejected() {
        let err = MetricLayerEngine::new(
            Vec::new(),
            Category::all(),
            range(),
            ScaleFactor::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRegions));
    }

    #[test]
    fn empty_category_set_is_rejected() {
        let err = MetricLayerEngine::new(
            vec![full_region("Ohio", 1.0)],
            &[],
            range(),
            ScaleFactor::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoCategories));
    }

    #[test]
    fn region_without_a_declared_category_is_rejected() {
        let region = Region::new(RegionId::new("Ohio"))
            .with_value(Category::Natural, 2010, Some(3.0))
            .with_value(Category::Synthetic, 2010, Some(3.0));
        let err = MetricLayerEngine::new(
            vec![region],
            &[Category::Natural, Category::Heroin],
            range(),
            ScaleFactor::default(),
        )
        .unwrap_err();
        match err {
            ConfigError::MissingCategory { region, category } => {
                assert_eq!(region.as_str(), "Ohio");
                assert_eq!(category, Category::Heroin);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_regions_are_rejected() {
        let err = MetricLayerEngine::new(
            vec![full_region("Ohio", 1.0), full_region("Ohio", 2.0)],
            Category::all(),
            range(),
            ScaleFactor::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRegion(ref id) if id.as_str() == "Ohio"));
    }

    #[test]
    fn invalid_year_range_surfaces_as_config_error() {
        let err: ConfigError = YearRange::new(2018, 2006).unwrap_err().into();
        assert!(matches!(err, ConfigError::InvalidYearRange(_)));
    }

    #[test]
    fn max_observed_value_finds_the_largest_cell() {
        let engine = sample_engine();
        assert!((engine.max_observed_value(Some(Category::Natural)) - 900.0).abs() < f64::EPSILON);
        assert!((engine.max_observed_value(None) - 900.0).abs() < f64::EPSILON);
        assert!((engine.max_observed_value(Some(Category::Heroin)) - 10.0).abs() < f64::EPSILON);
        assert!((engine.magnitude(900.0) - 8.46).abs() < 0.01);
    }

    #[test]
    fn max_observed_value_is_zero_without_data() {
        let region = Region::new(RegionId::new("Ohio")).with_value(Category::Natural, 2010, None);
        let engine = MetricLayerEngine::new(
            vec![region],
            &[Category::Natural],
            range(),
            ScaleFactor::default(),
        )
        .unwrap();
        assert!(engine.max_observed_value(None) == 0.0);
        assert!(engine.max_observed_value(Some(Category::Heroin)) == 0.0);
    }

    #[test]
    fn max_observed_value_ignores_years_outside_the_range() {
        let region = full_region("Ohio", 1.0).with_value(Category::Natural, 1999, Some(5_000.0));
        let engine = MetricLayerEngine::new(
            vec![region],
            Category::all(),
            range(),
            ScaleFactor::default(),
        )
        .unwrap();
        assert!((engine.max_observed_value(None) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn compute_magnitudes_applies_the_transform() {
        let engine = sample_engine();
        let result = engine.compute_magnitudes(2018);
        let ohio = &result[&RegionId::new("Ohio")];
        let natural = ohio[&Category::Natural];
        assert!((natural.value - 900.0).abs() < f64::EPSILON);
        assert!((natural.radius - engine.magnitude(900.0)).abs() < 1e-12);
        assert_eq!(ohio.len(), Category::all().len());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn compute_magnitudes_is_idempotent() {
        let engine = sample_engine();
        assert_eq!(engine.compute_magnitudes(2012), engine.compute_magnitudes(2012));
    }

    #[test]
    fn out_of_range_years_are_clamped() {
        let engine = sample_engine();
        assert_eq!(engine.compute_magnitudes(1990), engine.compute_magnitudes(2006));
        assert_eq!(engine.compute_magnitudes(2050), engine.compute_magnitudes(2018));
        assert_eq!(engine.compute_magnitudes(i32::MIN), engine.compute_magnitudes(2006));
    }

    #[test]
    fn missing_cell_yields_zero_magnitude() {
        let mut ohio = full_region("Ohio", 7.0);
        ohio.values.remove(&(Category::Heroin, 2010));
        let engine = MetricLayerEngine::new(
            vec![ohio],
            Category::all(),
            range(),
            ScaleFactor::default(),
        )
        .unwrap();

        let heroin = engine.compute_magnitudes(2010)[&RegionId::new("Ohio")][&Category::Heroin];
        assert!(heroin.value == 0.0);
        assert!(heroin.radius == 0.0);
    }

    #[test]
    fn from_records_parses_keyed_properties() {
        let record = RegionRecord {
            id: RegionId::new("Ohio"),
            properties: [
                ("STATE".to_string(), json!("Ohio")),
                ("NATURAL2010".to_string(), json!("1,200")),
                ("SYNTHETIC2010".to_string(), json!(340)),
                ("METHADONE2010".to_string(), json!("")),
                ("HEROIN2011".to_string(), json!("n/a")),
            ]
            .into_iter()
            .collect(),
        };
        let engine = MetricLayerEngine::from_records(
            &[record],
            Category::all(),
            range(),
            ScaleFactor::default(),
        )
        .unwrap();

        let cells = engine.snapshot(&RegionId::new("Ohio"), 2010).unwrap();
        assert!((cells[&Category::Natural].value - 1200.0).abs() < f64::EPSILON);
        assert!((cells[&Category::Synthetic].value - 340.0).abs() < f64::EPSILON);
        assert!(cells[&Category::Methadone].value == 0.0);
        assert!(cells[&Category::Heroin].value == 0.0);
    }

    #[test]
    fn from_config_infers_year_range_when_unset() {
        let record = RegionRecord {
            id: RegionId::new("Utah"),
            properties: [
                ("NATURAL2009".to_string(), json!(1)),
                ("NATURAL2015".to_string(), json!(2)),
                ("HEROIN2001".to_string(), json!(3)),
            ]
            .into_iter()
            .collect(),
        };
        let config = LayerConfig {
            categories: vec![Category::Natural],
            years: None,
            ..LayerConfig::default()
        };
        let engine = MetricLayerEngine::from_config(&[record], &config).unwrap();
        assert_eq!(engine.year_range(), YearRange::new(2009, 2015).unwrap());
        assert_eq!(engine.categories(), &[Category::Natural]);
    }

    #[test]
    fn from_config_without_metric_columns_cannot_infer_years() {
        let record = RegionRecord {
            id: RegionId::new("Utah"),
            properties: [("STATE".to_string(), json!("Utah"))].into_iter().collect(),
        };
        let config = LayerConfig {
            years: None,
            ..LayerConfig::default()
        };
        let err = MetricLayerEngine::from_config(&[record], &config).unwrap_err();
        assert!(matches!(err, ConfigError::NoYears));
    }

    #[test]
    fn series_covers_every_year_in_range() {
        let engine = sample_engine();
        let series = engine
            .series(&RegionId::new("Ohio"), Category::Natural)
            .unwrap();
        assert_eq!(series.len(), range().len());
        assert_eq!(series.first().unwrap().year, 2006);
        assert!((series.first().unwrap().value - 100.0).abs() < f64::EPSILON);
        assert!((series.last().unwrap().value - 900.0).abs() < f64::EPSILON);
        assert!(engine.series(&RegionId::new("Nowhere"), Category::Natural).is_none());
    }

    #[test]
    fn undeclared_category_has_no_series() {
        let engine = MetricLayerEngine::new(
            vec![full_region("Ohio", 1.0)],
            &[Category::Natural],
            range(),
            ScaleFactor::default(),
        )
        .unwrap();
        assert!(engine.series(&RegionId::new("Ohio"), Category::Heroin).is_none());
        assert!(engine.max_observed_value(Some(Category::Heroin)) == 0.0);
    }

    #[test]
    fn snapshot_clamps_the_year() {
        let engine = sample_engine();
        let ohio = RegionId::new("Ohio");
        assert_eq!(engine.snapshot(&ohio, 3000), engine.snapshot(&ohio, 2018));
        assert!(engine.snapshot(&RegionId::new("Nowhere"), 2010).is_none());
    }
}
