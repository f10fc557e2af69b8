use std::{collections::BTreeMap, fmt};

use anyhow::{bail, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::AnalysisConfig,
    dates::DateRange,
    district::District,
    intervention::Recommendation,
    metric::{MetricKind, MetricValue},
    remote::Dataset,
    sampler::{sample, MetricSource, SampleError},
};

/// Samples configured metrics over a district collection and picks hotspots.
#[derive(Debug, Clone)]
pub struct Analysis {
    sources: BTreeMap<MetricKind, MetricSource>,
    dates: Option<DateRange>,
    top_n: usize,
    rank_by: MetricKind,
}

/// A metric that could not be sampled for a district.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFailure {
    pub district: String,
    pub metric: MetricKind,
    pub message: String,
}

impl fmt::Display for SampleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.district, self.metric, self.message)
    }
}

/// A top-ranked district and what to do about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    pub index: usize, // Position in the district collection
    pub name: String,
    pub value: f64,
    pub recommendation: Recommendation,
    pub intervention: String,
}

impl fmt::Display for Hotspot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.intervention)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub districts: usize,
    pub rank_by: MetricKind,
    pub hotspots: Vec<Hotspot>,
    pub skipped: Vec<SampleFailure>, // Unsupported geometry
    pub errors: Vec<SampleFailure>,  // Data source failures
}

impl AnalysisReport {
    pub fn has_errors(&self) -> bool { !self.errors.is_empty() }
}

impl Analysis {
    pub fn new(dates: Option<DateRange>) -> Self {
        let defaults = AnalysisConfig::default();
        Self { sources: BTreeMap::new(), dates, top_n: defaults.top_n, rank_by: defaults.rank_by }
    }

    pub fn from_config(config: &AnalysisConfig, dates: Option<DateRange>) -> Self {
        Self::new(dates).top_n(config.top_n).rank_by(config.rank_by)
    }

    pub fn with_source(mut self, kind: MetricKind, source: MetricSource) -> Self {
        self.sources.insert(kind, source);
        self
    }

    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    pub fn rank_by(mut self, kind: MetricKind) -> Self {
        self.rank_by = kind;
        self
    }

    pub fn metrics(&self) -> impl Iterator<Item = MetricKind> + '_ { self.sources.keys().copied() }

    /// Reject configurations that cannot produce any value: no sources, an
    /// unsampled ranking metric, or a remote composite without a date range.
    pub fn check(&self) -> Result<()> {
        if self.sources.is_empty() { bail!("[analysis] No metric sources configured") }
        if !self.sources.contains_key(&self.rank_by) {
            bail!("[analysis] Ranking metric {} has no source", self.rank_by);
        }
        if self.dates.is_none() {
            let undated = self.sources.iter()
                .filter(|&(&kind, ref source)| {
                    matches!(source, MetricSource::Remote(_)) && Dataset::for_metric(kind).is_time_series()
                })
                .map(|(kind, _)| kind.to_string())
                .collect::<Vec<_>>();
            if !undated.is_empty() {
                bail!("[analysis] Remote {} needs a date range (--start/--end)", undated.join(", "));
            }
        }
        Ok(())
    }

    /// Sample every configured metric for every district, then attach
    /// interventions to the top-ranked ones.
    pub fn run(&self, districts: &mut [District]) -> Result<AnalysisReport> {
        self.check()?;

        let metric_names = self.metrics().map(|k| k.to_string()).collect::<Vec<_>>().join(", ");
        info!("[analysis] sampling {metric_names} for {} districts", districts.len());

        let samples: Vec<Vec<(MetricKind, Result<MetricValue, SampleError>)>> = districts
            .par_iter()
            .map(|district| {
                self.sources.iter()
                    .map(|(&kind, source)| (kind, sample(kind, source, &district.geometry, self.dates.as_ref())))
                    .collect()
            })
            .collect();

        let mut skipped = Vec::new();
        let mut errors = Vec::new();
        for (district, results) in districts.iter_mut().zip(samples) {
            for (kind, result) in results {
                let value = match result {
                    Ok(value) => value,
                    Err(SampleError::UnsupportedGeometry(reason)) => {
                        warn!("[analysis] skipping {}: {reason}", district.name);
                        skipped.push(SampleFailure { district: district.name.clone(), metric: kind, message: reason });
                        MetricValue::Absent
                    }
                    Err(err) => {
                        warn!("[analysis] {} ({kind}): {err}", district.name);
                        errors.push(SampleFailure { district: district.name.clone(), metric: kind, message: err.to_string() });
                        MetricValue::Absent
                    }
                };
                debug!("[analysis] {} {kind} = {}", district.name, kind.format(value));
                district.set_metric(kind, value);
            }
        }

        let hotspots = self.assign_interventions(districts);
        info!(
            "[analysis] {} hotspots, {} skipped, {} data source errors",
            hotspots.len(), skipped.len(), errors.len()
        );

        Ok(AnalysisReport { districts: districts.len(), rank_by: self.rank_by, hotspots, skipped, errors })
    }

    fn assign_interventions(&self, districts: &mut [District]) -> Vec<Hotspot> {
        for district in districts.iter_mut() {
            district.intervention = None;
        }

        rank_districts(districts, self.rank_by, self.top_n).into_iter()
            .map(|(index, value)| {
                let district = &mut districts[index];
                let recommendation = Recommendation::classify(self.rank_by, MetricValue::Measured(value));
                let intervention = recommendation.message(&district.name);
                district.intervention = Some(intervention.clone());
                Hotspot { index, name: district.name.clone(), value, recommendation, intervention }
            })
            .collect()
    }
}

/// Indices and values of the `n` highest `kind` readings, absent values
/// excluded. Equal values keep their input order.
pub fn rank_districts(districts: &[District], kind: MetricKind, n: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = districts.iter().enumerate()
        .filter_map(|(idx, d)| d.metric(kind).value().map(|v| (idx, v)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1)); // stable
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geo::polygon;
    use serde_json::Value;

    use super::*;
    use crate::{
        district::DistrictGeometry,
        raster::{GeoTransform, Raster},
        remote::{BackendError, ImageBackend, RegionRequest},
    };

    fn cell(x: f64) -> DistrictGeometry {
        DistrictGeometry::Polygon(polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0)])
    }

    fn strip(values: Vec<f64>) -> MetricSource {
        let width = values.len();
        let raster = Raster::new(width, 1, values, GeoTransform::north_up(0.0, 1.0, 1.0, 1.0), Some(-9999.0)).unwrap();
        MetricSource::raster(raster)
    }

    fn districts(n: usize) -> Vec<District> {
        (0..n).map(|i| District::new(format!("D{i}"), cell(i as f64))).collect()
    }

    #[test]
    fn ranks_descending_and_skips_absent() {
        let mut ds = districts(5);
        let analysis = Analysis::new(None)
            .with_source(MetricKind::Temperature, strip(vec![36.0, 41.0, -9999.0, 41.0, 30.0]))
            .top_n(3);
        let report = analysis.run(&mut ds).unwrap();

        let order: Vec<usize> = report.hotspots.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![1, 3, 0]);
        assert_eq!(report.hotspots[0].recommendation, Recommendation::ExtremeHeat);
        assert_eq!(ds[2].metric(MetricKind::Temperature), MetricValue::Absent);
        assert!(ds[2].intervention.is_none());
        assert!(ds[4].intervention.is_none());
        assert_eq!(report.hotspots[2].to_string(), format!("D0: {}", Recommendation::HighHeat.message("D0")));
    }

    #[test]
    fn fewer_districts_than_top_n() {
        let mut ds = districts(2);
        let report = Analysis::new(None)
            .with_source(MetricKind::Temperature, strip(vec![20.0, 25.0]))
            .top_n(5)
            .run(&mut ds)
            .unwrap();
        assert_eq!(report.hotspots.len(), 2);
    }

    #[test]
    fn unsupported_geometry_is_skipped_not_fatal() {
        let mut ds = districts(2);
        ds[0].geometry = DistrictGeometry::Unsupported { reason: "unsupported geometry type: Point".into(), raw: Value::Null };
        let report = Analysis::new(None)
            .with_source(MetricKind::Temperature, strip(vec![38.0, 38.0]))
            .run(&mut ds)
            .unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(report.errors.is_empty());
        assert_eq!(ds[0].metric(MetricKind::Temperature), MetricValue::Absent);
        assert_eq!(ds[1].metric(MetricKind::Temperature), MetricValue::Measured(38.0));
    }

    struct FailsOnFirstColumn;

    impl ImageBackend for FailsOnFirstColumn {
        fn reduce_region(&self, request: &RegionRequest<'_>) -> Result<Option<f64>, BackendError> {
            let x = request.region.0[0].exterior().0[0].x;
            if x < 0.5 { Err(BackendError::Timeout) } else { Ok(Some(9_000.0)) }
        }
    }

    #[test]
    fn data_source_errors_are_reported_separately() {
        let mut ds = districts(3);
        let report = Analysis::new(None)
            .with_source(MetricKind::PopulationDensity, MetricSource::Remote(Arc::new(FailsOnFirstColumn)))
            .rank_by(MetricKind::PopulationDensity)
            .run(&mut ds)
            .unwrap();
        assert!(report.has_errors());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].district, "D0");
        assert!(report.skipped.is_empty());
        assert_eq!(ds[1].metric(MetricKind::PopulationDensity), MetricValue::Measured(9_000.0));
        assert_eq!(report.hotspots.len(), 2);
    }

    struct CountingBackend(std::sync::atomic::AtomicUsize);

    impl ImageBackend for CountingBackend {
        fn reduce_region(&self, _request: &RegionRequest<'_>) -> Result<Option<f64>, BackendError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Some(15_000.0))
        }
    }

    #[test]
    fn remote_composite_without_dates_fails_before_sampling() {
        let backend = Arc::new(CountingBackend(Default::default()));
        let mut ds = districts(3);
        let err = Analysis::new(None)
            .with_source(MetricKind::Temperature, MetricSource::Remote(backend.clone()))
            .run(&mut ds)
            .unwrap_err();
        assert!(err.to_string().contains("date range"), "{err}");
        assert_eq!(backend.0.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(ds.iter().all(|d| d.metric(MetricKind::Temperature) == MetricValue::Absent));

        // Population density is a static layer and needs no dates.
        let report = Analysis::new(None)
            .with_source(MetricKind::PopulationDensity, MetricSource::Remote(backend.clone()))
            .rank_by(MetricKind::PopulationDensity)
            .run(&mut ds)
            .unwrap();
        assert!(!report.has_errors());
        assert_eq!(backend.0.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn ranking_metric_must_be_configured() {
        let mut ds = districts(1);
        let analysis = Analysis::new(None).with_source(MetricKind::Ndvi, strip(vec![0.3]));
        assert!(analysis.run(&mut ds).is_err());
        assert!(Analysis::new(None).run(&mut ds).is_err());
    }
}
