use std::{fmt, sync::Arc};

use thiserror::Error;
use tracing::debug;

use crate::{
    dates::DateRange,
    district::DistrictGeometry,
    metric::{MetricKind, MetricValue},
    raster::{density_from_counts, zonal_mean, Raster, RasterError},
    remote::{BackendError, Dataset, ImageBackend, RegionRequest},
};

/// Where the values of one metric come from.
#[derive(Clone)]
pub enum MetricSource {
    /// Local raster of the metric itself. With `raw_encoding` the pixel values
    /// are in the remote dataset's integer encoding and get converted.
    Raster { raster: Arc<Raster>, raw_encoding: bool },
    /// Local raster of per-pixel population counts; density is derived from area.
    PopulationCounts(Arc<Raster>),
    Remote(Arc<dyn ImageBackend>),
}

impl MetricSource {
    pub fn raster(raster: Raster) -> Self {
        MetricSource::Raster { raster: Arc::new(raster), raw_encoding: false }
    }
}

impl fmt::Debug for MetricSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricSource::Raster { raster, raw_encoding } => f.debug_struct("Raster")
                .field("width", &raster.width())
                .field("height", &raster.height())
                .field("raw_encoding", raw_encoding)
                .finish(),
            MetricSource::PopulationCounts(raster) => f.debug_struct("PopulationCounts")
                .field("width", &raster.width())
                .field("height", &raster.height())
                .finish(),
            MetricSource::Remote(_) => f.write_str("Remote"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("{0}")]
    UnsupportedGeometry(String),
    #[error("{kind} needs a date range")]
    MissingDates { kind: MetricKind },
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("data source error: {0}")]
    DataSource(#[from] BackendError),
}

/// Sample one metric over one district geometry.
///
/// `Ok(Absent)` means the source had no valid data over the area; failures of
/// the source itself are `Err(DataSource)`.
pub fn sample(
    kind: MetricKind,
    source: &MetricSource,
    geometry: &DistrictGeometry,
    dates: Option<&DateRange>,
) -> Result<MetricValue, SampleError> {
    let shape = geometry.try_shape()
        .map_err(|reason| SampleError::UnsupportedGeometry(reason.to_string()))?;
    let dataset = Dataset::for_metric(kind);

    let value = match source {
        MetricSource::Raster { raster, raw_encoding } => {
            let mean = zonal_mean(raster, &shape)?;
            if *raw_encoding { mean.map(|raw| dataset.convert(raw)) } else { mean }
        }
        MetricSource::PopulationCounts(raster) => density_from_counts(raster, &shape)?,
        MetricSource::Remote(backend) => {
            if dataset.is_time_series() && dates.is_none() {
                return Err(SampleError::MissingDates { kind });
            }
            let request = RegionRequest {
                dataset,
                dates: dates.filter(|_| dataset.is_time_series()),
                region: &shape,
            };
            let raw = backend.reduce_region(&request)?;
            MetricValue::from_option(raw).map(|raw| dataset.convert(raw))
        }
    };
    debug!("[sample] {kind}: {}", kind.format(value));
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use approx::assert_relative_eq;
    use geo::polygon;
    use serde_json::json;

    use super::*;
    use crate::raster::GeoTransform;

    struct FixedBackend {
        answer: fn() -> Result<Option<f64>, BackendError>,
        seen_dates: Mutex<Vec<bool>>,
    }

    impl ImageBackend for FixedBackend {
        fn reduce_region(&self, request: &RegionRequest<'_>) -> Result<Option<f64>, BackendError> {
            self.seen_dates.lock().unwrap().push(request.dates.is_some());
            (self.answer)()
        }
    }

    fn remote(answer: fn() -> Result<Option<f64>, BackendError>) -> (Arc<FixedBackend>, MetricSource) {
        let backend = Arc::new(FixedBackend { answer, seen_dates: Mutex::new(Vec::new()) });
        (backend.clone(), MetricSource::Remote(backend))
    }

    fn unit_square() -> DistrictGeometry {
        DistrictGeometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)])
    }

    fn dates() -> DateRange { DateRange::parse("2023-06-01", "2023-08-31").unwrap() }

    #[test]
    fn local_raster_mean_is_in_physical_units() {
        let raster = Raster::new(4, 4, vec![36.0; 16], GeoTransform::north_up(0.0, 4.0, 1.0, 1.0), None).unwrap();
        let value = sample(MetricKind::Temperature, &MetricSource::raster(raster), &unit_square(), None).unwrap();
        assert_eq!(value, MetricValue::Measured(36.0));
    }

    #[test]
    fn raw_encoded_raster_is_converted_once() {
        let raster = Raster::new(4, 4, vec![15_000.0; 16], GeoTransform::north_up(0.0, 4.0, 1.0, 1.0), None).unwrap();
        let source = MetricSource::Raster { raster: Arc::new(raster), raw_encoding: true };
        let value = sample(MetricKind::Temperature, &source, &unit_square(), None).unwrap();
        assert_relative_eq!(value.value().unwrap(), 26.85, epsilon = 1e-9);
    }

    #[test]
    fn remote_value_is_converted() {
        let (_, source) = remote(|| Ok(Some(3_000.0)));
        let value = sample(MetricKind::Ndvi, &source, &unit_square(), Some(&dates())).unwrap();
        assert_relative_eq!(value.value().unwrap(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn remote_no_value_is_absent_but_failure_is_an_error() {
        let (_, empty) = remote(|| Ok(None));
        assert_eq!(sample(MetricKind::Temperature, &empty, &unit_square(), Some(&dates())).unwrap(), MetricValue::Absent);

        let (_, failing) = remote(|| Err(BackendError::Timeout));
        let err = sample(MetricKind::Temperature, &failing, &unit_square(), Some(&dates())).unwrap_err();
        assert!(matches!(err, SampleError::DataSource(BackendError::Timeout)));
    }

    #[test]
    fn population_is_requested_without_dates() {
        let (backend, source) = remote(|| Ok(Some(8_000.0)));
        let value = sample(MetricKind::PopulationDensity, &source, &unit_square(), Some(&dates())).unwrap();
        assert_eq!(value, MetricValue::Measured(8_000.0));
        assert_eq!(*backend.seen_dates.lock().unwrap(), vec![false]);
    }

    #[test]
    fn time_series_without_dates_is_rejected() {
        let (backend, source) = remote(|| Ok(Some(1.0)));
        let err = sample(MetricKind::Temperature, &source, &unit_square(), None).unwrap_err();
        assert!(matches!(err, SampleError::MissingDates { kind: MetricKind::Temperature }));
        assert!(backend.seen_dates.lock().unwrap().is_empty());
    }

    #[test]
    fn unsupported_geometry_is_reported() {
        let raster = Raster::new(1, 1, vec![1.0], GeoTransform::north_up(0.0, 1.0, 1.0, 1.0), None).unwrap();
        let geometry = DistrictGeometry::Unsupported {
            reason: "unsupported geometry type: LineString".into(),
            raw: json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]}),
        };
        let err = sample(MetricKind::Temperature, &MetricSource::raster(raster), &geometry, None).unwrap_err();
        assert_eq!(err.to_string(), "unsupported geometry type: LineString");
    }
}
