use geo::{GeodesicArea, MultiPolygon};

use crate::metric::MetricValue;

use super::{CoverageMask, Raster, RasterError};

/// Statistics of the valid pixels whose centres fall inside a polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalSummary {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for ZonalSummary {
    fn default() -> Self {
        Self { count: 0, sum: 0.0, min: f64::INFINITY, max: f64::NEG_INFINITY }
    }
}

impl ZonalSummary {
    #[inline]
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Arithmetic mean, or `Absent` when no valid pixel was covered.
    pub fn mean(&self) -> MetricValue {
        if self.count == 0 { return MetricValue::Absent }
        MetricValue::new(self.sum / self.count as f64)
    }
}

/// Mask `raster` by `shape` and summarize the covered valid pixels.
pub fn zonal_summary(raster: &Raster, shape: &MultiPolygon<f64>) -> Result<ZonalSummary, RasterError> {
    raster.require_wgs84()?;
    let mask = CoverageMask::rasterize(shape, raster.transform(), raster.width(), raster.height())?;

    let mut summary = ZonalSummary::default();
    for (col, row) in mask.cells() {
        if let Some(value) = raster.get(col, row).filter(|&v| raster.is_valid(v)) {
            summary.push(value);
        }
    }
    Ok(summary)
}

/// Mean of the covered valid pixels, or `Absent`.
pub fn zonal_mean(raster: &Raster, shape: &MultiPolygon<f64>) -> Result<MetricValue, RasterError> {
    Ok(zonal_summary(raster, shape)?.mean())
}

/// People per km² from a raster of per-pixel population counts: covered total / geodesic area.
pub fn density_from_counts(raster: &Raster, shape: &MultiPolygon<f64>) -> Result<MetricValue, RasterError> {
    let summary = zonal_summary(raster, shape)?;
    if summary.count == 0 { return Ok(MetricValue::Absent) }

    let area_km2 = shape.geodesic_area_unsigned() / 1e6;
    if area_km2 <= 0.0 { return Ok(MetricValue::Absent) }

    Ok(MetricValue::new(summary.sum / area_km2))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::{polygon, MultiPolygon};

    use super::*;
    use crate::raster::GeoTransform;

    fn raster(data: Vec<f64>) -> Raster {
        // 4x3 grid of 0.01° pixels anchored at (55.0, 25.03)
        Raster::new(4, 3, data, GeoTransform::north_up(55.0, 25.03, 0.01, 0.01), Some(-9999.0)).unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]])
    }

    #[test]
    fn mean_matches_independent_computation() {
        let data = vec![
            30.0, 31.0, 32.0, 33.0,
            34.0, 35.5, 36.0, 37.0,
            38.0, 39.0, 40.0, 41.25,
        ];
        let r = raster(data.clone());
        // Covers columns 1..3 of rows 1..3 (centres at 55.015/55.025, 25.015/25.005).
        let shape = rect(55.01, 25.0, 55.03, 25.02);
        let expected = [data[5], data[6], data[9], data[10]].iter().sum::<f64>() / 4.0;

        let summary = zonal_summary(&r, &shape).unwrap();
        assert_eq!(summary.count, 4);
        assert_relative_eq!(summary.mean().value().unwrap(), expected, epsilon = 1e-12);
        assert_eq!(summary.min, 35.5);
        assert_eq!(summary.max, 40.0);
    }

    #[test]
    fn nodata_pixels_are_excluded() {
        let mut data = vec![10.0; 12];
        data[0] = -9999.0;
        data[1] = f64::NAN;
        data[2] = 20.0;
        let r = raster(data);
        let shape = rect(55.0, 25.02, 55.04, 25.03); // top row
        let summary = zonal_summary(&r, &shape).unwrap();
        assert_eq!(summary.count, 2);
        assert_relative_eq!(summary.mean().value().unwrap(), 15.0);
    }

    #[test]
    fn polygon_over_nodata_is_absent() {
        let r = raster(vec![-9999.0; 12]);
        assert_eq!(zonal_mean(&r, &rect(55.0, 25.0, 55.04, 25.03)).unwrap(), MetricValue::Absent);
    }

    #[test]
    fn polygon_outside_raster_is_absent() {
        let r = raster(vec![1.0; 12]);
        assert_eq!(zonal_mean(&r, &rect(56.0, 26.0, 56.1, 26.1)).unwrap(), MetricValue::Absent);
    }

    #[test]
    fn density_divides_total_by_area() {
        let r = raster(vec![1000.0; 12]);
        let shape = rect(55.0, 25.0, 55.04, 25.03);
        let area_km2 = shape.geodesic_area_unsigned() / 1e6;
        let density = density_from_counts(&r, &shape).unwrap().value().unwrap();
        assert_relative_eq!(density, 12_000.0 / area_km2, max_relative = 1e-12);
    }
}
