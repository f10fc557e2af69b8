use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The statistics that can be sampled for a district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Temperature,        // Land-surface temperature, °C
    Ndvi,               // Vegetation index, dimensionless
    PopulationDensity,  // People per km²
}

impl MetricKind {
    pub fn all() -> [MetricKind; 3] {
        [MetricKind::Temperature, MetricKind::Ndvi, MetricKind::PopulationDensity]
    }

    /// GeoJSON property written for this metric.
    pub fn property(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "mean_temp",
            MetricKind::Ndvi => "ndvi",
            MetricKind::PopulationDensity => "population_density",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "Mean Temperature",
            MetricKind::Ndvi => "NDVI",
            MetricKind::PopulationDensity => "Population Density",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "°C",
            MetricKind::Ndvi => "",
            MetricKind::PopulationDensity => "people/km²",
        }
    }

    /// Whether the remote dataset for this metric is filtered by date.
    pub fn needs_dates(&self) -> bool {
        !matches!(self, MetricKind::PopulationDensity)
    }

    /// Format a value with this metric's precision and unit.
    pub fn format(&self, value: MetricValue) -> String {
        match (self, value.value()) {
            (_, None) => "No data".to_string(),
            (MetricKind::Temperature, Some(v)) => format!("{v:.1}{}", self.unit()),
            (MetricKind::Ndvi, Some(v)) => format!("{v:.3}"),
            (MetricKind::PopulationDensity, Some(v)) => format!("{v:.0} {}", self.unit()),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricKind::Temperature => "temperature",
            MetricKind::Ndvi => "ndvi",
            MetricKind::PopulationDensity => "population-density",
        })
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "temperature" | "temp" | "mean-temperature" | "lst" => Ok(MetricKind::Temperature),
            "ndvi" | "vegetation" => Ok(MetricKind::Ndvi),
            "population-density" | "population" | "density" => Ok(MetricKind::PopulationDensity),
            other => Err(format!(
                "unknown metric {other:?} (expected temperature, ndvi or population-density)"
            )),
        }
    }
}

/// A sampled statistic: a finite number or an explicit absence, never both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Measured(f64),
    Absent,
}

impl MetricValue {
    /// Wrap a raw float; NaN and infinities become `Absent`.
    pub fn new(value: f64) -> Self {
        if value.is_finite() { MetricValue::Measured(value) } else { MetricValue::Absent }
    }

    pub fn from_option(value: Option<f64>) -> Self {
        value.map_or(MetricValue::Absent, MetricValue::new)
    }

    #[inline]
    pub fn value(self) -> Option<f64> {
        match self {
            MetricValue::Measured(v) => Some(v),
            MetricValue::Absent => None,
        }
    }

    #[inline]
    pub fn is_absent(self) -> bool { matches!(self, MetricValue::Absent) }

    /// Apply `f` to a measured value, keeping absence as is.
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            MetricValue::Measured(v) => MetricValue::new(f(v)),
            MetricValue::Absent => MetricValue::Absent,
        }
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self { MetricValue::from_option(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_values_are_absent() {
        assert_eq!(MetricValue::new(f64::NAN), MetricValue::Absent);
        assert_eq!(MetricValue::new(f64::INFINITY), MetricValue::Absent);
        assert_eq!(MetricValue::new(0.0), MetricValue::Measured(0.0));
        assert_eq!(MetricValue::from_option(None), MetricValue::Absent);
    }

    #[test]
    fn map_preserves_absence() {
        assert_eq!(MetricValue::Absent.map(|v| v + 1.0), MetricValue::Absent);
        assert_eq!(MetricValue::Measured(1.0).map(|v| v * 2.0), MetricValue::Measured(2.0));
    }

    #[test]
    fn parses_metric_names() {
        assert_eq!("Mean Temperature".parse::<MetricKind>(), Ok(MetricKind::Temperature));
        assert_eq!("NDVI".parse::<MetricKind>(), Ok(MetricKind::Ndvi));
        assert_eq!("population_density".parse::<MetricKind>(), Ok(MetricKind::PopulationDensity));
        assert!("rainfall".parse::<MetricKind>().is_err());
        for kind in MetricKind::all() {
            assert_eq!(kind.to_string().parse::<MetricKind>(), Ok(kind));
        }
    }

    #[test]
    fn formats_with_units() {
        assert_eq!(MetricKind::Temperature.format(MetricValue::Measured(36.04)), "36.0°C");
        assert_eq!(MetricKind::PopulationDensity.format(MetricValue::Measured(12000.4)), "12000 people/km²");
        assert_eq!(MetricKind::Ndvi.format(MetricValue::Absent), "No data");
    }
}
