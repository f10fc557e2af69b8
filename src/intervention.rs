use std::fmt;

use serde::Serialize;

use crate::metric::{MetricKind, MetricValue};

pub const TEMPERATURE_EXTREME: f64 = 40.0;
pub const TEMPERATURE_HIGH: f64 = 35.0;
pub const DENSITY_HIGH: f64 = 10_000.0;
pub const NDVI_LOW: f64 = 0.2;

/// Recommended action for one metric reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ExtremeHeat,
    HighHeat,
    NoUrgentAction,
    HighDensity,
    MonitorDensity,
    LowVegetation,
    VegetationAdequate,
    NoData,
}

impl Recommendation {
    /// Bands include their lower bound: 40.0 °C is extreme, 0.2 NDVI is adequate.
    pub fn classify(kind: MetricKind, value: MetricValue) -> Self {
        let Some(v) = value.value() else { return Recommendation::NoData };
        match kind {
            MetricKind::Temperature if v >= TEMPERATURE_EXTREME => Recommendation::ExtremeHeat,
            MetricKind::Temperature if v >= TEMPERATURE_HIGH => Recommendation::HighHeat,
            MetricKind::Temperature => Recommendation::NoUrgentAction,
            MetricKind::PopulationDensity if v > DENSITY_HIGH => Recommendation::HighDensity,
            MetricKind::PopulationDensity => Recommendation::MonitorDensity,
            MetricKind::Ndvi if v < NDVI_LOW => Recommendation::LowVegetation,
            MetricKind::Ndvi => Recommendation::VegetationAdequate,
        }
    }

    pub fn message(&self, district: &str) -> String {
        match self {
            Recommendation::ExtremeHeat => format!("Extreme heat: install cooling centers and plant shade trees in {district}."),
            Recommendation::HighHeat => format!("High heat: encourage water access and spraying, and increase vegetation in {district}."),
            Recommendation::NoUrgentAction => format!("No urgent intervention required in {district}."),
            Recommendation::HighDensity => format!("High density: expand public spaces and monitor growth in {district}."),
            Recommendation::MonitorDensity => format!("Moderate density: monitor population growth in {district}."),
            Recommendation::LowVegetation => format!("Low vegetation: plant more greenery in {district}."),
            Recommendation::VegetationAdequate => format!("Vegetation adequate in {district}."),
            Recommendation::NoData => "No data available for this metric.".to_string(),
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recommendation::ExtremeHeat => "extreme heat",
            Recommendation::HighHeat => "high heat",
            Recommendation::NoUrgentAction => "no urgent action",
            Recommendation::HighDensity => "high density",
            Recommendation::MonitorDensity => "monitor density",
            Recommendation::LowVegetation => "low vegetation",
            Recommendation::VegetationAdequate => "vegetation adequate",
            Recommendation::NoData => "no data",
        })
    }
}

/// Intervention text for a district given one metric reading.
pub fn generate_intervention(district: &str, kind: MetricKind, value: MetricValue) -> String {
    Recommendation::classify(kind, value).message(district)
}
