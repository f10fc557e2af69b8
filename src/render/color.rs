//! Tier classification and colors for the district map.

use std::fmt;

use crate::metric::{MetricKind, MetricValue};

/// Simple RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl fmt::Display for Rgb {
    /// Format as CSS: rgb(r,g,b)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

/// Level of concern for a district on one metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    Low,
    Medium,
    High,
    NoData,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Low, Tier::Medium, Tier::High, Tier::NoData];

    /// Legend text for this tier on `kind`.
    pub fn label(&self, kind: MetricKind) -> &'static str {
        match (kind, self) {
            (_, Tier::NoData) => "No data",
            (MetricKind::Temperature, Tier::Low) => "Below 35°C",
            (MetricKind::Temperature, Tier::Medium) => "35°C to 40°C",
            (MetricKind::Temperature, Tier::High) => "40°C and above",
            (MetricKind::PopulationDensity, Tier::Low) => "Below 5,000 people/km²",
            (MetricKind::PopulationDensity, Tier::Medium) => "5,000 to 10,000 people/km²",
            (MetricKind::PopulationDensity, Tier::High) => "Above 10,000 people/km²",
            (MetricKind::Ndvi, Tier::Low) => "NDVI 0.5 and above",
            (MetricKind::Ndvi, Tier::Medium) => "NDVI 0.2 to 0.5",
            (MetricKind::Ndvi, Tier::High) => "NDVI below 0.2",
        }
    }
}

/// Bucket a metric value. Low NDVI is high concern, so its scale is inverted.
pub fn tier(kind: MetricKind, value: MetricValue) -> Tier {
    let Some(v) = value.value() else { return Tier::NoData };
    match kind {
        MetricKind::Temperature if v < 35.0 => Tier::Low,
        MetricKind::Temperature if v < 40.0 => Tier::Medium,
        MetricKind::Temperature => Tier::High,
        MetricKind::PopulationDensity if v < 5_000.0 => Tier::Low,
        MetricKind::PopulationDensity if v <= 10_000.0 => Tier::Medium,
        MetricKind::PopulationDensity => Tier::High,
        MetricKind::Ndvi if v < 0.2 => Tier::High,
        MetricKind::Ndvi if v < 0.5 => Tier::Medium,
        MetricKind::Ndvi => Tier::Low,
    }
}

pub fn tier_color(tier: Tier) -> Rgb {
    match tier {
        Tier::Low => Rgb { r: 49, g: 130, b: 189 },
        Tier::Medium => Rgb { r: 253, g: 141, b: 60 },
        Tier::High => Rgb { r: 215, g: 48, b: 39 },
        Tier::NoData => Rgb { r: 189, g: 189, b: 189 },
    }
}
