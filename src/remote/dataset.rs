use crate::metric::MetricKind;

/// How an image collection is collapsed into one image before reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    Mean,   // Per-pixel mean over the filtered date range
    Mosaic, // Most recent pixel, no date filter
}

impl Composite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Composite::Mean => "mean",
            Composite::Mosaic => "mosaic",
        }
    }
}

/// Conversion from the dataset's integer encoding to physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    Identity,
    Linear { scale: f64, offset: f64 },
    Divide(f64),
}

/// A remote image collection band and how to read it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dataset {
    pub collection: &'static str,
    pub band: &'static str,
    pub composite: Composite,
    pub scale_m: f64, // Ground sampling distance passed to the reduction
    pub conversion: Conversion,
}

impl Dataset {
    /// MODIS daily land-surface temperature, Kelvin × 50.
    pub const LAND_SURFACE_TEMPERATURE: Dataset = Dataset {
        collection: "MODIS/061/MOD11A1",
        band: "LST_Day_1km",
        composite: Composite::Mean,
        scale_m: 1000.0,
        conversion: Conversion::Linear { scale: 0.02, offset: -273.15 },
    };

    /// MODIS 16-day vegetation index, NDVI × 10000.
    pub const VEGETATION_INDEX: Dataset = Dataset {
        collection: "MODIS/061/MOD13A2",
        band: "NDVI",
        composite: Composite::Mean,
        scale_m: 500.0,
        conversion: Conversion::Divide(10_000.0),
    };

    /// Gridded Population of the World v4.11 density, people/km².
    pub const POPULATION_DENSITY: Dataset = Dataset {
        collection: "CIESIN/GPWv411/GPW_Population_Density",
        band: "population_density",
        composite: Composite::Mosaic,
        scale_m: 1000.0,
        conversion: Conversion::Identity,
    };

    pub fn for_metric(kind: MetricKind) -> &'static Dataset {
        match kind {
            MetricKind::Temperature => &Self::LAND_SURFACE_TEMPERATURE,
            MetricKind::Ndvi => &Self::VEGETATION_INDEX,
            MetricKind::PopulationDensity => &Self::POPULATION_DENSITY,
        }
    }

    /// Whether requests must carry a date range.
    pub fn is_time_series(&self) -> bool { self.composite == Composite::Mean }

    /// Raw encoded value to physical units.
    pub fn convert(&self, raw: f64) -> f64 {
        match self.conversion {
            Conversion::Identity => raw,
            Conversion::Linear { scale, offset } => raw * scale + offset,
            Conversion::Divide(divisor) => raw / divisor,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn temperature_is_scaled_kelvin() {
        let lst = Dataset::for_metric(MetricKind::Temperature);
        assert_relative_eq!(lst.convert(15_000.0), 26.85, epsilon = 1e-9);
        assert_eq!(lst.scale_m, 1000.0);
    }

    #[test]
    fn ndvi_is_divided_by_ten_thousand() {
        let ndvi = Dataset::for_metric(MetricKind::Ndvi);
        assert_eq!(ndvi.convert(2000.0), 0.2);
        assert_eq!(ndvi.scale_m, 500.0);
        assert!(ndvi.is_time_series());
    }

    #[test]
    fn population_is_static_mosaic() {
        let pop = Dataset::for_metric(MetricKind::PopulationDensity);
        assert_eq!(pop.convert(12_345.0), 12_345.0);
        assert!(!pop.is_time_series());
    }
}
