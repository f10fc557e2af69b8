use std::{borrow::Cow, collections::BTreeMap};

use geo::{MultiPolygon, Polygon};
use serde_json::{Map, Value};

use crate::metric::{MetricKind, MetricValue};

/// Geometry of a district as loaded from the vector file.
#[derive(Debug, Clone, PartialEq)]
pub enum DistrictGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
    /// Anything else (points, lines, null, malformed coordinates). Kept so it
    /// can be written back unchanged, but never sampled.
    Unsupported { reason: String, raw: Value },
}

impl DistrictGeometry {
    /// The geometry as a MultiPolygon, or why it cannot be one.
    pub fn try_shape(&self) -> Result<Cow<'_, MultiPolygon<f64>>, &str> {
        match self {
            DistrictGeometry::Polygon(polygon) => Ok(Cow::Owned(MultiPolygon(vec![polygon.clone()]))),
            DistrictGeometry::MultiPolygon(shape) => Ok(Cow::Borrowed(shape)),
            DistrictGeometry::Unsupported { reason, .. } => Err(reason.as_str()),
        }
    }

    pub fn shape(&self) -> Option<Cow<'_, MultiPolygon<f64>>> { self.try_shape().ok() }

    pub fn is_supported(&self) -> bool { !matches!(self, DistrictGeometry::Unsupported { .. }) }
}

/// A named administrative area and the metrics attached to it during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct District {
    pub name: String,
    pub geometry: DistrictGeometry,
    pub properties: Map<String, Value>, // Input properties other than metrics/intervention
    pub metrics: BTreeMap<MetricKind, MetricValue>,
    pub intervention: Option<String>,
}

impl District {
    pub fn new(name: impl Into<String>, geometry: DistrictGeometry) -> Self {
        Self {
            name: name.into(),
            geometry,
            properties: Map::new(),
            metrics: BTreeMap::new(),
            intervention: None,
        }
    }

    /// The value of `kind`, `Absent` if it was never computed.
    pub fn metric(&self, kind: MetricKind) -> MetricValue {
        self.metrics.get(&kind).copied().unwrap_or(MetricValue::Absent)
    }

    pub fn set_metric(&mut self, kind: MetricKind, value: MetricValue) {
        self.metrics.insert(kind, value);
    }
}

/// Find a district by exact name, falling back to a case-insensitive match.
pub fn find_district<'a>(districts: &'a [District], name: &str) -> Option<&'a District> {
    let name = name.trim();
    districts.iter().find(|d| d.name == name)
        .or_else(|| districts.iter().find(|d| d.name.eq_ignore_ascii_case(name)))
}
