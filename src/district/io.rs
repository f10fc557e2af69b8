use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::{
    common::{multipolygon_to_value, parse_area_geometry, polygon_to_value, require_file_exists, write_atomic, AreaGeometry},
    metric::{MetricKind, MetricValue},
};

use super::{District, DistrictGeometry};

const NAME_KEYS: [&str; 2] = ["district_name", "name"];
const INTERVENTION_KEY: &str = "intervention";

/// Read districts from a GeoJSON FeatureCollection file.
pub fn read_districts(path: &Path) -> Result<Vec<District>> {
    require_file_exists(path)?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("[districts] Failed to read {}", path.display()))?;
    let districts = districts_from_geojson_bytes(&bytes)
        .with_context(|| format!("[districts] Failed to parse {}", path.display()))?;
    debug!("[districts] loaded {} districts from {}", districts.len(), path.display());
    Ok(districts)
}

/// Parse districts from GeoJSON bytes. Features with unsupported or malformed
/// geometry are kept with `DistrictGeometry::Unsupported`.
pub fn districts_from_geojson_bytes(bytes: &[u8]) -> Result<Vec<District>> {
    let value: Value = serde_json::from_slice(bytes).context("Invalid JSON")?;
    if value["type"].as_str() != Some("FeatureCollection") {
        bail!("expected a GeoJSON FeatureCollection");
    }
    let features = value["features"].as_array()
        .context("FeatureCollection has no \"features\" array")?;

    Ok(features.iter().enumerate().map(|(idx, feature)| district_from_feature(idx, feature)).collect())
}

fn district_from_feature(idx: usize, feature: &Value) -> District {
    let mut properties = feature["properties"].as_object().cloned().unwrap_or_default();

    let name = NAME_KEYS.iter()
        .find_map(|key| properties.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("district_{idx}"));

    let geometry = match parse_area_geometry(&feature["geometry"]) {
        Ok(AreaGeometry::Polygon(polygon)) => DistrictGeometry::Polygon(polygon),
        Ok(AreaGeometry::MultiPolygon(shape)) => DistrictGeometry::MultiPolygon(shape),
        Err(err) => {
            warn!("[districts] {name}: {err}; district will have no data");
            DistrictGeometry::Unsupported { reason: err.to_string(), raw: feature["geometry"].clone() }
        }
    };

    // Metrics from a previous run come back as metrics, not opaque properties.
    let mut district = District::new(name, geometry);
    for kind in MetricKind::all() {
        if let Some(value) = properties.remove(kind.property()) {
            district.set_metric(kind, MetricValue::from_option(value.as_f64()));
        }
    }
    district.intervention = properties.remove(INTERVENTION_KEY)
        .and_then(|v| v.as_str().map(str::to_string));
    district.properties = properties;
    district
}

fn district_to_feature(district: &District) -> Value {
    let mut properties: Map<String, Value> = district.properties.clone();
    if !NAME_KEYS.iter().any(|key| properties.contains_key(*key)) {
        properties.insert("district_name".to_string(), json!(district.name));
    }
    for (kind, value) in &district.metrics {
        properties.insert(kind.property().to_string(), value.value().map_or(Value::Null, |v| json!(v)));
    }
    if let Some(intervention) = &district.intervention {
        properties.insert(INTERVENTION_KEY.to_string(), json!(intervention));
    }

    let geometry = match &district.geometry {
        DistrictGeometry::Polygon(polygon) => polygon_to_value(polygon),
        DistrictGeometry::MultiPolygon(shape) => multipolygon_to_value(shape),
        DistrictGeometry::Unsupported { raw, .. } => raw.clone(),
    };

    json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": properties,
    })
}

/// Serialize districts as a GeoJSON FeatureCollection.
pub fn districts_to_geojson(districts: &[District]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": districts.iter().map(district_to_feature).collect::<Vec<_>>(),
    })
}

/// Write districts, with their metrics and interventions, as GeoJSON.
pub fn write_districts(path: &Path, districts: &[District]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(&districts_to_geojson(districts))
        .context("[districts] Failed to serialize GeoJSON")?;
    write_atomic(path, &bytes)?;
    debug!("[districts] wrote {} districts to {}", districts.len(), path.display());
    Ok(())
}
