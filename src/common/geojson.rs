use anyhow::{anyhow, bail, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};

/// An areal geometry parsed from a GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AreaGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

/// Parse a GeoJSON geometry object into a Polygon or MultiPolygon.
/// Any other geometry type is an error naming that type.
pub(crate) fn parse_area_geometry(geometry: &Value) -> Result<AreaGeometry> {
    if geometry.is_null() {
        bail!("unsupported geometry type: null");
    }
    let kind = geometry["type"].as_str()
        .ok_or_else(|| anyhow!("malformed geometry: missing \"type\""))?;
    let coords = || geometry["coordinates"].as_array()
        .ok_or_else(|| anyhow!("malformed {kind}: missing \"coordinates\""));

    match kind {
        "Polygon" => Ok(AreaGeometry::Polygon(parse_polygon_coords(coords()?)?)),
        "MultiPolygon" => {
            let polygons = coords()?.iter()
                .map(|polygon| {
                    let rings = polygon.as_array()
                        .ok_or_else(|| anyhow!("malformed MultiPolygon: polygon is not an array"))?;
                    parse_polygon_coords(rings)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(AreaGeometry::MultiPolygon(MultiPolygon(polygons)))
        }
        other => bail!("unsupported geometry type: {other}"),
    }
}

/// Parse Polygon coordinates: `[exterior, hole, hole, ...]`.
fn parse_polygon_coords(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        let ring = ring.as_array()
            .ok_or_else(|| anyhow!("malformed Polygon: ring is not an array"))?;
        parse_ring_coords(ring)
    });

    let exterior = rings.next()
        .ok_or_else(|| anyhow!("malformed Polygon: missing exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

/// Parse a ring `[[x, y], [x, y], ...]`, closing it if needed.
fn parse_ring_coords(coords: &[Value]) -> Result<LineString<f64>> {
    let mut points = Vec::with_capacity(coords.len() + 1);

    for pair in coords {
        let pair = pair.as_array()
            .filter(|pair| pair.len() >= 2)
            .ok_or_else(|| anyhow!("malformed position: expected [x, y]"))?;
        let x = pair[0].as_f64()
            .ok_or_else(|| anyhow!("malformed position: x must be a number"))?;
        let y = pair[1].as_f64()
            .ok_or_else(|| anyhow!("malformed position: y must be a number"))?;
        points.push(Coord { x, y });
    }

    if points.len() < 3 {
        bail!("malformed ring: {} positions (need at least 3)", points.len());
    }
    if points[0] != points[points.len() - 1] {
        points.push(points[0]);
    }

    Ok(LineString(points))
}

fn ring_to_value(ring: &LineString<f64>) -> Value {
    Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

fn polygon_rings(polygon: &Polygon<f64>) -> Value {
    let mut rings = vec![ring_to_value(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring_to_value));
    Value::Array(rings)
}

/// GeoJSON geometry object for a Polygon.
pub(crate) fn polygon_to_value(polygon: &Polygon<f64>) -> Value {
    json!({ "type": "Polygon", "coordinates": polygon_rings(polygon) })
}

/// GeoJSON geometry object for a MultiPolygon.
pub(crate) fn multipolygon_to_value(shape: &MultiPolygon<f64>) -> Value {
    let polygons: Vec<Value> = shape.0.iter().map(polygon_rings).collect();
    json!({ "type": "MultiPolygon", "coordinates": polygons })
}
