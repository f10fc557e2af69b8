use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use geo::{BoundingRect, Coord, LineString, MultiPolygon, Rect};
use tracing::debug;

use crate::{
    common::write_atomic,
    dates::DateRange,
    district::District,
    metric::MetricKind,
};

use super::{tier, tier_color, Tier};

const MAP_WIDTH: f64 = 960.0;
const MAP_MARGIN: f64 = 10.0;

/// Equirectangular lon/lat -> SVG projection, x scaled by cos(mid latitude).
#[derive(Debug, Clone, Copy)]
struct Viewport {
    bounds: Rect<f64>,
    x_factor: f64,
    scale: f64,
    width: f64,
    height: f64,
}

impl Viewport {
    fn fit(bounds: Rect<f64>) -> Self {
        let mid_lat = (bounds.min().y + bounds.max().y) / 2.0;
        let x_factor = mid_lat.to_radians().cos().max(1e-6);
        let extent_x = (bounds.width() * x_factor).max(f64::EPSILON);
        let scale = (MAP_WIDTH - 2.0 * MAP_MARGIN) / extent_x;
        let height = bounds.height() * scale + 2.0 * MAP_MARGIN;
        Self { bounds, x_factor, scale, width: MAP_WIDTH, height }
    }

    #[inline]
    fn project(&self, coord: &Coord<f64>) -> (f64, f64) {
        let x = MAP_MARGIN + (coord.x - self.bounds.min().x) * self.x_factor * self.scale;
        let y = MAP_MARGIN + (self.bounds.max().y - coord.y) * self.scale; // invert vertically
        (x, y)
    }

    /// Compact SVG path for a MultiPolygon (exteriors + holes).
    fn path(&self, shape: &MultiPolygon<f64>) -> String {
        let mut out = String::new();
        for polygon in &shape.0 {
            self.ring_to_path(polygon.exterior(), &mut out);
            for interior in polygon.interiors() {
                self.ring_to_path(interior, &mut out);
            }
        }
        out
    }

    fn ring_to_path(&self, ring: &LineString<f64>, out: &mut String) {
        let mut coords = ring.0.iter().map(|c| self.project(c));
        if let Some((x, y)) = coords.next() {
            out.push_str(&format!(" M{x:.3},{y:.3}"));
            for (x, y) in coords {
                out.push_str(&format!(" L{x:.3},{y:.3}"));
            }
            out.push('Z');
        }
    }
}

/// Escape text for HTML element content and attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn combined_bounds(districts: &[District]) -> Option<Rect<f64>> {
    districts.iter()
        .filter_map(|d| d.geometry.shape()?.bounding_rect())
        .reduce(|a, b| Rect::new(
            Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
            Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
        ))
}

fn write_styles(writer: &mut impl Write) -> Result<()> {
    writeln!(writer, r##"<style>
    body {{ font-family: sans-serif; margin: 1.5rem; color: #111827; }}
    header p {{ color: #4b5563; margin-top: 0; }}
    .dist {{ stroke: #111827; stroke-width: 0.6; fill-opacity: 0.85; vector-effect: non-scaling-stroke; }}
    .dist:hover {{ fill-opacity: 1; stroke-width: 1.5; }}
    .legend {{ list-style: none; padding: 0; }}
    .legend li {{ display: flex; align-items: center; margin: 0.25rem 0; }}
    .swatch {{ width: 1rem; height: 1rem; margin-right: 0.5rem; border: 1px solid #111827; }}
</style>"##)?;
    Ok(())
}

fn write_legend(writer: &mut impl Write, kind: MetricKind) -> Result<()> {
    writeln!(writer, r#"<section><h2>Legend</h2><ul class="legend">"#)?;
    for t in Tier::ALL {
        writeln!(
            writer,
            r#"<li><span class="swatch" style="background:{}"></span>{}</li>"#,
            tier_color(t), escape(t.label(kind)),
        )?;
    }
    writeln!(writer, "</ul></section>")?;
    Ok(())
}

fn tooltip(district: &District, kind: MetricKind) -> String {
    let mut text = format!("{}\n{}: {}", district.name, kind.label(), kind.format(district.metric(kind)));
    if let Some(intervention) = &district.intervention {
        text.push('\n');
        text.push_str(intervention);
    }
    escape(&text)
}

/// Render a standalone HTML page with one SVG path per district, filled by
/// the tier of `kind`.
pub fn render_html_map(
    writer: &mut impl Write,
    districts: &[District],
    kind: MetricKind,
    dates: Option<&DateRange>,
) -> Result<()> {
    let title = format!("{} by district", kind.label());
    let period = match dates {
        Some(range) if kind.needs_dates() => range.to_string(),
        _ => "Latest available data".to_string(),
    };

    writeln!(writer, "<!DOCTYPE html>")?;
    writeln!(writer, r#"<html lang="en"><head><meta charset="utf-8"><title>{}</title>"#, escape(&title))?;
    write_styles(writer)?;
    writeln!(writer, "</head><body>")?;
    writeln!(writer, "<header><h1>{}</h1><p>{}</p></header>", escape(&title), escape(&period))?;

    match combined_bounds(districts) {
        Some(bounds) => {
            let viewport = Viewport::fit(bounds);
            writeln!(
                writer,
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.3} {h:.3}">"#,
                w = viewport.width, h = viewport.height,
            )?;
            for district in districts {
                let Some(shape) = district.geometry.shape() else { continue };
                let fill = tier_color(tier(kind, district.metric(kind)));
                writeln!(
                    writer,
                    r#"<path class="dist" fill-rule="evenodd" style="fill:{fill}" d="{}"><title>{}</title></path>"#,
                    viewport.path(&shape), tooltip(district, kind),
                )?;
            }
            writeln!(writer, "</svg>")?;
        }
        None => writeln!(writer, "<p>No district geometry to draw.</p>")?,
    }

    write_legend(writer, kind)?;
    writeln!(writer, "</body></html>")?;
    Ok(())
}

/// Write the district map for `kind` to `path`.
pub fn write_html_map(path: &Path, districts: &[District], kind: MetricKind, dates: Option<&DateRange>) -> Result<()> {
    let mut html = Vec::new();
    render_html_map(&mut html, districts, kind, dates)
        .with_context(|| format!("[to_html] Failed to render map for {}", path.display()))?;
    write_atomic(path, &html)?;
    debug!("[to_html] wrote {} districts to {}", districts.len(), path.display());
    Ok(())
}
