use geo::{BoundingRect, LineString, MultiPolygon, Polygon};

use super::{GeoTransform, RasterError};

/// Boolean coverage of a polygon over a window of a raster's pixel grid.
/// A pixel is covered when its centre lies inside the polygon (even-odd rule,
/// so holes are excluded).
#[derive(Debug, Clone)]
pub struct CoverageMask {
    col0: usize,
    row0: usize,
    cols: usize,
    rows: usize,
    bits: Vec<bool>,
}

impl CoverageMask {
    fn empty() -> Self {
        Self { col0: 0, row0: 0, cols: 0, rows: 0, bits: Vec::new() }
    }

    /// Rasterize `shape` against a `width` x `height` grid with the given transform.
    pub fn rasterize(
        shape: &MultiPolygon<f64>,
        transform: &GeoTransform,
        width: usize,
        height: usize,
    ) -> Result<Self, RasterError> {
        if !transform.is_axis_aligned() {
            return Err(RasterError::Rotated);
        }
        let Some(bbox) = shape.bounding_rect() else { return Ok(Self::empty()) };

        // Pixel window covering the bounding box, clipped to the grid.
        let (c_a, r_a) = to_pixel(transform, bbox.min().x, bbox.min().y);
        let (c_b, r_b) = to_pixel(transform, bbox.max().x, bbox.max().y);
        let (col0, col1) = clip_span(c_a.min(c_b), c_a.max(c_b), width);
        let (row0, row1) = clip_span(r_a.min(r_b), r_a.max(r_b), height);
        if col0 >= col1 || row0 >= row1 {
            return Ok(Self::empty());
        }

        let mut mask = Self {
            col0,
            row0,
            cols: col1 - col0,
            rows: row1 - row0,
            bits: vec![false; (col1 - col0) * (row1 - row0)],
        };

        let mut crossings = Vec::new();
        for row in row0..row1 {
            let y = transform.origin_y + (row as f64 + 0.5) * transform.pixel_height;
            for polygon in &shape.0 {
                crossings.clear();
                polygon_crossings(polygon, y, &mut crossings);
                crossings.sort_by(f64::total_cmp);

                for pair in crossings.chunks_exact(2) {
                    let a = (pair[0] - transform.origin_x) / transform.pixel_width;
                    let b = (pair[1] - transform.origin_x) / transform.pixel_width;
                    // Columns whose centre c + 0.5 lies in [min(a, b), max(a, b)).
                    let start = (a.min(b) - 0.5).ceil().clamp(col0 as f64, col1 as f64) as usize;
                    let end = (a.max(b) - 0.5).ceil().clamp(col0 as f64, col1 as f64) as usize;
                    for col in start..end {
                        mask.set(col, row);
                    }
                }
            }
        }

        Ok(mask)
    }

    #[inline]
    fn set(&mut self, col: usize, row: usize) {
        let idx = (row - self.row0) * self.cols + (col - self.col0);
        self.bits[idx] = true;
    }

    /// Whether pixel (col, row) of the full grid is covered.
    pub fn contains(&self, col: usize, row: usize) -> bool {
        col >= self.col0 && col < self.col0 + self.cols
            && row >= self.row0 && row < self.row0 + self.rows
            && self.bits[(row - self.row0) * self.cols + (col - self.col0)]
    }

    /// Number of covered pixels.
    pub fn count(&self) -> usize { self.bits.iter().filter(|&&b| b).count() }

    /// Covered pixels as (col, row) in the full grid, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.bits.iter().enumerate()
            .filter(|(_, covered)| **covered)
            .map(|(idx, _)| (self.col0 + idx % self.cols, self.row0 + idx / self.cols))
    }
}

/// Fractional pixel position of a coordinate on an axis-aligned grid.
#[inline]
fn to_pixel(transform: &GeoTransform, x: f64, y: f64) -> (f64, f64) {
    ((x - transform.origin_x) / transform.pixel_width, (y - transform.origin_y) / transform.pixel_height)
}

/// Integer span [floor(lo), ceil(hi)) clipped to [0, len).
fn clip_span(lo: f64, hi: f64, len: usize) -> (usize, usize) {
    let lo = lo.floor().clamp(0.0, len as f64) as usize;
    let hi = hi.ceil().clamp(0.0, len as f64) as usize;
    (lo, hi)
}

/// X coordinates where the horizontal line at `y` crosses the polygon's rings.
fn polygon_crossings(polygon: &Polygon<f64>, y: f64, out: &mut Vec<f64>) {
    ring_crossings(polygon.exterior(), y, out);
    for hole in polygon.interiors() {
        ring_crossings(hole, y, out);
    }
}

fn ring_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for edge in ring.0.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        // Half-open test so a vertex exactly on the scanline is counted once.
        if (a.y > y) != (b.y > y) {
            out.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::*;

    fn unit_grid() -> GeoTransform {
        // 4x4 grid of 1x1 pixels covering [0, 4] x [0, 4]
        GeoTransform::north_up(0.0, 4.0, 1.0, 1.0)
    }

    #[test]
    fn square_covers_every_pixel_center() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)];
        let mask = CoverageMask::rasterize(&MultiPolygon(vec![square]), &unit_grid(), 4, 4).unwrap();
        assert_eq!(mask.count(), 16);
    }

    #[test]
    fn holes_are_excluded() {
        let with_hole = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)]],
        );
        let mask = CoverageMask::rasterize(&MultiPolygon(vec![with_hole]), &unit_grid(), 4, 4).unwrap();
        assert_eq!(mask.count(), 12);
        assert!(!mask.contains(1, 1));
        assert!(!mask.contains(2, 2));
        assert!(mask.contains(0, 0));
    }

    #[test]
    fn multipolygon_parts_are_both_covered() {
        let a = polygon![(x: 0.0, y: 3.0), (x: 1.0, y: 3.0), (x: 1.0, y: 4.0), (x: 0.0, y: 4.0)];
        let b = polygon![(x: 3.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 1.0), (x: 3.0, y: 1.0)];
        let mask = CoverageMask::rasterize(&MultiPolygon(vec![a, b]), &unit_grid(), 4, 4).unwrap();
        let cells: Vec<_> = mask.cells().collect();
        assert_eq!(cells, vec![(0, 0), (3, 3)]);
    }

    #[test]
    fn triangle_uses_pixel_centers() {
        // Diagonal through (0,0)-(4,4): centres on or below the line are inside.
        let triangle = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0)];
        let mask = CoverageMask::rasterize(&MultiPolygon(vec![triangle]), &unit_grid(), 4, 4).unwrap();
        // Row 3 (y=0.5): x in [0.5, 4) -> 4 cells; row 2: 3; row 1: 2; row 0: 1.
        assert_eq!(mask.count(), 10);
        assert!(mask.contains(0, 3));
        assert!(!mask.contains(0, 2));
    }

    #[test]
    fn polygon_outside_grid_is_empty() {
        let far = polygon![(x: 10.0, y: 10.0), (x: 11.0, y: 10.0), (x: 11.0, y: 11.0)];
        let mask = CoverageMask::rasterize(&MultiPolygon(vec![far]), &unit_grid(), 4, 4).unwrap();
        assert_eq!(mask.count(), 0);
        assert_eq!(mask.cells().count(), 0);
    }

    #[test]
    fn rotated_grid_is_rejected() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let rotated = GeoTransform::from_gdal([0.0, 1.0, 0.1, 4.0, 0.0, -1.0]);
        assert!(matches!(
            CoverageMask::rasterize(&MultiPolygon(vec![square]), &rotated, 4, 4),
            Err(RasterError::Rotated),
        ));
    }
}
