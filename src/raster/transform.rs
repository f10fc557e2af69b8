use geo::{Coord, Rect};

/// Affine pixel-to-coordinate transform in GDAL coefficient order:
///   x = origin_x + col * pixel_width + row * row_rotation
///   y = origin_y + col * col_rotation + row * pixel_height
/// where (col, row) address the top-left corner of a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform from the top-left corner and a positive pixel size.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height: -pixel_height.abs(),
        }
    }

    /// Build from the six GDAL coefficients `[c, a, b, f, d, e]`.
    pub fn from_gdal(coefficients: [f64; 6]) -> Self {
        let [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height] = coefficients;
        Self { origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [self.origin_x, self.pixel_width, self.row_rotation, self.origin_y, self.col_rotation, self.pixel_height]
    }

    /// True when rows and columns are aligned with the coordinate axes.
    #[inline]
    pub fn is_axis_aligned(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0
            && self.pixel_width != 0.0 && self.pixel_height != 0.0
    }

    /// Coordinate of a fractional pixel position.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> Coord<f64> {
        Coord {
            x: self.origin_x + col * self.pixel_width + row * self.row_rotation,
            y: self.origin_y + col * self.col_rotation + row * self.pixel_height,
        }
    }

    /// Coordinate of the centre of pixel (col, row).
    #[inline]
    pub fn pixel_center(&self, col: usize, row: usize) -> Coord<f64> {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Shift the origin by half a pixel, converting a PixelIsPoint anchor to PixelIsArea.
    pub(crate) fn shifted_half_pixel(&self) -> Self {
        let corner = self.apply(-0.5, -0.5);
        Self { origin_x: corner.x, origin_y: corner.y, ..*self }
    }

    /// Bounding rectangle of a `width` x `height` grid.
    pub fn bounds(&self, width: usize, height: usize) -> Rect<f64> {
        let (w, h) = (width as f64, height as f64);
        let corners = [self.apply(0.0, 0.0), self.apply(w, 0.0), self.apply(0.0, h), self.apply(w, h)];
        let (mut min, mut max) = (corners[0], corners[0]);
        for c in &corners[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        Rect::new(min, max)
    }
}
