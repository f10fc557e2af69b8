use std::fmt;

use geo::Rect;

use super::{GeoTransform, RasterError};

pub const EPSG_WGS84: u32 = 4326;

/// A single-band grid of pixel values, row-major, with its georeferencing.
#[derive(Debug, Clone)]
pub struct Raster {
    width: usize,
    height: usize,
    data: Vec<f64>,
    transform: GeoTransform,
    nodata: Option<f64>,
    epsg: Option<u32>, // Declared CRS, if any
}

impl Raster {
    pub fn new(
        width: usize,
        height: usize,
        data: Vec<f64>,
        transform: GeoTransform,
        nodata: Option<f64>,
    ) -> Result<Self, RasterError> {
        if data.len() != width * height {
            return Err(RasterError::Shape { expected: width * height, actual: data.len() });
        }
        Ok(Self { width, height, data, transform, nodata, epsg: Some(EPSG_WGS84) })
    }

    /// Replace the declared CRS (`None` means undeclared).
    pub fn with_epsg(mut self, epsg: Option<u32>) -> Self {
        self.epsg = epsg;
        self
    }

    #[inline] pub fn width(&self) -> usize { self.width }

    #[inline] pub fn height(&self) -> usize { self.height }

    #[inline] pub fn transform(&self) -> &GeoTransform { &self.transform }

    #[inline] pub fn nodata(&self) -> Option<f64> { self.nodata }

    #[inline] pub fn epsg(&self) -> Option<u32> { self.epsg }

    #[inline] pub fn data(&self) -> &[f64] { &self.data }

    #[inline]
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        (col < self.width && row < self.height).then(|| self.data[row * self.width + col])
    }

    /// A pixel counts toward statistics unless it is NaN or equals the nodata sentinel.
    #[inline]
    pub fn is_valid(&self, value: f64) -> bool {
        !value.is_nan() && self.nodata.is_none_or(|nodata| value != nodata)
    }

    pub fn bounds(&self) -> Rect<f64> { self.transform.bounds(self.width, self.height) }

    /// Error unless the raster is in WGS84 lon/lat (undeclared is accepted).
    pub fn require_wgs84(&self) -> Result<(), RasterError> {
        match self.epsg {
            Some(epsg) if epsg != EPSG_WGS84 => Err(RasterError::Crs(epsg)),
            _ => Ok(()),
        }
    }

    /// Summarize dimensions, georeferencing and the valid value range.
    pub fn info(&self) -> RasterInfo {
        let (min, max) = self.data.iter()
            .copied()
            .filter(|&v| self.is_valid(v))
            .fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), v| {
                (Some(lo.map_or(v, |lo| lo.min(v))), Some(hi.map_or(v, |hi| hi.max(v))))
            });

        RasterInfo {
            width: self.width,
            height: self.height,
            bands: 1,
            bounds: self.bounds(),
            epsg: self.epsg,
            nodata: self.nodata,
            min,
            max,
        }
    }
}

/// Human-readable raster summary.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub bounds: Rect<f64>,
    pub epsg: Option<u32>,
    pub nodata: Option<f64>,
    pub min: Option<f64>, // Over valid pixels only
    pub max: Option<f64>,
}

impl fmt::Display for RasterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Width: {}, Height: {}", self.width, self.height)?;
        writeln!(
            f,
            "Bounds: left={} bottom={} right={} top={}",
            self.bounds.min().x, self.bounds.min().y, self.bounds.max().x, self.bounds.max().y,
        )?;
        match self.epsg {
            Some(epsg) => writeln!(f, "CRS: EPSG:{epsg}")?,
            None => writeln!(f, "CRS: undeclared")?,
        }
        writeln!(f, "Number of bands: {}", self.bands)?;
        match self.nodata {
            Some(nodata) => writeln!(f, "Nodata: {nodata}")?,
            None => writeln!(f, "Nodata: none")?,
        }
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "Min value: {min}, Max value: {max}"),
            _ => write!(f, "Min value: n/a, Max value: n/a (no valid pixels)"),
        }
    }
}
