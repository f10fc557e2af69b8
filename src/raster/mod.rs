mod geotiff;
mod mask;
mod raster;
mod transform;
mod zonal;

use thiserror::Error;

pub use geotiff::*;
pub use mask::CoverageMask;
pub use raster::*;
pub use transform::GeoTransform;
pub use zonal::*;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("raster data has {actual} pixels, expected {expected}")]
    Shape { expected: usize, actual: usize },
    #[error("raster must be in EPSG:4326, found EPSG:{0}")]
    Crs(u32),
    #[error("rotated raster transforms are not supported")]
    Rotated,
    #[error("invalid GeoTIFF: {0}")]
    Format(String),
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
}
