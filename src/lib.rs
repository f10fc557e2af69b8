#![doc = "Urban heat public API: district zonal statistics, interventions and maps"]
mod analysis;
mod common;
mod config;
mod dates;
mod district;
mod intervention;
mod metric;
mod query;
mod raster;
mod remote;
mod render;
mod sampler;

#[doc(inline)]
pub use analysis::{rank_districts, Analysis, AnalysisReport, Hotspot, SampleFailure};

#[doc(inline)]
pub use common::require_file_exists;

#[doc(inline)]
pub use config::{AnalysisConfig, BackendConfig, Config, DEFAULT_TOKEN_ENV};

#[doc(inline)]
pub use dates::{DateRange, DateRangeError};

#[doc(inline)]
pub use district::{
    districts_from_geojson_bytes, districts_to_geojson, find_district, read_districts, write_districts,
    District, DistrictGeometry,
};

#[doc(inline)]
pub use intervention::{generate_intervention, Recommendation};

#[doc(inline)]
pub use metric::{MetricKind, MetricValue};

#[doc(inline)]
pub use query::{run_query, Query, QueryAnswer, QueryError, QueryField, QueryForm};

#[doc(inline)]
pub use raster::{
    decode_geotiff, density_from_counts, encode_geotiff, read_geotiff, write_geotiff, zonal_mean, zonal_summary,
    CoverageMask, GeoTransform, Raster, RasterError, RasterInfo, ZonalSummary, EPSG_WGS84,
};

#[doc(inline)]
pub use remote::{BackendError, Composite, Conversion, Dataset, HttpBackend, ImageBackend, RegionRequest, RetryPolicy};

#[doc(inline)]
pub use render::{render_html_map, tier, tier_color, write_html_map, Rgb, Tier};

#[doc(inline)]
pub use sampler::{sample, MetricSource, SampleError};
