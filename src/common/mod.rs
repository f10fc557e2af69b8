mod fs;
mod geojson;

pub use fs::require_file_exists;
pub(crate) use fs::*;
pub(crate) use geojson::*;
