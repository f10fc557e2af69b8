pub mod analyze;
pub mod inspect;
pub mod query;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use urbanheat::{
    read_geotiff, require_file_exists, BackendConfig, DateRange, HttpBackend, ImageBackend, MetricKind, MetricSource,
};

use crate::cli::SourceArg;

/// Fail before any work if an input file is missing.
pub(crate) fn check_inputs<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Result<()> {
    for path in paths {
        require_file_exists(path)?;
    }
    Ok(())
}

/// Both dates or neither.
pub(crate) fn date_range(start: Option<&str>, end: Option<&str>) -> Result<Option<DateRange>> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(DateRange::parse(start, end)?)),
        (None, None) => Ok(None),
        _ => bail!("--start and --end must be given together"),
    }
}

/// Builds metric sources, sharing one remote client between metrics.
pub(crate) struct SourceLoader {
    backend_config: BackendConfig,
    backend: Option<Arc<dyn ImageBackend>>,
    raw_encoding: bool,
}

impl SourceLoader {
    pub(crate) fn new(backend_config: BackendConfig, raw_encoding: bool) -> Self {
        Self { backend_config, backend: None, raw_encoding }
    }

    pub(crate) fn load(&mut self, kind: MetricKind, source: &SourceArg, counts: bool) -> Result<MetricSource> {
        match source {
            SourceArg::Remote => {
                let backend = self.backend
                    .get_or_insert_with(|| Arc::new(HttpBackend::new(self.backend_config.clone())) as Arc<dyn ImageBackend>)
                    .clone();
                tracing::info!("[sources] {kind}: remote");
                Ok(MetricSource::Remote(backend))
            }
            SourceArg::File(path) => {
                let raster = read_geotiff(path)?;
                raster.require_wgs84().with_context(|| format!("[sources] {}", path.display()))?;
                let raster = Arc::new(raster);
                tracing::info!("[sources] {kind}: {} ({}x{})", path.display(), raster.width(), raster.height());
                Ok(if counts {
                    MetricSource::PopulationCounts(raster)
                } else {
                    MetricSource::Raster { raster, raw_encoding: self.raw_encoding }
                })
            }
        }
    }
}

/// The file path of a source, if it is local.
pub(crate) fn source_path(source: &SourceArg) -> Option<&PathBuf> {
    match source {
        SourceArg::File(path) => Some(path),
        SourceArg::Remote => None,
    }
}
