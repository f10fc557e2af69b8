use std::{convert::Infallible, path::PathBuf, str::FromStr};

use urbanheat::MetricKind;

/// Urban heat district analysis CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "urbanheat", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML config file with [backend] and [analysis] sections
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Compute district metrics, rank hotspots and write GeoJSON + HTML map
    Analyze(AnalyzeArgs),

    /// Compute one metric for one district, prompting for missing inputs
    Query(QueryArgs),

    /// Print a summary of a GeoTIFF raster
    Inspect(InspectArgs),
}

/// Where a metric is read from: `remote` or a GeoTIFF path.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceArg {
    Remote,
    File(PathBuf),
}

impl FromStr for SourceArg {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("remote") { SourceArg::Remote } else { SourceArg::File(s.into()) })
    }
}

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// District polygons (GeoJSON FeatureCollection)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub districts: PathBuf,

    /// Land-surface temperature source: "remote" or a GeoTIFF in °C
    #[arg(long, value_name = "remote|PATH")]
    pub temperature: Option<SourceArg>,

    /// NDVI source: "remote" or a GeoTIFF
    #[arg(long, value_name = "remote|PATH")]
    pub ndvi: Option<SourceArg>,

    /// Population density source: "remote" or a GeoTIFF
    #[arg(long, value_name = "remote|PATH")]
    pub population: Option<SourceArg>,

    /// The population GeoTIFF holds per-pixel counts, not density
    #[arg(long)]
    pub population_counts: bool,

    /// Local GeoTIFFs hold the remote datasets' raw integer encoding
    #[arg(long)]
    pub raw_encoding: bool,

    /// Start date, YYYY-MM-DD (required for remote temperature/NDVI)
    #[arg(long)]
    pub start: Option<String>,

    /// End date, YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,

    /// Output GeoJSON, defaults to "./districts_with_metrics.geojson"
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Output HTML map, defaults to "./districts_map.html"
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub map: Option<PathBuf>,

    /// Metric drawn on the map, defaults to the ranking metric
    #[arg(long)]
    pub map_metric: Option<MetricKind>,

    /// Number of hotspots that receive an intervention
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Metric used to rank hotspots
    #[arg(long)]
    pub rank_by: Option<MetricKind>,
}

#[derive(clap::Args, Debug)]
pub struct QueryArgs {
    /// District polygons (GeoJSON FeatureCollection)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub districts: PathBuf,

    /// Metric source: "remote" or a GeoTIFF path
    #[arg(long, value_name = "remote|PATH", default_value = "remote")]
    pub source: SourceArg,

    /// Local GeoTIFF holds the remote dataset's raw integer encoding
    #[arg(long)]
    pub raw_encoding: bool,

    #[arg(long)]
    pub metric: Option<MetricKind>,

    #[arg(long)]
    pub district: Option<String>,

    #[arg(long)]
    pub start: Option<String>,

    #[arg(long)]
    pub end: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// GeoTIFF raster
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub raster: PathBuf,
}
