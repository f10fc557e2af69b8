use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::info;
use urbanheat::{read_districts, write_districts, write_html_map, Analysis, Config, MetricKind};

use crate::cli::SourceArg;

use super::{check_inputs, date_range, source_path, SourceLoader};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::AnalyzeArgs) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let out_path = args.output.clone().unwrap_or("./districts_with_metrics.geojson".into());
    let map_path = args.map.clone().unwrap_or("./districts_map.html".into());

    let mut requested: Vec<(MetricKind, SourceArg)> = [
        (MetricKind::Temperature, &args.temperature),
        (MetricKind::Ndvi, &args.ndvi),
        (MetricKind::PopulationDensity, &args.population),
    ]
    .into_iter()
    .filter_map(|(kind, source)| source.clone().map(|s| (kind, s)))
    .collect();
    if requested.is_empty() {
        info!("[analyze] no metric sources given, using remote temperature");
        requested.push((MetricKind::Temperature, SourceArg::Remote));
    }

    let inputs: Vec<&PathBuf> = std::iter::once(&args.districts)
        .chain(requested.iter().filter_map(|(_, source)| source_path(source)))
        .collect();
    check_inputs(inputs)?;

    let dates = date_range(args.start.as_deref(), args.end.as_deref())?;

    let rank_by = args.rank_by.unwrap_or_else(|| {
        let configured = config.analysis.rank_by;
        if requested.iter().any(|(kind, _)| *kind == configured) { configured } else { requested[0].0 }
    });

    let mut loader = SourceLoader::new(config.backend.clone(), args.raw_encoding);
    let mut analysis = Analysis::from_config(&config.analysis, dates)
        .top_n(args.top_n.unwrap_or(config.analysis.top_n))
        .rank_by(rank_by);
    for (kind, source) in &requested {
        let counts = *kind == MetricKind::PopulationDensity && args.population_counts;
        analysis = analysis.with_source(*kind, loader.load(*kind, source, counts)?);
    }
    analysis.check()?;

    info!("[analyze] loading districts from {}", args.districts.display());
    let mut districts = read_districts(&args.districts)?;

    let report = analysis.run(&mut districts)?;

    info!("[analyze] writing districts to {}", out_path.display());
    write_districts(&out_path, &districts)?;

    let map_metric = args.map_metric.unwrap_or(rank_by);
    info!("[analyze] writing {map_metric} map to {}", map_path.display());
    write_html_map(&map_path, &districts, map_metric, dates.as_ref())?;

    println!("Top {} districts by {}:", report.hotspots.len(), report.rank_by.label());
    for hotspot in &report.hotspots {
        println!("{hotspot}");
    }
    for failure in &report.errors {
        eprintln!("[analyze] data source error: {failure}");
    }
    if !report.skipped.is_empty() {
        eprintln!("[analyze] {} districts skipped for unsupported geometry", report.skipped.len());
    }
    println!("Saved {} and {}", out_path.display(), map_path.display());

    if report.has_errors() {
        bail!(
            "[analyze] {} data source errors; affected districts were written without values",
            report.errors.len()
        );
    }
    Ok(())
}
