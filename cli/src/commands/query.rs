use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use urbanheat::{read_districts, run_query, Config, DateRange, QueryField, QueryForm};

use super::{check_inputs, date_range, source_path, SourceLoader};

/// Ask for one line on stdin; `None` at end of input.
fn prompt(input: &mut impl BufRead, label: &str) -> Result<Option<String>> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line).context("[query] Failed to read stdin")? == 0 { return Ok(None) }
    Ok(Some(line.trim().to_string()))
}

/// Prompt until `field` holds a valid value.
fn fill(form: &mut QueryForm, field: QueryField, input: &mut impl BufRead) -> Result<()> {
    loop {
        let result = match field {
            QueryField::Dates => {
                let Some(start) = prompt(input, "Start date (YYYY-MM-DD)")? else { break };
                let Some(end) = prompt(input, "End date (YYYY-MM-DD)")? else { break };
                DateRange::parse(&start, &end).map(|dates| { form.set_dates(dates); }).map_err(|e| e.to_string())
            }
            QueryField::Metric => {
                let Some(text) = prompt(input, "Metric (temperature, ndvi, population-density)")? else { break };
                text.parse().map(|metric| { form.set_metric(metric); })
            }
            QueryField::District => {
                let Some(text) = prompt(input, "District")? else { break };
                form.set_district(&text);
                Ok(())
            }
        };
        match result {
            Ok(()) if !form.missing().contains(&field) => return Ok(()),
            Ok(()) => {}
            Err(message) => eprintln!("{message}"),
        }
    }
    bail!("[query] No {field} given")
}

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::QueryArgs) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    check_inputs(std::iter::once(&args.districts).chain(source_path(&args.source)))?;

    let mut form = QueryForm::new();
    if let Some(dates) = date_range(args.start.as_deref(), args.end.as_deref())? { form.set_dates(dates); }
    if let Some(metric) = args.metric { form.set_metric(metric); }
    if let Some(district) = &args.district { form.set_district(district); }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    for field in form.missing() {
        fill(&mut form, field, &mut input)?;
    }
    let Some(query) = form.ready() else { bail!("[query] Incomplete query") };

    let districts = read_districts(&args.districts)?;
    let source = SourceLoader::new(config.backend, args.raw_encoding).load(query.metric, &args.source, false)?;

    let answer = run_query(&query, &districts, &source)?;
    println!("{answer}");
    Ok(())
}
