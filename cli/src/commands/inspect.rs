use anyhow::Result;
use urbanheat::read_geotiff;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::InspectArgs) -> Result<()> {
    let raster = read_geotiff(&args.raster)?;
    println!("{}", raster.info());
    Ok(())
}
