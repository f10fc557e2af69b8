//! GeoTIFF reading and writing for single-band rasters.

use std::{fs::File, io::{BufReader, Read, Seek, Write}, path::Path};

use anyhow::{Context, Result};
use tiff::{
    decoder::{Decoder, DecodingResult},
    encoder::{colortype, TiffEncoder},
    tags::Tag,
    ColorType,
};
use tracing::{debug, warn};

use crate::{common::{require_file_exists, PendingWrite}, raster::{GeoTransform, Raster, RasterError}};

// GeoKey identifiers (GeoTIFF 1.1, section 7).
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

/// Read a single-band GeoTIFF from disk.
pub fn read_geotiff(path: &Path) -> Result<Raster> {
    require_file_exists(path)?;
    let file = File::open(path)
        .with_context(|| format!("[raster] Failed to open {}", path.display()))?;
    let raster = decode_geotiff(BufReader::new(file))
        .with_context(|| format!("[raster] Failed to read GeoTIFF {}", path.display()))?;
    debug!(
        "[raster] {} -> {}x{} nodata={:?} epsg={:?}",
        path.display(), raster.width(), raster.height(), raster.nodata(), raster.epsg(),
    );
    Ok(raster)
}

/// Decode a single-band GeoTIFF from any seekable reader.
pub fn decode_geotiff<R: Read + Seek>(reader: R) -> Result<Raster, RasterError> {
    let mut decoder = Decoder::new(reader)?;

    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => return Err(RasterError::Format(format!("expected a single-band raster, found {other:?}"))),
    }

    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    let geokeys = match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        Some(value) => GeoKeys::parse(&value.into_u16_vec()?),
        None => GeoKeys::default(),
    };

    let mut transform = read_transform(&mut decoder)?;
    if geokeys.get(GT_RASTER_TYPE_GEO_KEY) == Some(RASTER_PIXEL_IS_POINT) {
        transform = transform.shifted_half_pixel();
    }

    let nodata = match decoder.find_tag(Tag::GdalNodata)? {
        Some(value) => parse_nodata(&value.into_string()?)?,
        None => None,
    };

    let data = decoding_result_to_f64(decoder.read_image()?)?;
    let epsg = geokeys.epsg();
    if epsg.is_none() {
        warn!("[raster] GeoTIFF declares no EPSG code; assuming WGS84 lon/lat");
    }

    Ok(Raster::new(width, height, data, transform, nodata)?.with_epsg(epsg))
}

/// Build the pixel-to-coordinate transform from ModelTransformation, or
/// ModelPixelScale + ModelTiepoint.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform, RasterError> {
    if let Some(value) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = value.into_f64_vec()?;
        if m.len() < 8 {
            return Err(RasterError::Format(format!("ModelTransformation has {} values (need 16)", m.len())));
        }
        return Ok(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
    }

    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?
        .ok_or_else(|| RasterError::Format("missing ModelPixelScale tag (not a GeoTIFF?)".into()))?
        .into_f64_vec()?;
    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?
        .ok_or_else(|| RasterError::Format("missing ModelTiepoint tag (not a GeoTIFF?)".into()))?
        .into_f64_vec()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(RasterError::Format("truncated ModelPixelScale/ModelTiepoint tags".into()));
    }

    // Tiepoint maps raster (i, j) to model (x, y).
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let (sx, sy) = (scale[0], scale[1]);
    Ok(GeoTransform::north_up(x - i * sx, y + j * sy, sx, sy))
}

fn parse_nodata(text: &str) -> Result<Option<f64>, RasterError> {
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if text.is_empty() {
        return Ok(None);
    }
    match text.to_ascii_lowercase().as_str() {
        "nan" | "-nan" => Ok(Some(f64::NAN)),
        _ => text.parse::<f64>()
            .map(Some)
            .map_err(|_| RasterError::Format(format!("unparseable GDAL_NODATA value {text:?}"))),
    }
}

fn decoding_result_to_f64(result: DecodingResult) -> Result<Vec<f64>, RasterError> {
    Ok(match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => return Err(RasterError::Format("unsupported sample format".into())),
    })
}

/// The GeoKeyDirectory: a header of four shorts, then (key, location, count, value) quads.
#[derive(Debug, Default)]
struct GeoKeys(Vec<(u16, u16)>);

impl GeoKeys {
    fn parse(directory: &[u16]) -> Self {
        let keys = directory.get(4..)
            .unwrap_or_default()
            .chunks_exact(4)
            .filter(|entry| entry[1] == 0) // value stored inline
            .map(|entry| (entry[0], entry[3]))
            .collect();
        Self(keys)
    }

    fn get(&self, key: u16) -> Option<u16> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// EPSG code of the projected or geographic CRS, if declared.
    fn epsg(&self) -> Option<u32> {
        self.get(PROJECTED_CS_TYPE_GEO_KEY)
            .or_else(|| self.get(GEOGRAPHIC_TYPE_GEO_KEY))
            .filter(|&code| code != USER_DEFINED && code != 0)
            .map(u32::from)
    }
}

/// Write a raster as a 64-bit float GeoTIFF with its georeferencing and nodata tags.
pub fn write_geotiff(path: &Path, raster: &Raster) -> Result<()> {
    let mut sink = PendingWrite::open(path)?;
    {
        let mut buffer = std::io::Cursor::new(Vec::new());
        encode_geotiff(&mut buffer, raster)?;
        sink.write_all(buffer.get_ref())
            .with_context(|| format!("[raster] write {}", path.display()))?;
    }
    sink.finalize()
}

/// Encode a raster as GeoTIFF into any seekable writer.
pub fn encode_geotiff<W: Write + Seek>(writer: W, raster: &Raster) -> Result<(), RasterError> {
    let transform = raster.transform();
    if !transform.is_axis_aligned() {
        return Err(RasterError::Rotated);
    }

    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<colortype::Gray64Float>(raster.width() as u32, raster.height() as u32)?;

    let scale = [transform.pixel_width, -transform.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
    image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
    image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    let epsg = raster.epsg().and_then(|code| u16::try_from(code).ok()).unwrap_or(USER_DEFINED);
    let crs_key = if epsg == 4326 || epsg == USER_DEFINED { GEOGRAPHIC_TYPE_GEO_KEY } else { PROJECTED_CS_TYPE_GEO_KEY };
    let geokeys: [u16; 12] = [
        1, 1, 0, 2,
        GT_RASTER_TYPE_GEO_KEY, 0, 1, 1, // PixelIsArea
        crs_key, 0, 1, epsg,
    ];
    image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

    if let Some(nodata) = raster.nodata() {
        let text = if nodata.is_nan() { "nan".to_string() } else { nodata.to_string() };
        image.encoder().write_tag(Tag::GdalNodata, text.as_str())?;
    }

    image.write_data(raster.data())?;
    Ok(())
}
