//! Row-oriented access to single-band elevation rasters.
//!
//! [`RasterSource`] opens a tile file and hands back a [`RasterDataset`] that
//! serves one raster row at a time. [`GeoTiffSource`] reads GeoTIFF tiles
//! with the `tiff` crate; [`MemoryRasterSource`] serves synthetic rasters
//! kept in memory.

use crate::{DemError, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

/// An opened raster with row access.
pub trait RasterDataset {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Number of bands (samples per pixel).
    fn band_count(&self) -> usize;

    /// No-data sentinel of a band, if the raster declares one.
    fn no_data(&self, band: usize) -> Option<f32>;

    /// Read row `y` of `band` into `out`, which must be `width()` long.
    fn read_row(&mut self, band: usize, y: u32, out: &mut [f32]) -> Result<()>;
}

/// Something that can open raster files.
pub trait RasterSource {
    /// Open the raster at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn RasterDataset>>;
}

/// Check that `band`/`y`/`out` address a valid row of a `width × height`
/// raster with `bands` bands.
fn check_row_request(
    width: u32,
    height: u32,
    bands: usize,
    band: usize,
    y: u32,
    out: &[f32],
) -> Result<()> {
    if band >= bands {
        return Err(DemError::BandOutOfRange { band, count: bands });
    }
    if y >= height {
        return Err(DemError::RowOutOfRange { row: y, height });
    }
    if out.len() != width as usize {
        return Err(DemError::RowBufferLength {
            expected: width as usize,
            actual: out.len(),
        });
    }
    Ok(())
}

/// Opens GeoTIFF tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffSource;

impl RasterSource for GeoTiffSource {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterDataset>> {
        Ok(Box::new(GeoTiffDataset::from_file(path)?))
    }
}

/// Full-width rows decoded from one row of strips or tiles.
struct ChunkRow {
    index: u32,
    /// `rows × width × bands` samples, bands interleaved.
    samples: Vec<f32>,
}

/// A GeoTIFF tile read lazily, one row of chunks (strips or tiles) at a time.
///
/// Only the chunk row holding the last requested raster row is kept in
/// memory, so rows that are never requested are never decoded.
pub struct GeoTiffDataset {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    width: u32,
    height: u32,
    bands: usize,
    chunk_width: u32,
    chunk_height: u32,
    chunks_across: u32,
    /// No-data value (elevations equal to this should be treated as missing).
    no_data_value: Option<f32>,
    current: Option<ChunkRow>,
}

impl fmt::Debug for GeoTiffDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoTiffDataset")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bands", &self.bands)
            .field("chunk", &(self.chunk_width, self.chunk_height))
            .field("no_data_value", &self.no_data_value)
            .finish()
    }
}

impl GeoTiffDataset {
    /// Open a GeoTIFF file and read its layout. No samples are decoded yet.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

        let (width, height) = decoder.dimensions()?;
        let no_data_value = Self::read_nodata_value(&mut decoder);

        let invalid = |reason: String| DemError::InvalidRaster {
            path: path.to_path_buf(),
            reason,
        };
        if decoder.find_tag_unsigned::<u16>(Tag::PlanarConfiguration)? == Some(2) {
            return Err(invalid("planar sample layout is not supported".to_string()));
        }
        let samples_per_pixel = decoder
            .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
            .unwrap_or(1);
        let bands = if width == 0 || height == 0 {
            0
        } else {
            usize::from(samples_per_pixel)
        };

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        if bands > 0 && (chunk_width == 0 || chunk_height == 0) {
            return Err(invalid(format!(
                "empty {}x{} chunks",
                chunk_width, chunk_height
            )));
        }
        let chunks_across = if chunk_width == 0 {
            0
        } else {
            width.div_ceil(chunk_width)
        };

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            width,
            height,
            bands,
            chunk_width,
            chunk_height,
            chunks_across,
            no_data_value,
            current: None,
        })
    }

    /// Read the no-data value from the GDAL_NODATA tag (42113).
    fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        decoder
            .get_tag_ascii_string(Tag::GdalNodata)
            .ok()
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse().ok())
    }

    /// Decode chunk row `index` into full-width rows.
    fn load_chunk_row(&mut self, index: u32) -> Result<ChunkRow> {
        let first_row = index * self.chunk_height;
        let rows = self.chunk_height.min(self.height - first_row) as usize;
        let row_len = self.width as usize * self.bands;
        let mut samples = vec![0.0f32; rows * row_len];

        for across in 0..self.chunks_across {
            let chunk = index * self.chunks_across + across;
            let (data_width, data_height) = self.decoder.chunk_data_dimensions(chunk);
            let decoded = samples_as_f32(self.decoder.read_chunk(chunk)?);

            let chunk_row_len = data_width as usize * self.bands;
            if chunk_row_len == 0 {
                continue;
            }
            if decoded.len() != chunk_row_len * data_height as usize {
                return Err(DemError::InvalidRaster {
                    path: self.path.clone(),
                    reason: format!(
                        "chunk {} holds {} samples, expected {}x{}x{}",
                        chunk,
                        decoded.len(),
                        data_width,
                        data_height,
                        self.bands
                    ),
                });
            }

            let x0 = (across * self.chunk_width) as usize;
            let copy_len = chunk_row_len.min(row_len - x0 * self.bands);
            for (r, src) in decoded
                .chunks_exact(chunk_row_len)
                .take(rows)
                .enumerate()
            {
                let dst = r * row_len + x0 * self.bands;
                samples[dst..dst + copy_len].copy_from_slice(&src[..copy_len]);
            }
        }

        Ok(ChunkRow { index, samples })
    }
}

/// Widen any decoded sample type to f32.
fn samples_as_f32(result: DecodingResult) -> Vec<f32> {
    fn widen<T: Copy>(data: Vec<T>, f: impl Fn(T) -> f32) -> Vec<f32> {
        data.into_iter().map(f).collect()
    }
    match result {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => widen(data, |v| v as f32),
        DecodingResult::U8(data) => widen(data, f32::from),
        DecodingResult::U16(data) => widen(data, f32::from),
        DecodingResult::U32(data) => widen(data, |v| v as f32),
        DecodingResult::U64(data) => widen(data, |v| v as f32),
        DecodingResult::I8(data) => widen(data, f32::from),
        DecodingResult::I16(data) => widen(data, f32::from),
        DecodingResult::I32(data) => widen(data, |v| v as f32),
        DecodingResult::I64(data) => widen(data, |v| v as f32),
    }
}

impl RasterDataset for GeoTiffDataset {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn band_count(&self) -> usize {
        self.bands
    }

    fn no_data(&self, _band: usize) -> Option<f32> {
        self.no_data_value
    }

    fn read_row(&mut self, band: usize, y: u32, out: &mut [f32]) -> Result<()> {
        check_row_request(self.width, self.height, self.bands, band, y, out)?;
        let index = y / self.chunk_height;
        let chunk_row = match self.current.take() {
            Some(current) if current.index == index => current,
            _ => self.load_chunk_row(index)?,
        };

        let row_len = self.width as usize * self.bands;
        let start = (y - index * self.chunk_height) as usize * row_len;
        let row = &chunk_row.samples[start..start + row_len];
        for (dst, src) in out.iter_mut().zip(row.iter().skip(band).step_by(self.bands)) {
            *dst = *src;
        }
        self.current = Some(chunk_row);
        Ok(())
    }
}

/// A single-band raster held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRaster {
    /// Samples in row-major order (north to south, west to east).
    pub data: Vec<f32>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// No-data sentinel.
    pub no_data: Option<f32>,
}

impl MemoryRaster {
    /// Raster of `width × height` samples all set to `value`.
    pub fn filled(width: u32, height: u32, value: f32, no_data: Option<f32>) -> Self {
        Self {
            data: vec![value; width as usize * height as usize],
            width,
            height,
            no_data,
        }
    }

    /// Set the sample at column `x`, row `y`.
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        self.data[y as usize * self.width as usize + x as usize] = value;
    }
}

struct MemoryDataset(MemoryRaster);

impl RasterDataset for MemoryDataset {
    fn width(&self) -> u32 {
        self.0.width
    }

    fn height(&self) -> u32 {
        self.0.height
    }

    fn band_count(&self) -> usize {
        usize::from(!self.0.data.is_empty())
    }

    fn no_data(&self, _band: usize) -> Option<f32> {
        self.0.no_data
    }

    fn read_row(&mut self, band: usize, y: u32, out: &mut [f32]) -> Result<()> {
        check_row_request(self.0.width, self.0.height, self.band_count(), band, y, out)?;
        let start = y as usize * self.0.width as usize;
        out.copy_from_slice(&self.0.data[start..start + self.0.width as usize]);
        Ok(())
    }
}

/// Serves [`MemoryRaster`]s registered by path.
///
/// Opening a path that was never registered fails with a not-found I/O
/// error, the same way a missing file would.
#[derive(Debug, Clone, Default)]
pub struct MemoryRasterSource {
    rasters: HashMap<PathBuf, MemoryRaster>,
}

impl MemoryRasterSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raster under `path`.
    pub fn insert<P: Into<PathBuf>>(&mut self, path: P, raster: MemoryRaster) {
        self.rasters.insert(path.into(), raster);
    }
}

impl RasterSource for MemoryRasterSource {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterDataset>> {
        let raster = self.rasters.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no raster registered for {}", path.display()),
            )
        })?;
        Ok(Box::new(MemoryDataset(raster)))
    }
}
