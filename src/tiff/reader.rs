//! GeoTIFF reader implementation
//!
//! Reads the first IFD of a classic TIFF file and decodes its strips into
//! per-band sample vectors. Byte order is handled through the
//! [`ByteOrderHandler`] strategy detected from the header.

use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::SeekableReader;
use crate::tiff::compression::Compression;
use crate::tiff::constants::{field_types, header, planar_config, predictor, sample_format, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::geokeys;
use crate::tiff::ifd::{IFD, IFDEntry};
use crate::tiff::types::{GeoTiffImage, ImageInfo, SampleType};

/// Reader for strip-organised GeoTIFF files
pub struct TiffReader {
    /// Current byte order handler
    byte_order_handler: Option<Box<dyn ByteOrderHandler>>,
}

impl Default for TiffReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffReader {
    /// Creates a new reader
    pub fn new() -> Self {
        TiffReader { byte_order_handler: None }
    }

    fn handler(&self) -> TiffResult<&dyn ByteOrderHandler> {
        self.byte_order_handler
            .as_deref()
            .ok_or_else(|| TiffError::GenericError("Byte order not yet determined".to_string()))
    }

    /// Loads and decodes every band of the file at `path`
    ///
    /// # Arguments
    /// * `path` - Path to the GeoTIFF
    ///
    /// # Returns
    /// The decoded image with its georeferencing
    pub fn load(&mut self, path: &Path) -> TiffResult<GeoTiffImage> {
        info!("Loading GeoTIFF: {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);
        self.read(&mut reader)
    }

    /// Reads only the layout and georeferencing of the file at `path`
    pub fn load_info(&mut self, path: &Path) -> TiffResult<ImageInfo> {
        debug!("Reading GeoTIFF header: {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let ifd = self.read_first_ifd(&mut reader)?;
        self.read_info(&mut reader, &ifd)
    }

    /// Reads and decodes an image from any seekable source
    pub fn read(&mut self, reader: &mut dyn SeekableReader) -> TiffResult<GeoTiffImage> {
        let ifd = self.read_first_ifd(reader)?;
        let info = self.read_info(reader, &ifd)?;
        let bands = self.read_bands(reader, &ifd, &info)?;
        info!("Decoded {}", info);
        Ok(GeoTiffImage { info, bands })
    }

    /// Validates the header and reads the first IFD
    fn read_first_ifd(&mut self, reader: &mut dyn SeekableReader) -> TiffResult<IFD> {
        reader.seek(SeekFrom::Start(0))?;
        let order = ByteOrder::detect(reader)?;
        debug!("Byte order: {}", order.name());
        self.byte_order_handler = Some(order.create_handler());

        let handler = self.handler()?;
        let version = handler.read_u16(reader)?;
        match version {
            header::TIFF_VERSION => {}
            header::BIG_TIFF_VERSION => return Err(TiffError::BigTiffNotSupported),
            other => return Err(TiffError::UnsupportedVersion(other)),
        }

        let offset = handler.read_u32(reader)? as u64;
        let file_size = reader.seek(SeekFrom::End(0))?;
        if offset < header::HEADER_SIZE || offset >= file_size {
            return Err(TiffError::InvalidHeader);
        }
        self.read_ifd(reader, offset)
    }

    /// Reads an IFD from the reader
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    /// * `offset` - Offset in the file where the IFD starts
    ///
    /// # Returns
    /// The parsed IFD structure
    pub fn read_ifd(&self, reader: &mut dyn SeekableReader, offset: u64) -> TiffResult<IFD> {
        let handler = self.handler()?;
        reader.seek(SeekFrom::Start(offset))?;

        let entry_count = handler.read_u16(reader)?;
        let mut ifd = IFD::new(offset);
        for _ in 0..entry_count {
            let tag = handler.read_u16(reader)?;
            let field_type = handler.read_u16(reader)?;
            let count = handler.read_u32(reader)?;
            let mut raw = [0u8; 4];
            reader.read_exact(&mut raw)?;
            let value_offset = handler.u32_from(&raw);
            ifd.add_entry(IFDEntry::new(tag, field_type, count, value_offset, raw));
        }

        debug!("Read IFD with {} entries", ifd.entry_count());
        Ok(ifd)
    }

    /// Loads the raw value bytes of an entry
    fn entry_bytes(&self, reader: &mut dyn SeekableReader, entry: &IFDEntry) -> TiffResult<Vec<u8>> {
        let len = entry.byte_len().ok_or(TiffError::UnsupportedFieldType(entry.field_type))?;
        if entry.is_value_inline() {
            return Ok(entry.raw[..len].to_vec());
        }
        let mut buf = vec![0u8; len];
        reader.seek(SeekFrom::Start(entry.value_offset as u64))?;
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a numeric tag as a vector of f64
    pub fn read_numbers(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<Vec<f64>> {
        let entry = ifd.get_entry(tag).ok_or(TiffError::TagNotFound(tag))?;
        let bytes = self.entry_bytes(reader, entry)?;
        let handler = self.handler()?;

        let size = field_types::size_of(entry.field_type)
            .ok_or(TiffError::UnsupportedFieldType(entry.field_type))?;
        bytes
            .chunks_exact(size)
            .map(|chunk| match entry.field_type {
                field_types::BYTE | field_types::UNDEFINED => Ok(chunk[0] as f64),
                field_types::SBYTE => Ok(chunk[0] as i8 as f64),
                field_types::SHORT => Ok(handler.u16_from(chunk) as f64),
                field_types::SSHORT => Ok(handler.u16_from(chunk) as i16 as f64),
                field_types::LONG => Ok(handler.u32_from(chunk) as f64),
                field_types::SLONG => Ok(handler.u32_from(chunk) as i32 as f64),
                field_types::FLOAT => Ok(handler.f32_from(chunk) as f64),
                field_types::DOUBLE => Ok(handler.f64_from(chunk)),
                field_types::RATIONAL => {
                    let den = handler.u32_from(&chunk[4..]);
                    Ok(if den == 0 { 0.0 } else { handler.u32_from(chunk) as f64 / den as f64 })
                }
                other => Err(TiffError::UnsupportedFieldType(other)),
            })
            .collect()
    }

    fn read_first_number(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<Option<f64>> {
        if !ifd.has_tag(tag) {
            return Ok(None);
        }
        Ok(self.read_numbers(reader, ifd, tag)?.first().copied())
    }

    /// Reads an ASCII tag, trimming trailing NULs and whitespace
    pub fn read_ascii(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<String> {
        let entry = ifd.get_entry(tag).ok_or(TiffError::TagNotFound(tag))?;
        let bytes = self.entry_bytes(reader, entry)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.trim_end_matches('\0').trim().to_string())
    }

    /// Builds the image description from the IFD tags
    fn read_info(&self, reader: &mut dyn SeekableReader, ifd: &IFD) -> TiffResult<ImageInfo> {
        let width = self
            .read_first_number(reader, ifd, tags::IMAGE_WIDTH)?
            .ok_or(TiffError::MissingDimensions)? as u32;
        let height = self
            .read_first_number(reader, ifd, tags::IMAGE_LENGTH)?
            .ok_or(TiffError::MissingDimensions)? as u32;
        let bands = self.read_first_number(reader, ifd, tags::SAMPLES_PER_PIXEL)?.unwrap_or(1.0) as usize;
        let bits = self.read_first_number(reader, ifd, tags::BITS_PER_SAMPLE)?.unwrap_or(1.0) as u16;
        let format = self
            .read_first_number(reader, ifd, tags::SAMPLE_FORMAT)?
            .map(|v| v as u16)
            .unwrap_or(sample_format::UNSIGNED);
        let sample_type = SampleType::from_tags(format, bits)?;

        let pixel_scale = if ifd.has_tag(tags::MODEL_PIXEL_SCALE_TAG) {
            let v = self.read_numbers(reader, ifd, tags::MODEL_PIXEL_SCALE_TAG)?;
            (v.len() >= 2).then(|| [v[0], v[1], v.get(2).copied().unwrap_or(0.0)])
        } else {
            None
        };
        let tiepoint = if ifd.has_tag(tags::MODEL_TIEPOINT_TAG) {
            let v = self.read_numbers(reader, ifd, tags::MODEL_TIEPOINT_TAG)?;
            (v.len() >= 6).then(|| [v[0], v[1], v[2], v[3], v[4], v[5]])
        } else {
            None
        };
        let epsg = if ifd.has_tag(tags::GEO_KEY_DIRECTORY_TAG) {
            let dir: Vec<u16> = self
                .read_numbers(reader, ifd, tags::GEO_KEY_DIRECTORY_TAG)?
                .into_iter()
                .map(|v| v as u16)
                .collect();
            geokeys::epsg_from_directory(&dir)
        } else {
            None
        };
        let nodata = if ifd.has_tag(tags::GDAL_NODATA) {
            self.read_ascii(reader, ifd, tags::GDAL_NODATA)?.parse::<f64>().ok()
        } else {
            None
        };

        Ok(ImageInfo { width, height, bands, sample_type, pixel_scale, tiepoint, epsg, nodata })
    }

    /// Decodes all strips into per-band sample vectors
    fn read_bands(&self, reader: &mut dyn SeekableReader, ifd: &IFD, info: &ImageInfo) -> TiffResult<Vec<Vec<f32>>> {
        if ifd.is_tiled() {
            return Err(TiffError::TiledLayoutNotSupported);
        }
        let handler = self.handler()?;

        let compression = match self.read_first_number(reader, ifd, tags::COMPRESSION)? {
            Some(code) => Compression::from_code(code as u16)?,
            None => Compression::None,
        };
        let planar = self
            .read_first_number(reader, ifd, tags::PLANAR_CONFIGURATION)?
            .map(|v| v as u16)
            .unwrap_or(planar_config::CHUNKY);
        let predictor = self
            .read_first_number(reader, ifd, tags::PREDICTOR)?
            .map(|v| v as u16)
            .unwrap_or(predictor::NONE);
        if predictor != predictor::NONE
            && !(predictor == predictor::HORIZONTAL_DIFFERENCING && info.sample_type.is_integer())
        {
            return Err(TiffError::GenericError(format!("Unsupported predictor: {}", predictor)));
        }

        let width = info.width as usize;
        let height = info.height as usize;
        let rows_per_strip = self
            .read_first_number(reader, ifd, tags::ROWS_PER_STRIP)?
            .map(|v| (v as usize).min(height).max(1))
            .unwrap_or(height.max(1));
        let offsets = self.read_numbers(reader, ifd, tags::STRIP_OFFSETS)?;
        let byte_counts = self.read_numbers(reader, ifd, tags::STRIP_BYTE_COUNTS)?;

        let strips_per_band = height.div_ceil(rows_per_strip);
        let (planes, samples_per_strip_pixel) = if planar == planar_config::PLANAR {
            (info.bands, 1)
        } else {
            (1, info.bands)
        };
        let expected_strips = strips_per_band * planes;
        if offsets.len() < expected_strips || byte_counts.len() < expected_strips {
            return Err(TiffError::GenericError(format!(
                "Expected {} strips, found {} offsets and {} byte counts",
                expected_strips, offsets.len(), byte_counts.len()
            )));
        }

        let sample_bytes = info.sample_type.bytes();
        let mut bands = vec![vec![0f32; width * height]; info.bands];

        for plane in 0..planes {
            for s in 0..strips_per_band {
                let strip = plane * strips_per_band + s;
                let first_row = s * rows_per_strip;
                let rows = rows_per_strip.min(height - first_row);
                let expected = rows * width * samples_per_strip_pixel * sample_bytes;

                let mut packed = vec![0u8; byte_counts[strip] as usize];
                reader.seek(SeekFrom::Start(offsets[strip] as u64))?;
                reader.read_exact(&mut packed)?;
                let data = compression.decompress(&packed)?;
                if data.len() < expected {
                    return Err(TiffError::StripSizeMismatch { strip, expected, actual: data.len() });
                }

                let row_len = width * samples_per_strip_pixel;
                for r in 0..rows {
                    let row_bytes = &data[r * row_len * sample_bytes..(r + 1) * row_len * sample_bytes];
                    let mut values: Vec<f64> = row_bytes
                        .chunks_exact(sample_bytes)
                        .map(|c| info.sample_type.decode(c, handler))
                        .collect();
                    if predictor == predictor::HORIZONTAL_DIFFERENCING {
                        undo_horizontal_predictor(&mut values, samples_per_strip_pixel, info.sample_type);
                    }

                    let row_start = (first_row + r) * width;
                    for (i, value) in values.into_iter().enumerate() {
                        let (col, band) = if planes == 1 {
                            (i / samples_per_strip_pixel, i % samples_per_strip_pixel)
                        } else {
                            (i, plane)
                        };
                        bands[band][row_start + col] = value as f32;
                    }
                }
            }
        }

        debug!("Decoded {} strip(s) per band with {}", strips_per_band, compression.name());
        Ok(bands)
    }
}

/// Reverses TIFF predictor 2 over one row of samples
fn undo_horizontal_predictor(row: &mut [f64], stride: usize, sample_type: SampleType) {
    for i in stride..row.len() {
        let sum = row[i] as i64 + row[i - stride] as i64;
        row[i] = sample_type.wrap(sum) as f64;
    }
}
