//! GeoTIFF writer
//!
//! Produces little-endian, band-sequential (planar) strip TIFFs. The byte
//! layout is fully determined by the image and the codec: header, the
//! single IFD, out-of-line tag values, then the strips in band order.

use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::tiff::compression::Compression;
use crate::tiff::constants::{field_types, header, photometric, planar_config, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::geokeys;
use crate::tiff::types::GeoTiffImage;

/// Rows packed into one strip
const ROWS_PER_STRIP: usize = 256;

/// A tag waiting to be laid out
struct PendingEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    data: Vec<u8>,
}

impl PendingEntry {
    fn shorts(tag: u16, values: &[u16]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        PendingEntry { tag, field_type: field_types::SHORT, count: values.len() as u32, data }
    }

    fn longs(tag: u16, values: &[u32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        PendingEntry { tag, field_type: field_types::LONG, count: values.len() as u32, data }
    }

    fn doubles(tag: u16, values: &[f64]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        PendingEntry { tag, field_type: field_types::DOUBLE, count: values.len() as u32, data }
    }

    fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        PendingEntry { tag, field_type: field_types::ASCII, count: data.len() as u32, data }
    }

    fn is_inline(&self) -> bool {
        self.data.len() <= 4
    }
}

/// Writer for GeoTIFF rasters
pub struct TiffWriter {
    compression: Compression,
    handler: Box<dyn ByteOrderHandler>,
}

impl TiffWriter {
    /// Creates a writer that compresses strips with `compression`
    pub fn new(compression: Compression) -> Self {
        TiffWriter {
            compression,
            handler: ByteOrder::LittleEndian.create_handler(),
        }
    }

    /// Writes `image` to `path`
    pub fn write(&self, image: &GeoTiffImage, path: &Path) -> TiffResult<()> {
        let bytes = self.encode(image)?;
        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(1024 * 1024, file);
        writer.write_all(&bytes)?;
        writer.flush()?;
        info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Encodes `image` into a complete TIFF byte stream
    ///
    /// # Arguments
    /// * `image` - Image whose bands all hold `width * height` samples
    ///
    /// # Returns
    /// The file content
    pub fn encode(&self, image: &GeoTiffImage) -> TiffResult<Vec<u8>> {
        let info = &image.info;
        let width = info.width as usize;
        let height = info.height as usize;
        if image.bands.is_empty() || width == 0 || height == 0 {
            return Err(TiffError::MissingDimensions);
        }
        if let Some(bad) = image.bands.iter().position(|b| b.len() != width * height) {
            return Err(TiffError::GenericError(format!(
                "Band {} holds {} samples, expected {}",
                bad + 1, image.bands[bad].len(), width * height
            )));
        }

        let strips = self.encode_strips(image)?;
        let strip_count = strips.len();
        let band_count = image.bands.len();

        let mut entries = vec![
            PendingEntry::longs(tags::IMAGE_WIDTH, &[info.width]),
            PendingEntry::longs(tags::IMAGE_LENGTH, &[info.height]),
            PendingEntry::shorts(tags::BITS_PER_SAMPLE, &vec![info.sample_type.bits(); band_count]),
            PendingEntry::shorts(tags::COMPRESSION, &[self.compression.code()]),
            PendingEntry::shorts(tags::PHOTOMETRIC_INTERPRETATION, &[photometric::BLACK_IS_ZERO]),
            PendingEntry::longs(tags::STRIP_OFFSETS, &vec![0; strip_count]),
            PendingEntry::shorts(tags::SAMPLES_PER_PIXEL, &[band_count as u16]),
            PendingEntry::longs(tags::ROWS_PER_STRIP, &[ROWS_PER_STRIP.min(height) as u32]),
            PendingEntry::longs(
                tags::STRIP_BYTE_COUNTS,
                &strips.iter().map(|s| s.len() as u32).collect::<Vec<_>>(),
            ),
            PendingEntry::shorts(tags::PLANAR_CONFIGURATION, &[planar_config::PLANAR]),
            PendingEntry::shorts(tags::SAMPLE_FORMAT, &vec![info.sample_type.format(); band_count]),
        ];
        if let Some(scale) = info.pixel_scale {
            entries.push(PendingEntry::doubles(tags::MODEL_PIXEL_SCALE_TAG, &scale));
        }
        if let Some(tiepoint) = info.tiepoint {
            entries.push(PendingEntry::doubles(tags::MODEL_TIEPOINT_TAG, &tiepoint));
        }
        if let Some(epsg) = info.epsg {
            entries.push(PendingEntry::shorts(tags::GEO_KEY_DIRECTORY_TAG, &geokeys::build_directory(epsg)));
        }
        if let Some(nodata) = info.nodata {
            entries.push(PendingEntry::ascii(tags::GDAL_NODATA, &format_nodata(nodata)));
        }
        entries.sort_by_key(|e| e.tag);

        // Offsets: IFD right after the header, then out-of-line values, then strips
        let ifd_size = 2 + 12 * entries.len() as u64 + 4;
        let mut cursor = header::HEADER_SIZE + ifd_size;
        let mut value_offsets = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.is_inline() {
                value_offsets.push(None);
            } else {
                value_offsets.push(Some(cursor));
                cursor += word_aligned(entry.data.len() as u64);
            }
        }
        let mut strip_offsets = Vec::with_capacity(strip_count);
        for strip in &strips {
            strip_offsets.push(cursor as u32);
            cursor += word_aligned(strip.len() as u64);
        }
        if cursor > u32::MAX as u64 {
            return Err(TiffError::BigTiffNotSupported);
        }
        if let Some(entry) = entries.iter_mut().find(|e| e.tag == tags::STRIP_OFFSETS) {
            entry.data = strip_offsets.iter().flat_map(|v| v.to_le_bytes()).collect();
        }

        let mut out: Vec<u8> = Vec::with_capacity(cursor as usize);
        out.extend_from_slice(&ByteOrder::LittleEndian.marker());
        self.handler.write_u16(&mut out, header::TIFF_VERSION)?;
        self.handler.write_u32(&mut out, header::HEADER_SIZE as u32)?;

        self.handler.write_u16(&mut out, entries.len() as u16)?;
        for (entry, offset) in entries.iter().zip(&value_offsets) {
            self.handler.write_u16(&mut out, entry.tag)?;
            self.handler.write_u16(&mut out, entry.field_type)?;
            self.handler.write_u32(&mut out, entry.count)?;
            match offset {
                Some(offset) => self.handler.write_u32(&mut out, *offset as u32)?,
                None => {
                    let mut raw = [0u8; 4];
                    raw[..entry.data.len()].copy_from_slice(&entry.data);
                    out.extend_from_slice(&raw);
                }
            }
        }
        self.handler.write_u32(&mut out, 0)?;

        for entry in entries.iter().filter(|e| !e.is_inline()) {
            out.extend_from_slice(&entry.data);
            pad_to_word(&mut out);
        }
        for strip in &strips {
            out.extend_from_slice(strip);
            pad_to_word(&mut out);
        }

        debug!("Encoded {} strip(s) with {}", strip_count, self.compression.name());
        Ok(out)
    }

    /// Serialises and compresses every strip, band by band
    fn encode_strips(&self, image: &GeoTiffImage) -> TiffResult<Vec<Vec<u8>>> {
        let width = image.info.width as usize;
        let sample_type = image.info.sample_type;
        let mut strips = Vec::new();
        for band in &image.bands {
            for rows in band.chunks(width * ROWS_PER_STRIP) {
                let mut raw = Vec::with_capacity(rows.len() * sample_type.bytes());
                for value in rows {
                    sample_type.encode_le(*value as f64, &mut raw);
                }
                strips.push(self.compression.compress(&raw)?);
            }
        }
        Ok(strips)
    }
}

fn word_aligned(len: u64) -> u64 {
    len + (len & 1)
}

fn pad_to_word(out: &mut Vec<u8>) {
    if out.len() % 2 == 1 {
        out.push(0);
    }
}

/// Formats a no-data value the way GDAL stores it
fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", value)
    }
}
