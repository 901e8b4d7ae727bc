//! Core GeoTIFF data structures

use std::fmt;

use crate::io::byte_order::ByteOrderHandler;
use crate::tiff::constants::sample_format;
use crate::tiff::errors::{TiffError, TiffResult};

/// Numeric type of one raster sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl SampleType {
    /// Maps the SampleFormat / BitsPerSample tag pair to a sample type
    pub fn from_tags(format: u16, bits: u16) -> TiffResult<Self> {
        match (format, bits) {
            (sample_format::UNSIGNED, 8) => Ok(SampleType::U8),
            (sample_format::UNSIGNED, 16) => Ok(SampleType::U16),
            (sample_format::UNSIGNED, 32) => Ok(SampleType::U32),
            (sample_format::SIGNED, 16) => Ok(SampleType::I16),
            (sample_format::SIGNED, 32) => Ok(SampleType::I32),
            (sample_format::IEEEFP, 32) => Ok(SampleType::F32),
            (sample_format::IEEEFP, 64) => Ok(SampleType::F64),
            _ => Err(TiffError::UnsupportedSampleType(format, bits)),
        }
    }

    /// Parses a lowercase type name (`uint8`, `int16`, `float32`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "uint8" => Some(SampleType::U8),
            "int16" => Some(SampleType::I16),
            "uint16" => Some(SampleType::U16),
            "int32" => Some(SampleType::I32),
            "uint32" => Some(SampleType::U32),
            "float32" => Some(SampleType::F32),
            "float64" => Some(SampleType::F64),
            _ => None,
        }
    }

    /// Value written into the SampleFormat tag
    pub fn format(&self) -> u16 {
        match self {
            SampleType::U8 | SampleType::U16 | SampleType::U32 => sample_format::UNSIGNED,
            SampleType::I16 | SampleType::I32 => sample_format::SIGNED,
            SampleType::F32 | SampleType::F64 => sample_format::IEEEFP,
        }
    }

    /// Bits per sample
    pub fn bits(&self) -> u16 {
        (self.bytes() * 8) as u16
    }

    /// Bytes per sample
    pub fn bytes(&self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::I16 | SampleType::U16 => 2,
            SampleType::I32 | SampleType::U32 | SampleType::F32 => 4,
            SampleType::F64 => 8,
        }
    }

    /// Whether the type is an integer type
    pub fn is_integer(&self) -> bool {
        !matches!(self, SampleType::F32 | SampleType::F64)
    }

    /// Decodes one sample from `buf` in the file's byte order
    pub fn decode(&self, buf: &[u8], handler: &dyn ByteOrderHandler) -> f64 {
        match self {
            SampleType::U8 => buf[0] as f64,
            SampleType::I16 => handler.u16_from(buf) as i16 as f64,
            SampleType::U16 => handler.u16_from(buf) as f64,
            SampleType::I32 => handler.u32_from(buf) as i32 as f64,
            SampleType::U32 => handler.u32_from(buf) as f64,
            SampleType::F32 => handler.f32_from(buf) as f64,
            SampleType::F64 => handler.f64_from(buf),
        }
    }

    /// Appends `value` as a little-endian sample
    ///
    /// Integer targets round and saturate; NaN becomes zero.
    pub fn encode_le(&self, value: f64, out: &mut Vec<u8>) {
        match self {
            SampleType::U8 => out.push(value.round() as u8),
            SampleType::I16 => out.extend_from_slice(&(value.round() as i16).to_le_bytes()),
            SampleType::U16 => out.extend_from_slice(&(value.round() as u16).to_le_bytes()),
            SampleType::I32 => out.extend_from_slice(&(value.round() as i32).to_le_bytes()),
            SampleType::U32 => out.extend_from_slice(&(value.round() as u32).to_le_bytes()),
            SampleType::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            SampleType::F64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// Wraps an integer sum back into the type's range (horizontal predictor)
    pub fn wrap(&self, value: i64) -> i64 {
        match self {
            SampleType::U8 => value as u8 as i64,
            SampleType::I16 => value as i16 as i64,
            SampleType::U16 => value as u16 as i64,
            SampleType::I32 => value as i32 as i64,
            SampleType::U32 => value as u32 as i64,
            SampleType::F32 | SampleType::F64 => value,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::U8 => "uint8",
            SampleType::I16 => "int16",
            SampleType::U16 => "uint16",
            SampleType::I32 => "int32",
            SampleType::U32 => "uint32",
            SampleType::F32 => "float32",
            SampleType::F64 => "float64",
        };
        write!(f, "{}", name)
    }
}

/// Georeferencing and layout of a GeoTIFF image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of bands (samples per pixel)
    pub bands: usize,
    /// Sample type shared by all bands
    pub sample_type: SampleType,
    /// ModelPixelScale (sx, sy, sz)
    pub pixel_scale: Option<[f64; 3]>,
    /// ModelTiepoint (i, j, k, x, y, z)
    pub tiepoint: Option<[f64; 6]>,
    /// EPSG code from ProjectedCSType or GeographicType
    pub epsg: Option<u32>,
    /// GDAL no-data value
    pub nodata: Option<f64>,
}

/// A decoded GeoTIFF image with one sample vector per band
#[derive(Debug, Clone)]
pub struct GeoTiffImage {
    /// Layout and georeferencing
    pub info: ImageInfo,
    /// Row-major samples, `bands[b][row * width + col]`
    pub bands: Vec<Vec<f32>>,
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} x{} {}", self.width, self.height, self.bands, self.sample_type)?;
        if let Some(epsg) = self.epsg {
            write!(f, " EPSG:{}", epsg)?;
        }
        if let Some(nodata) = self.nodata {
            write!(f, " nodata={}", nodata)?;
        }
        Ok(())
    }
}
