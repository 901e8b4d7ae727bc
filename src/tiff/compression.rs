//! Strip compression codecs
//!
//! Rasters are read with any of the codecs below and written with the one
//! selected in the pipeline configuration.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::debug;
use serde::Deserialize;

use crate::tiff::constants::compression as codes;
use crate::tiff::errors::{TiffError, TiffResult};

/// Compression scheme of a strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Uncompressed (code 1)
    None,
    /// Zlib/Deflate (code 8, also read from the legacy 32946)
    Deflate,
    /// Zstandard (code 14)
    Zstd,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Deflate
    }
}

impl Compression {
    /// Zstandard level used when writing
    const ZSTD_LEVEL: i32 = 3;

    /// Maps a TIFF compression code to a codec
    pub fn from_code(code: u16) -> TiffResult<Self> {
        match code {
            codes::NONE => Ok(Compression::None),
            codes::DEFLATE | codes::ADOBE_DEFLATE => Ok(Compression::Deflate),
            codes::ZSTD => Ok(Compression::Zstd),
            other => Err(TiffError::UnsupportedCompression(other as u64)),
        }
    }

    /// Parses a codec name as given on the command line
    pub fn from_name(name: &str) -> TiffResult<Self> {
        match name.to_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Compression::None),
            "deflate" | "zip" => Ok(Compression::Deflate),
            "zstd" => Ok(Compression::Zstd),
            _ => Err(TiffError::GenericError(format!("Unknown compression type: {}", name))),
        }
    }

    /// TIFF code written into the Compression tag
    pub fn code(&self) -> u16 {
        match self {
            Compression::None => codes::NONE,
            Compression::Deflate => codes::DEFLATE,
            Compression::Zstd => codes::ZSTD,
        }
    }

    /// Human readable codec name
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "Uncompressed",
            Compression::Deflate => "Deflate",
            Compression::Zstd => "ZSTD",
        }
    }

    /// Decompress one strip
    pub fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Deflate => {
                let mut decoder = ZlibDecoder::new(data);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            Compression::Zstd => {
                if data.is_empty() {
                    return Ok(Vec::new());
                }
                zstd::decode_all(data)
                    .map_err(|e| TiffError::GenericError(format!("ZSTD decompression error: {}", e)))
            }
        }
    }

    /// Compress one strip
    pub fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let out = match self {
            Compression::None => data.to_vec(),
            Compression::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                encoder.finish()?
            }
            Compression::Zstd => zstd::encode_all(data, Self::ZSTD_LEVEL)
                .map_err(|e| TiffError::GenericError(format!("ZSTD compression error: {}", e)))?,
        };
        debug!("{} strip: {} -> {} bytes", self.name(), data.len(), out.len());
        Ok(out)
    }
}
