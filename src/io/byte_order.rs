//! Byte order handling for GeoTIFF rasters
//!
//! Strategy objects that read header/IFD values and decode sample buffers
//! in either little-endian or big-endian layout. Rasters written by this
//! crate are always little-endian; both orders are accepted on read.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Result, Write};

use crate::io::seekable::SeekableReader;
use crate::tiff::errors::{TiffError, TiffResult};

/// Represents the byte order of a TIFF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian byte order (II)
    LittleEndian,
    /// Big-endian byte order (MM)
    BigEndian,
}

impl ByteOrder {
    /// Detects the byte order from the first two header bytes
    pub fn detect(reader: &mut dyn SeekableReader) -> TiffResult<Self> {
        let marker = reader.read_u16::<LittleEndian>()?;
        match marker {
            0x4949 => Ok(ByteOrder::LittleEndian),
            0x4D4D => Ok(ByteOrder::BigEndian),
            _ => Err(TiffError::InvalidByteOrder(marker)),
        }
    }

    /// Header marker bytes for this order
    pub fn marker(&self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }

    /// Returns a string representation of this byte order
    pub fn name(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "Little Endian (II)",
            ByteOrder::BigEndian => "Big Endian (MM)",
        }
    }

    /// Creates the appropriate handler for this byte order
    pub fn create_handler(&self) -> Box<dyn ByteOrderHandler> {
        match self {
            ByteOrder::LittleEndian => Box::new(LittleEndianHandler),
            ByteOrder::BigEndian => Box::new(BigEndianHandler),
        }
    }
}

/// Trait for byte order handling strategies
pub trait ByteOrderHandler: Send + Sync {
    /// Read a u16 value
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16>;

    /// Read a u32 value
    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32>;

    /// Read an f64 value
    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64>;

    /// Write a u16 value
    fn write_u16(&self, writer: &mut dyn Write, value: u16) -> Result<()>;

    /// Write a u32 value
    fn write_u32(&self, writer: &mut dyn Write, value: u32) -> Result<()>;

    /// Write an f64 value
    fn write_f64(&self, writer: &mut dyn Write, value: f64) -> Result<()>;

    /// Decode a u16 from the first two bytes of `buf`
    fn u16_from(&self, buf: &[u8]) -> u16;

    /// Decode a u32 from the first four bytes of `buf`
    fn u32_from(&self, buf: &[u8]) -> u32;

    /// Decode an f32 from the first four bytes of `buf`
    fn f32_from(&self, buf: &[u8]) -> f32;

    /// Decode an f64 from the first eight bytes of `buf`
    fn f64_from(&self, buf: &[u8]) -> f64;
}

/// Little-endian byte order handler
pub struct LittleEndianHandler;

impl ByteOrderHandler for LittleEndianHandler {
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16> {
        reader.read_u16::<LittleEndian>()
    }

    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32> {
        reader.read_u32::<LittleEndian>()
    }

    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64> {
        reader.read_f64::<LittleEndian>()
    }

    fn write_u16(&self, writer: &mut dyn Write, value: u16) -> Result<()> {
        writer.write_u16::<LittleEndian>(value)
    }

    fn write_u32(&self, writer: &mut dyn Write, value: u32) -> Result<()> {
        writer.write_u32::<LittleEndian>(value)
    }

    fn write_f64(&self, writer: &mut dyn Write, value: f64) -> Result<()> {
        writer.write_f64::<LittleEndian>(value)
    }

    fn u16_from(&self, buf: &[u8]) -> u16 {
        LittleEndian::read_u16(buf)
    }

    fn u32_from(&self, buf: &[u8]) -> u32 {
        LittleEndian::read_u32(buf)
    }

    fn f32_from(&self, buf: &[u8]) -> f32 {
        LittleEndian::read_f32(buf)
    }

    fn f64_from(&self, buf: &[u8]) -> f64 {
        LittleEndian::read_f64(buf)
    }
}

/// Big-endian byte order handler
pub struct BigEndianHandler;

impl ByteOrderHandler for BigEndianHandler {
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16> {
        reader.read_u16::<BigEndian>()
    }

    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32> {
        reader.read_u32::<BigEndian>()
    }

    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64> {
        reader.read_f64::<BigEndian>()
    }

    fn write_u16(&self, writer: &mut dyn Write, value: u16) -> Result<()> {
        writer.write_u16::<BigEndian>(value)
    }

    fn write_u32(&self, writer: &mut dyn Write, value: u32) -> Result<()> {
        writer.write_u32::<BigEndian>(value)
    }

    fn write_f64(&self, writer: &mut dyn Write, value: f64) -> Result<()> {
        writer.write_f64::<BigEndian>(value)
    }

    fn u16_from(&self, buf: &[u8]) -> u16 {
        BigEndian::read_u16(buf)
    }

    fn u32_from(&self, buf: &[u8]) -> u32 {
        BigEndian::read_u32(buf)
    }

    fn f32_from(&self, buf: &[u8]) -> f32 {
        BigEndian::read_f32(buf)
    }

    fn f64_from(&self, buf: &[u8]) -> f64 {
        BigEndian::read_f64(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn detects_both_markers() {
        let mut le = Cursor::new(b"II*\0".to_vec());
        assert_eq!(ByteOrder::detect(&mut le).unwrap(), ByteOrder::LittleEndian);

        let mut be = Cursor::new(b"MM\0*".to_vec());
        assert_eq!(ByteOrder::detect(&mut be).unwrap(), ByteOrder::BigEndian);

        let mut bad = Cursor::new(vec![0x12, 0x34]);
        assert!(matches!(ByteOrder::detect(&mut bad), Err(TiffError::InvalidByteOrder(_))));
    }

    #[test]
    fn handlers_agree_on_written_values() {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let handler = order.create_handler();
            let mut buf = Vec::new();
            handler.write_u16(&mut buf, 0xBEEF).unwrap();
            handler.write_u32(&mut buf, 42_000).unwrap();
            handler.write_f64(&mut buf, -12.5).unwrap();

            let mut cursor = Cursor::new(buf.clone());
            assert_eq!(handler.read_u16(&mut cursor).unwrap(), 0xBEEF);
            assert_eq!(handler.read_u32(&mut cursor).unwrap(), 42_000);
            assert_eq!(handler.read_f64(&mut cursor).unwrap(), -12.5);
            assert_eq!(handler.u32_from(&buf[2..6]), 42_000);
        }
    }
}
