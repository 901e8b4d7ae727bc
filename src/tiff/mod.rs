//! GeoTIFF raster codec
//!
//! This module provides structures and functions for reading and writing
//! single-image, strip-organised GeoTIFF files: the format of every
//! surface-reflectance scene, composite, fire-scar and mask raster the
//! pipeline touches.

pub mod errors;
pub mod ifd;
pub mod types;
pub mod reader;
pub mod writer;
pub mod compression;
pub(crate) mod constants;
pub mod geokeys;

pub use crate::io::byte_order::{BigEndianHandler, ByteOrder, ByteOrderHandler, LittleEndianHandler};
pub use compression::Compression;
pub use errors::{TiffError, TiffResult};
pub use ifd::{IFD, IFDEntry};
pub use reader::TiffReader;
pub use types::{GeoTiffImage, ImageInfo, SampleType};
pub use writer::TiffWriter;
