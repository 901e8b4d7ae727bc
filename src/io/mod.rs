//! Low-level I/O helpers shared by the GeoTIFF codec

pub mod seekable;
pub mod byte_order;
