//! Coordinate handling for geospatial data
//!
//! Points, boxes, raster grids and the CRS identifiers the pipeline
//! reprojects between (geographic WGS 84 / GDA94 and UTM / MGA zones).

mod bbox;
mod geotransform;
mod point;
mod transform;
mod crs;

// Re-export key types
pub use self::bbox::BoundingBox;
pub use self::geotransform::GeoTransform;
pub use self::point::Point;
pub use self::transform::CoordinateTransformer;
pub use self::crs::{CoordinateSystem, CoordinateSystemFactory};
