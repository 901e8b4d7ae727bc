//! Bounding box structure for defining regions

use super::geotransform::GeoTransform;
use super::point::Point;
use crate::raster::Region;

/// An axis-aligned bounding box in a coordinate system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox { min_x, min_y, max_x, max_y }
    }

    /// Smallest box enclosing all `points`, `None` when empty
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BoundingBox::new(first.x, first.y, first.x, first.y);
        for p in iter {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    /// Parse a bounding box from a string (format: "minx,miny,maxx,maxy")
    pub fn from_string(bbox_str: &str) -> Result<Self, String> {
        let parts: Vec<f64> = bbox_str
            .split(',')
            .map(|p| p.trim().parse::<f64>().map_err(|_| format!("Invalid coordinate: {}", p)))
            .collect::<Result<_, _>>()?;
        if parts.len() != 4 {
            return Err("Bounding box must have 4 comma-separated values".to_string());
        }
        Ok(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
    }

    /// Get the width of the bounding box
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Get the height of the bounding box
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Get the center point of the bounding box
    pub fn center(&self) -> Point {
        Point::new(
            self.min_x + self.width() / 2.0,
            self.min_y + self.height() / 2.0,
        )
    }

    /// Check if this bounding box contains a point (edges included)
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min_x && point.x <= self.max_x &&
            point.y >= self.min_y && point.y <= self.max_y
    }

    /// Whether the two boxes share any area or edge
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x && other.min_x <= self.max_x &&
            self.min_y <= other.max_y && other.min_y <= self.max_y
    }

    /// Convert to the pixel window of a raster covering this box
    ///
    /// The window is clamped to a `width` x `height` raster, so it may be
    /// empty when the box lies outside the grid.
    ///
    /// # Arguments
    /// * `geotransform` - Grid of the raster
    /// * `width` - Raster width in pixels
    /// * `height` - Raster height in pixels
    ///
    /// # Returns
    /// A Region in pixel coordinates
    pub fn to_pixel_region(&self, geotransform: &GeoTransform, width: u32, height: u32) -> Region {
        let (c0, r0) = geotransform.world_to_pixel(self.min_x, self.max_y);
        let (c1, r1) = geotransform.world_to_pixel(self.max_x, self.min_y);

        let col_min = c0.min(c1).floor().max(0.0) as i64;
        let row_min = r0.min(r1).floor().max(0.0) as i64;
        let col_max = (c0.max(c1).ceil() as i64).min(width as i64);
        let row_max = (r0.max(r1).ceil() as i64).min(height as i64);

        let x = col_min.min(width as i64) as u32;
        let y = row_min.min(height as i64) as u32;
        let w = (col_max - col_min).max(0) as u32;
        let h = (row_max - row_min).max(0) as u32;
        Region::new(x, y, w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_measures() {
        let bbox = BoundingBox::from_string("10, 20, 30, 60").unwrap();
        assert_eq!(bbox.width(), 20.0);
        assert_eq!(bbox.height(), 40.0);
        assert_eq!(bbox.center(), Point::new(20.0, 40.0));
        assert!(BoundingBox::from_string("1,2,3").is_err());
    }

    #[test]
    fn pixel_region_is_clamped() {
        let gt = GeoTransform::new(1000.0, 30.0, 2000.0, -30.0);
        let inside = BoundingBox::new(1030.0, 1880.0, 1090.0, 1970.0);
        let region = inside.to_pixel_region(&gt, 10, 10);
        assert_eq!((region.x, region.y, region.width, region.height), (1, 1, 2, 3));

        let overhanging = BoundingBox::new(900.0, 1500.0, 1100.0, 2100.0);
        let region = overhanging.to_pixel_region(&gt, 10, 10);
        assert_eq!((region.x, region.y, region.width, region.height), (0, 0, 4, 10));

        let outside = BoundingBox::new(5000.0, 5000.0, 6000.0, 6000.0);
        assert!(outside.to_pixel_region(&gt, 10, 10).is_empty());
    }

    #[test]
    fn envelope_of_points() {
        let bbox = BoundingBox::from_points(vec![Point::new(3.0, -1.0), Point::new(-2.0, 4.0)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(-2.0, -1.0, 3.0, 4.0));
        assert!(BoundingBox::from_points(Vec::new()).is_none());
        assert!(bbox.intersects(&BoundingBox::new(3.0, 4.0, 5.0, 5.0)));
    }
}
