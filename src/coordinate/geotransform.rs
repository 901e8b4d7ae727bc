//! Affine pixel <-> world mapping of a north-up raster grid

use super::bbox::BoundingBox;

/// North-up geotransform (no rotation terms)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X of the top-left corner of the top-left pixel
    pub origin_x: f64,
    /// Pixel size along X
    pub pixel_width: f64,
    /// Y of the top-left corner of the top-left pixel
    pub origin_y: f64,
    /// Pixel size along Y, negative for north-up grids
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Tolerance used when comparing grids, in map units
    const GRID_EPSILON: f64 = 1e-6;

    pub fn new(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        GeoTransform { origin_x, pixel_width, origin_y, pixel_height }
    }

    /// Builds the transform from GeoTIFF ModelTiepoint and ModelPixelScale
    pub fn from_tiepoint(tiepoint: &[f64; 6], scale: &[f64; 3]) -> Self {
        GeoTransform {
            origin_x: tiepoint[3] - tiepoint[0] * scale[0],
            pixel_width: scale[0],
            origin_y: tiepoint[4] + tiepoint[1] * scale[1],
            pixel_height: -scale[1],
        }
    }

    /// GeoTIFF (tiepoint, pixel scale) pair describing this transform
    pub fn to_tiepoint(&self) -> ([f64; 6], [f64; 3]) {
        (
            [0.0, 0.0, 0.0, self.origin_x, self.origin_y, 0.0],
            [self.pixel_width, -self.pixel_height, 0.0],
        )
    }

    /// GDAL-ordered coefficient array
    pub fn to_array(&self) -> [f64; 6] {
        [self.origin_x, self.pixel_width, 0.0, self.origin_y, 0.0, self.pixel_height]
    }

    /// Fractional pixel coordinates (column, row) of a world position
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.origin_x) / self.pixel_width, (y - self.origin_y) / self.pixel_height)
    }

    /// World coordinates of the centre of pixel (col, row)
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Footprint of a `width` x `height` grid
    pub fn bounds(&self, width: u32, height: u32) -> BoundingBox {
        let x1 = self.origin_x + width as f64 * self.pixel_width;
        let y1 = self.origin_y + height as f64 * self.pixel_height;
        BoundingBox::new(
            self.origin_x.min(x1),
            self.origin_y.min(y1),
            self.origin_x.max(x1),
            self.origin_y.max(y1),
        )
    }

    /// Whether both transforms describe the same grid
    pub fn same_grid(&self, other: &GeoTransform) -> bool {
        (self.origin_x - other.origin_x).abs() < Self::GRID_EPSILON
            && (self.origin_y - other.origin_y).abs() < Self::GRID_EPSILON
            && (self.pixel_width - other.pixel_width).abs() < Self::GRID_EPSILON
            && (self.pixel_height - other.pixel_height).abs() < Self::GRID_EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiepoint_conversion_is_reversible() {
        let gt = GeoTransform::from_tiepoint(&[0.0, 0.0, 0.0, 600000.0, 7100000.0, 0.0], &[30.0, 30.0, 0.0]);
        assert_eq!(gt, GeoTransform::new(600000.0, 30.0, 7100000.0, -30.0));
        let (tp, scale) = gt.to_tiepoint();
        assert!(GeoTransform::from_tiepoint(&tp, &scale).same_grid(&gt));
    }

    #[test]
    fn pixel_centres_and_bounds() {
        let gt = GeoTransform::new(100.0, 10.0, 500.0, -10.0);
        assert_eq!(gt.pixel_center(0, 0), (105.0, 495.0));
        assert_eq!(gt.world_to_pixel(125.0, 465.0), (2.5, 3.5));
        assert_eq!(gt.bounds(4, 3), BoundingBox::new(100.0, 470.0, 140.0, 500.0));
    }
}
