//! Coordinate transformation functionality
//!
//! Geographic <-> transverse Mercator conversion on the GRS80/WGS 84
//! ellipsoid (the two differ by well under a millimetre at these scales).
//! GDA94 and WGS 84 datums are treated as coincident.

use super::bbox::BoundingBox;
use super::crs::CoordinateSystem;
use super::point::Point;
use crate::errors::{PipelineError, PipelineResult};

/// Transformer for converting between coordinate systems
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateTransformer;

impl CoordinateTransformer {
    /// Semi-major axis in meters
    const SEMI_MAJOR: f64 = 6378137.0;
    /// Inverse flattening (GRS80)
    const INVERSE_FLATTENING: f64 = 298.257222101;
    /// UTM central scale factor
    const K0: f64 = 0.9996;
    const FALSE_EASTING: f64 = 500000.0;
    const FALSE_NORTHING_SOUTH: f64 = 10000000.0;
    /// Samples per box edge when projecting a bounding box
    const EDGE_SAMPLES: usize = 8;

    fn eccentricity_squared() -> f64 {
        let f = 1.0 / Self::INVERSE_FLATTENING;
        f * (2.0 - f)
    }

    fn central_meridian(zone: u8) -> f64 {
        (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    /// Meridian arc length from the equator to latitude `phi` (radians)
    fn meridian_arc(phi: f64) -> f64 {
        let e2 = Self::eccentricity_squared();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        Self::SEMI_MAJOR
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }

    /// Longitude/latitude (degrees) to easting/northing in a UTM zone
    pub fn geographic_to_utm(&self, lon: f64, lat: f64, zone: u8, northern: bool) -> Point {
        let e2 = Self::eccentricity_squared();
        let ep2 = e2 / (1.0 - e2);
        let phi = lat.to_radians();
        let lambda = (lon - Self::central_meridian(zone)).to_radians();

        let sin_phi = phi.sin();
        let cos_phi = phi.cos();
        let n = Self::SEMI_MAJOR / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = phi.tan().powi(2);
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * lambda;
        let m = Self::meridian_arc(phi);

        let x = Self::K0 * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + Self::FALSE_EASTING;
        let mut y = Self::K0
            * (m + n * phi.tan()
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
        if !northern {
            y += Self::FALSE_NORTHING_SOUTH;
        }
        Point::new(x, y)
    }

    /// Easting/northing in a UTM zone to longitude/latitude (degrees)
    pub fn utm_to_geographic(&self, easting: f64, northing: f64, zone: u8, northern: bool) -> Point {
        let e2 = Self::eccentricity_squared();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);
        let x = easting - Self::FALSE_EASTING;
        let y = if northern { northing } else { northing - Self::FALSE_NORTHING_SOUTH };

        let m = y / Self::K0;
        let mu = m / (Self::SEMI_MAJOR * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin1 = phi1.sin();
        let cos1 = phi1.cos();
        let n1 = Self::SEMI_MAJOR / (1.0 - e2 * sin1 * sin1).sqrt();
        let t1 = phi1.tan().powi(2);
        let c1 = ep2 * cos1 * cos1;
        let r1 = Self::SEMI_MAJOR * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
        let d = x / (n1 * Self::K0);

        let phi = phi1
            - (n1 * phi1.tan() / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lambda = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5) / 120.0)
            / cos1;

        Point::new(Self::central_meridian(zone) + lambda.to_degrees(), phi.to_degrees())
    }

    fn to_geographic(&self, point: &Point, crs: &CoordinateSystem) -> PipelineResult<Point> {
        if crs.is_geographic() {
            return Ok(*point);
        }
        match crs.utm_zone() {
            Some((zone, north)) => Ok(self.utm_to_geographic(point.x, point.y, zone, north)),
            None => Err(unsupported(crs)),
        }
    }

    fn from_geographic(&self, point: &Point, crs: &CoordinateSystem) -> PipelineResult<Point> {
        if crs.is_geographic() {
            return Ok(*point);
        }
        match crs.utm_zone() {
            Some((zone, north)) => Ok(self.geographic_to_utm(point.x, point.y, zone, north)),
            None => Err(unsupported(crs)),
        }
    }

    /// Transform a point between coordinate systems
    pub fn transform_point(&self, point: &Point, from_crs: &CoordinateSystem, to_crs: &CoordinateSystem) -> PipelineResult<Point> {
        if from_crs == to_crs {
            return Ok(*point);
        }
        let geographic = self.to_geographic(point, from_crs)?;
        self.from_geographic(&geographic, to_crs)
    }

    /// Transform a bounding box between coordinate systems
    ///
    /// Edges are densified before projecting, so the result encloses the
    /// curved image of the source box.
    pub fn transform_bbox(&self, bbox: &BoundingBox, from_crs: &CoordinateSystem, to_crs: &CoordinateSystem) -> PipelineResult<BoundingBox> {
        if from_crs == to_crs {
            return Ok(*bbox);
        }
        let mut points = Vec::with_capacity(4 * (Self::EDGE_SAMPLES + 1));
        for i in 0..=Self::EDGE_SAMPLES {
            let t = i as f64 / Self::EDGE_SAMPLES as f64;
            let x = bbox.min_x + t * bbox.width();
            let y = bbox.min_y + t * bbox.height();
            points.push(Point::new(x, bbox.min_y));
            points.push(Point::new(x, bbox.max_y));
            points.push(Point::new(bbox.min_x, y));
            points.push(Point::new(bbox.max_x, y));
        }
        let projected = points
            .iter()
            .map(|p| self.transform_point(p, from_crs, to_crs))
            .collect::<PipelineResult<Vec<_>>>()?;
        BoundingBox::from_points(projected)
            .ok_or_else(|| PipelineError::Geometry("empty bounding box".to_string()))
    }
}

fn unsupported(crs: &CoordinateSystem) -> PipelineError {
    PipelineError::Geometry(format!("Unsupported coordinate transformation for {}", crs.description()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_meridian_maps_to_false_easting() {
        let t = CoordinateTransformer;
        let p = t.geographic_to_utm(135.0, 0.0, 53, false);
        assert!((p.x - 500000.0).abs() < 1e-6);
        assert!((p.y - 10000000.0).abs() < 1e-6);
    }

    #[test]
    fn forward_then_inverse_is_stable() {
        let t = CoordinateTransformer;
        for &(lon, lat, zone) in &[(133.87, -23.7, 53u8), (131.0, -12.4, 52), (137.9, -30.1, 54)] {
            let utm = t.geographic_to_utm(lon, lat, zone, false);
            let back = t.utm_to_geographic(utm.x, utm.y, zone, false);
            assert!((back.x - lon).abs() < 1e-6, "lon {} -> {}", lon, back.x);
            assert!((back.y - lat).abs() < 1e-6, "lat {} -> {}", lat, back.y);
        }
    }

    #[test]
    fn zone_to_zone_goes_through_geographic() {
        let t = CoordinateTransformer;
        let gda = CoordinateSystem::GDA94;
        let z53 = CoordinateSystem::UTM(53, false);
        let z52 = CoordinateSystem::UTM(52, false);
        let origin = Point::new(131.9, -20.0);
        let in53 = t.transform_point(&origin, &gda, &z53).unwrap();
        let in52 = t.transform_point(&in53, &z53, &z52).unwrap();
        let back = t.transform_point(&in52, &z52, &gda).unwrap();
        assert!(back.distance(&origin) < 1e-5);
        // 2.9 degrees east of the zone 52 meridian at 20S is roughly 303 km
        assert!((in52.x - 803_500.0).abs() < 2_000.0, "easting {}", in52.x);
    }

    #[test]
    fn other_codes_are_rejected() {
        let t = CoordinateTransformer;
        let albers = CoordinateSystem::Other(3577);
        assert!(t.transform_point(&Point::new(0.0, 0.0), &albers, &CoordinateSystem::WGS84).is_err());
        assert!(t.transform_point(&Point::new(1.0, 2.0), &albers, &albers).is_ok());
    }
}
