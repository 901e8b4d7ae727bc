//! Buffering of convex polygons
//!
//! A negative buffer of a convex polygon is the intersection of its edge
//! half-planes, each moved inward by the margin. It is computed by
//! clipping the polygon against every shifted half-plane
//! (Sutherland-Hodgman). Positive distances grow the polygon with mitred
//! corners.

use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::errors::{PipelineError, PipelineResult};

/// Open ring of a polygon in counter-clockwise order
fn ccw_vertices(polygon: &Polygon<f64>) -> Vec<Coord<f64>> {
    let mut pts: Vec<Coord<f64>> = polygon.exterior().coords().copied().collect();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts.dedup();
    if signed_area(&pts) < 0.0 {
        pts.reverse();
    }
    pts
}

fn signed_area(pts: &[Coord<f64>]) -> f64 {
    let n = pts.len();
    (0..n)
        .map(|i| {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

fn cross(o: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Whether a CCW ring turns left (or goes straight) at every vertex
fn is_convex(pts: &[Coord<f64>]) -> bool {
    let n = pts.len();
    let scale = pts.iter().fold(0.0f64, |m, c| m.max(c.x.abs()).max(c.y.abs())).max(1.0);
    let tolerance = 1e-9 * scale * scale;
    (0..n).all(|i| cross(pts[i], pts[(i + 1) % n], pts[(i + 2) % n]) >= -tolerance)
}

/// Clips `subject` to the left of the directed line through `p` with direction `d`
fn clip_half_plane(subject: &[Coord<f64>], p: Coord<f64>, d: Coord<f64>) -> Vec<Coord<f64>> {
    let side = |c: Coord<f64>| d.x * (c.y - p.y) - d.y * (c.x - p.x);
    let mut out = Vec::with_capacity(subject.len() + 1);
    for i in 0..subject.len() {
        let cur = subject[i];
        let next = subject[(i + 1) % subject.len()];
        let (sc, sn) = (side(cur), side(next));
        if sc >= 0.0 {
            out.push(cur);
        }
        if (sc >= 0.0) != (sn >= 0.0) {
            let t = sc / (sc - sn);
            out.push(Coord { x: cur.x + t * (next.x - cur.x), y: cur.y + t * (next.y - cur.y) });
        }
    }
    out
}

/// Buffers one convex polygon; `None` when an inward buffer consumes it
fn buffer_polygon(polygon: &Polygon<f64>, distance: f64) -> PipelineResult<Option<Polygon<f64>>> {
    if !polygon.interiors().is_empty() {
        return Err(PipelineError::Geometry("cannot buffer a polygon with holes".to_string()));
    }
    let pts = ccw_vertices(polygon);
    if pts.len() < 3 {
        return Ok(None);
    }
    if !is_convex(&pts) {
        return Err(PipelineError::Geometry("only convex polygons can be buffered".to_string()));
    }

    let n = pts.len();
    let shifted: Vec<(Coord<f64>, Coord<f64>)> = (0..n)
        .map(|i| {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            let d = Coord { x: b.x - a.x, y: b.y - a.y };
            let len = (d.x * d.x + d.y * d.y).sqrt();
            // Left normal points into a CCW polygon
            let inward = Coord { x: -d.y / len, y: d.x / len };
            (Coord { x: a.x - inward.x * distance, y: a.y - inward.y * distance }, d)
        })
        .collect();

    let result = if distance <= 0.0 {
        let mut ring = pts.clone();
        for (p, d) in &shifted {
            ring = clip_half_plane(&ring, *p, *d);
            if ring.len() < 3 {
                return Ok(None);
            }
        }
        ring
    } else {
        // Mitre join: intersect consecutive shifted edge lines
        (0..n)
            .map(|i| {
                let (p1, d1) = shifted[(i + n - 1) % n];
                let (p2, d2) = shifted[i];
                let denom = d1.x * d2.y - d1.y * d2.x;
                if denom.abs() < f64::EPSILON {
                    p2
                } else {
                    let t = ((p2.x - p1.x) * d2.y - (p2.y - p1.y) * d2.x) / denom;
                    Coord { x: p1.x + t * d1.x, y: p1.y + t * d1.y }
                }
            })
            .collect()
    };

    if signed_area(&result).abs() <= f64::EPSILON {
        return Ok(None);
    }
    let mut ring = result;
    ring.push(ring[0]);
    Ok(Some(Polygon::new(LineString::new(ring), Vec::new())))
}

/// Buffers every part of a multipolygon by `distance` (negative shrinks)
///
/// Parts consumed by an inward buffer are dropped, so the result may be
/// empty. Non-convex parts and parts with holes are rejected.
pub fn buffer_convex(geometry: &MultiPolygon<f64>, distance: f64) -> PipelineResult<MultiPolygon<f64>> {
    let mut parts = Vec::with_capacity(geometry.0.len());
    for polygon in geometry.iter() {
        if let Some(buffered) = buffer_polygon(polygon, distance)? {
            parts.push(buffered);
        }
    }
    Ok(MultiPolygon::new(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area, BoundingRect};

    fn square(size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: size, y: 0.0), (x: size, y: size), (x: 0.0, y: size), (x: 0.0, y: 0.0),
        ]])
    }

    #[test]
    fn shrinks_square_by_margin() {
        let out = buffer_convex(&square(10_000.0), -4_000.0).unwrap();
        let rect = out.bounding_rect().unwrap();
        assert!((rect.min().x - 4_000.0).abs() < 1e-6);
        assert!((rect.max().y - 6_000.0).abs() < 1e-6);
        assert!((out.unsigned_area() - 4_000_000.0).abs() < 1e-3);
    }

    #[test]
    fn clockwise_input_is_handled() {
        let cw = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 0.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0), (x: 0.0, y: 0.0),
        ]]);
        let out = buffer_convex(&cw, -1.0).unwrap();
        assert!((out.unsigned_area() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn margin_larger_than_half_width_empties() {
        let out = buffer_convex(&square(6_000.0), -4_000.0).unwrap();
        assert!(out.0.is_empty());
    }

    #[test]
    fn skewed_quadrilateral_keeps_parallel_edges() {
        // Parallelogram like a WRS-2 footprint
        let quad = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 100.0, y: 20.0), (x: 80.0, y: 120.0), (x: -20.0, y: 100.0), (x: 0.0, y: 0.0),
        ]]);
        let shrunk = buffer_convex(&quad, -10.0).unwrap();
        assert_eq!(shrunk.0[0].exterior().0.len(), 5);
        assert!(shrunk.unsigned_area() < quad.unsigned_area());
        let grown = buffer_convex(&shrunk, 10.0).unwrap();
        assert!((grown.unsigned_area() - quad.unsigned_area()).abs() < 1e-6);
    }

    #[test]
    fn concave_polygon_is_rejected() {
        let l_shape = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0),
            (x: 1.0, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0),
        ]]);
        assert!(matches!(buffer_convex(&l_shape, -0.1), Err(PipelineError::Geometry(_))));
    }
}
