//! Polygon vector layers
//!
//! Site plots and tile footprints are polygon layers with an attribute
//! table. Layers are read from and written to GeoJSON; attribute columns
//! are accessed by name.

mod buffer;
mod geojson;

pub use buffer::buffer_convex;
pub use geojson::{read_geojson, write_geojson};

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::coordinate::{CoordinateSystem, CoordinateTransformer, Point};
use crate::errors::{PipelineError, PipelineResult};

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Integer view; integral floats and numeric strings convert
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            AttributeValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// A polygon feature with attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: MultiPolygon<f64>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a new feature with geometry and no attributes
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Feature { geometry, properties: HashMap::new() }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key).filter(|v| !v.is_null())
    }
}

/// A named polygon layer in one CRS
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub crs: CoordinateSystem,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>, crs: CoordinateSystem) -> Self {
        Layer { name: name.into(), crs, features: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Fails with `MissingColumn` unless every feature carries `column`
    pub fn require_column(&self, column: &str) -> PipelineResult<()> {
        if self.features.iter().all(|f| f.get_property(column).is_some()) {
            Ok(())
        } else {
            Err(PipelineError::MissingColumn { layer: self.name.clone(), column: column.to_string() })
        }
    }

    /// Copy of the layer with every vertex transformed into `to`
    pub fn reproject(&self, to: CoordinateSystem) -> PipelineResult<Layer> {
        if self.crs == to {
            return Ok(self.clone());
        }
        let transformer = CoordinateTransformer;
        let project_ring = |ring: &LineString<f64>| -> PipelineResult<LineString<f64>> {
            ring.coords()
                .map(|c| {
                    transformer
                        .transform_point(&Point::from(*c), &self.crs, &to)
                        .map(Coord::from)
                })
                .collect::<PipelineResult<Vec<_>>>()
                .map(LineString::new)
        };

        let mut features = Vec::with_capacity(self.features.len());
        for feature in &self.features {
            let polygons = feature
                .geometry
                .iter()
                .map(|poly| {
                    let exterior = project_ring(poly.exterior())?;
                    let interiors = poly.interiors().iter().map(&project_ring).collect::<PipelineResult<Vec<_>>>()?;
                    Ok(Polygon::new(exterior, interiors))
                })
                .collect::<PipelineResult<Vec<_>>>()?;
            features.push(Feature { geometry: MultiPolygon::new(polygons), properties: feature.properties.clone() });
        }
        Ok(Layer { name: self.name.clone(), crs: to, features })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use geo::polygon;

    /// Axis-aligned square feature with the given attributes
    pub fn square(min_x: f64, min_y: f64, size: f64, attrs: &[(&str, AttributeValue)]) -> Feature {
        let poly = polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
            (x: min_x, y: min_y),
        ];
        let mut feature = Feature::new(MultiPolygon::new(vec![poly]));
        for (k, v) in attrs {
            feature.set_property(*k, v.clone());
        }
        feature
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::square;
    use super::*;
    use geo::BoundingRect;

    #[test]
    fn attribute_conversions() {
        assert_eq!(AttributeValue::Float(12.0).as_i64(), Some(12));
        assert_eq!(AttributeValue::Float(12.5).as_i64(), None);
        assert_eq!(AttributeValue::String(" 7 ".into()).as_i64(), Some(7));
        assert_eq!(AttributeValue::String("site_a".into()).to_string(), "site_a");
    }

    #[test]
    fn missing_column_is_reported() {
        let mut layer = Layer::new("sites", CoordinateSystem::GDA94);
        layer.features.push(square(0.0, 0.0, 1.0, &[("site_name", AttributeValue::String("a".into()))]));
        layer.features.push(square(2.0, 0.0, 1.0, &[("site_name", AttributeValue::Null)]));
        assert!(layer.require_column("uid").is_err());
        match layer.require_column("site_name") {
            Err(PipelineError::MissingColumn { layer, column }) => {
                assert_eq!(layer, "sites");
                assert_eq!(column, "site_name");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn reprojection_moves_vertices() {
        let mut layer = Layer::new("sites", CoordinateSystem::GDA94);
        layer.features.push(square(134.99, -20.01, 0.02, &[]));
        let utm = layer.reproject(CoordinateSystem::UTM(53, false)).unwrap();
        let rect = utm.features[0].geometry.bounding_rect().unwrap();
        assert!(rect.min().x < 500000.0 && rect.max().x > 500000.0);
        assert!(rect.width() > 2000.0 && rect.width() < 2200.0);
        assert_eq!(utm.crs, CoordinateSystem::UTM(53, false));
    }
}
