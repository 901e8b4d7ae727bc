//! GeoJSON reading and writing for polygon layers

use geo::{Coord, LineString, MultiPolygon, Polygon};
use log::{info, warn};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

use super::{AttributeValue, Feature, Layer};
use crate::coordinate::{CoordinateSystem, CoordinateSystemFactory};
use crate::errors::{PipelineError, PipelineResult};

/// Reads a FeatureCollection of Polygon / MultiPolygon features
///
/// The CRS comes from the legacy `crs` member when present; RFC 7946
/// files without one are taken as WGS 84. Features with another geometry
/// type or no geometry are skipped with a warning.
pub fn read_geojson(path: &Path) -> PipelineResult<Layer> {
    let text = fs::read_to_string(path)?;
    let doc: Value = serde_json::from_str(&text)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layer".to_string());

    if doc.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(PipelineError::InvalidInput(format!("{} is not a GeoJSON FeatureCollection", path.display())));
    }

    let crs = match doc.pointer("/crs/properties/name").and_then(Value::as_str) {
        Some(crs_name) => CoordinateSystemFactory::from_ogc_name(crs_name)?,
        None => CoordinateSystem::WGS84,
    };

    let mut layer = Layer::new(name, crs);
    let features = doc.get("features").and_then(Value::as_array).cloned().unwrap_or_default();
    for (index, raw) in features.iter().enumerate() {
        let geometry = match raw.get("geometry").filter(|g| !g.is_null()) {
            Some(g) => parse_geometry(g),
            None => None,
        };
        let Some(geometry) = geometry else {
            warn!("{}: feature {} has no polygon geometry, skipped", path.display(), index);
            continue;
        };
        let mut feature = Feature::new(geometry);
        if let Some(props) = raw.get("properties").and_then(Value::as_object) {
            for (key, value) in props {
                feature.set_property(key.clone(), to_attribute(value));
            }
        }
        layer.features.push(feature);
    }

    info!("Read {} feature(s) from {} ({})", layer.len(), path.display(), layer.crs);
    Ok(layer)
}

/// Writes `layer` as a FeatureCollection with a named-CRS member
pub fn write_geojson(layer: &Layer, path: &Path) -> PipelineResult<()> {
    let features: Vec<Value> = layer
        .features
        .iter()
        .map(|f| {
            let mut keys: Vec<&String> = f.properties.keys().collect();
            keys.sort();
            let props: Map<String, Value> = keys
                .into_iter()
                .map(|k| (k.clone(), from_attribute(&f.properties[k])))
                .collect();
            json!({
                "type": "Feature",
                "properties": props,
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": f.geometry.iter().map(polygon_coordinates).collect::<Vec<_>>(),
                },
            })
        })
        .collect();

    let doc = json!({
        "type": "FeatureCollection",
        "name": layer.name,
        "crs": {
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", layer.crs.epsg_code()) },
        },
        "features": features,
    });
    fs::write(path, serde_json::to_string_pretty(&doc)?)?;
    info!("Wrote {} feature(s) to {}", layer.len(), path.display());
    Ok(())
}

fn parse_ring(value: &Value) -> Option<LineString<f64>> {
    let coords = value
        .as_array()?
        .iter()
        .map(|pos| {
            let pos = pos.as_array()?;
            Some(Coord { x: pos.first()?.as_f64()?, y: pos.get(1)?.as_f64()? })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::new(coords))
}

fn parse_polygon(value: &Value) -> Option<Polygon<f64>> {
    let mut rings = value.as_array()?.iter().map(parse_ring).collect::<Option<Vec<_>>>()?.into_iter();
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

fn parse_geometry(geometry: &Value) -> Option<MultiPolygon<f64>> {
    let coords = geometry.get("coordinates")?;
    match geometry.get("type")?.as_str()? {
        "Polygon" => Some(MultiPolygon::new(vec![parse_polygon(coords)?])),
        "MultiPolygon" => coords
            .as_array()?
            .iter()
            .map(parse_polygon)
            .collect::<Option<Vec<_>>>()
            .map(MultiPolygon::new),
        _ => None,
    }
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> Value {
    let ring = |ls: &LineString<f64>| -> Value {
        Value::Array(ls.coords().map(|c| json!([c.x, c.y])).collect())
    };
    let mut rings = vec![ring(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring));
    Value::Array(rings)
}

fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => AttributeValue::String(s.clone()),
        other => AttributeValue::String(other.to_string()),
    }
}

fn from_attribute(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => json!(b),
        AttributeValue::Int(i) => json!(i),
        AttributeValue::Float(f) => json!(f),
        AttributeValue::String(s) => json!(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::test_support::square;

    #[test]
    fn reads_polygons_and_skips_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.geojson");
        fs::write(
            &path,
            r#"{
              "type": "FeatureCollection",
              "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::4283"}},
              "features": [
                {"type": "Feature", "properties": {"site_name": "alpha", "uid": 1},
                 "geometry": {"type": "Polygon", "coordinates": [[[133.0,-23.0],[133.001,-23.0],[133.001,-22.999],[133.0,-23.0]]]}},
                {"type": "Feature", "properties": {"site_name": "pt"},
                 "geometry": {"type": "Point", "coordinates": [133.0,-23.0]}}
              ]
            }"#,
        )
        .unwrap();

        let layer = read_geojson(&path).unwrap();
        assert_eq!(layer.name, "sites");
        assert_eq!(layer.crs, CoordinateSystem::GDA94);
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.features[0].get_property("uid"), Some(&AttributeValue::Int(1)));
    }

    #[test]
    fn written_layer_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.geojson");
        let mut layer = Layer::new("tiles", CoordinateSystem::UTM(53, false));
        layer.features.push(square(0.0, 0.0, 10.0, &[("WRSPR", AttributeValue::Int(104073))]));
        write_geojson(&layer, &path).unwrap();

        let back = read_geojson(&path).unwrap();
        assert_eq!(back.crs, layer.crs);
        assert_eq!(back.features[0].geometry, layer.features[0].geometry);
        assert_eq!(back.features[0].get_property("WRSPR"), Some(&AttributeValue::Int(104073)));
    }

    #[test]
    fn rejects_other_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.geojson");
        fs::write(&path, r#"{"type": "Feature"}"#).unwrap();
        assert!(read_geojson(&path).is_err());
    }
}
