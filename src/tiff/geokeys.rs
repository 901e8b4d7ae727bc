//! GeoKey directory encoding and decoding
//!
//! The GeoKeyDirectoryTag is a flat SHORT array: a four value header
//! (version, revision, minor revision, key count) followed by one
//! (key id, tag location, count, value) quadruple per key. Only keys whose
//! value is stored inline (tag location 0) are interpreted.

use log::debug;

use crate::tiff::constants::geo_keys;

/// A single GeoKey entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoKeyEntry {
    pub key_id: u16,
    pub tiff_tag_location: u16,
    pub count: u16,
    pub value_offset: u16,
}

/// Splits a GeoKey directory into its entries
pub fn parse_directory(values: &[u16]) -> Vec<GeoKeyEntry> {
    if values.len() < 4 {
        return Vec::new();
    }
    let declared = values[3] as usize;
    let entries: Vec<GeoKeyEntry> = values[4..]
        .chunks_exact(4)
        .take(declared)
        .map(|k| GeoKeyEntry {
            key_id: k[0],
            tiff_tag_location: k[1],
            count: k[2],
            value_offset: k[3],
        })
        .collect();

    debug!("GeoKey directory: version={}, keys={} (read {})", values[0], declared, entries.len());
    entries
}

/// EPSG code of the raster's CRS, projected keys taking precedence
pub fn epsg_from_directory(values: &[u16]) -> Option<u32> {
    let entries = parse_directory(values);
    let inline_value = |key: u16| {
        entries
            .iter()
            .find(|e| e.key_id == key && e.tiff_tag_location == 0)
            .map(|e| e.value_offset as u32)
            // 32767 is the GeoTIFF "user-defined" code
            .filter(|code| *code != 0 && *code != 32767)
    };
    inline_value(geo_keys::PROJECTED_CS_TYPE).or_else(|| inline_value(geo_keys::GEOGRAPHIC_TYPE))
}

/// Builds a minimal directory declaring `epsg`
///
/// Codes in the projected EPSG ranges get a ProjectedCSType key, every
/// other code a GeographicType key.
pub fn build_directory(epsg: u32) -> Vec<u16> {
    let projected = is_projected(epsg);
    let (model_type, cs_key) = if projected {
        (geo_keys::MODEL_TYPE_PROJECTED, geo_keys::PROJECTED_CS_TYPE)
    } else {
        (geo_keys::MODEL_TYPE_GEOGRAPHIC, geo_keys::GEOGRAPHIC_TYPE)
    };
    vec![
        1, 1, 0, 3,
        geo_keys::GT_MODEL_TYPE, 0, 1, model_type,
        geo_keys::GT_RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA,
        cs_key, 0, 1, epsg as u16,
    ]
}

fn is_projected(epsg: u32) -> bool {
    // Geographic 2D CRS codes live in 4000..5000
    !(4000..5000).contains(&epsg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projected_directory_roundtrips_epsg() {
        let dir = build_directory(32753);
        assert_eq!(dir.len(), 16);
        assert_eq!(epsg_from_directory(&dir), Some(32753));
    }

    #[test]
    fn geographic_directory_uses_geographic_key() {
        let dir = build_directory(4283);
        assert_eq!(dir[12], geo_keys::GEOGRAPHIC_TYPE);
        assert_eq!(epsg_from_directory(&dir), Some(4283));
    }

    #[test]
    fn user_defined_codes_are_ignored() {
        let dir = vec![1, 1, 0, 1, geo_keys::PROJECTED_CS_TYPE, 0, 1, 32767];
        assert_eq!(epsg_from_directory(&dir), None);
        assert!(parse_directory(&[1, 1]).is_empty());
    }
}
