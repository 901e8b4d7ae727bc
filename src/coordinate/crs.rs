//! Coordinate Reference System handling

use std::fmt;

use crate::errors::{PipelineError, PipelineResult};

/// Identifier for the coordinate systems the pipeline can reproject between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSystem {
    /// WGS 84 geographic (EPSG:4326)
    WGS84,
    /// GDA94 geographic (EPSG:4283)
    GDA94,
    /// WGS 84 / UTM zone (EPSG:326xx north, 327xx south)
    UTM(u8, bool),
    /// GDA94 / MGA zone (EPSG:283xx, southern hemisphere)
    MGA(u8),
    /// Any other EPSG code; carried through but never reprojected
    Other(u32),
}

impl CoordinateSystem {
    /// Get the EPSG code for this coordinate system
    pub fn epsg_code(&self) -> u32 {
        match self {
            CoordinateSystem::WGS84 => 4326,
            CoordinateSystem::GDA94 => 4283,
            CoordinateSystem::UTM(zone, is_northern) => {
                if *is_northern {
                    32600 + *zone as u32
                } else {
                    32700 + *zone as u32
                }
            }
            CoordinateSystem::MGA(zone) => 28300 + *zone as u32,
            CoordinateSystem::Other(code) => *code,
        }
    }

    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        matches!(self, CoordinateSystem::WGS84 | CoordinateSystem::GDA94)
    }

    /// Transverse Mercator zone parameters (zone, northern), if projected
    pub fn utm_zone(&self) -> Option<(u8, bool)> {
        match self {
            CoordinateSystem::UTM(zone, north) => Some((*zone, *north)),
            CoordinateSystem::MGA(zone) => Some((*zone, false)),
            _ => None,
        }
    }

    /// Get a description of this coordinate system
    pub fn description(&self) -> String {
        match self {
            CoordinateSystem::WGS84 => "WGS 84 (EPSG:4326)".to_string(),
            CoordinateSystem::GDA94 => "GDA94 (EPSG:4283)".to_string(),
            CoordinateSystem::UTM(zone, is_northern) => format!(
                "UTM Zone {}{} (EPSG:{})",
                zone,
                if *is_northern { "N" } else { "S" },
                self.epsg_code()
            ),
            CoordinateSystem::MGA(zone) => format!("MGA Zone {} (EPSG:{})", zone, self.epsg_code()),
            CoordinateSystem::Other(code) => format!("EPSG:{}", code),
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg_code())
    }
}

/// Factory for creating coordinate systems
pub struct CoordinateSystemFactory;

impl CoordinateSystemFactory {
    /// Create a coordinate system from an EPSG code
    pub fn from_epsg(epsg: u32) -> CoordinateSystem {
        match epsg {
            4326 => CoordinateSystem::WGS84,
            4283 => CoordinateSystem::GDA94,
            32601..=32660 => CoordinateSystem::UTM((epsg - 32600) as u8, true),
            32701..=32760 => CoordinateSystem::UTM((epsg - 32700) as u8, false),
            28348..=28358 => CoordinateSystem::MGA((epsg - 28300) as u8),
            _ => CoordinateSystem::Other(epsg),
        }
    }

    /// Parse a coordinate system from a string (e.g. "EPSG:4326")
    pub fn from_string(crs_str: &str) -> PipelineResult<CoordinateSystem> {
        let upper = crs_str.trim().to_uppercase();
        let code = upper.strip_prefix("EPSG:").unwrap_or(&upper);
        code.parse::<u32>()
            .map(Self::from_epsg)
            .map_err(|_| PipelineError::InvalidInput(format!("Unsupported CRS format: {}", crs_str)))
    }

    /// Parse the `crs` member of a GeoJSON document
    ///
    /// Accepts `EPSG:xxxx` and OGC URNs such as
    /// `urn:ogc:def:crs:EPSG::28353`; `CRS84` maps to WGS 84.
    pub fn from_ogc_name(name: &str) -> PipelineResult<CoordinateSystem> {
        let upper = name.trim().to_uppercase();
        if upper.ends_with("CRS84") {
            return Ok(CoordinateSystem::WGS84);
        }
        match upper.rsplit(':').next().map(str::parse::<u32>) {
            Some(Ok(code)) => Ok(Self::from_epsg(code)),
            _ => Self::from_string(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsg_codes_roundtrip() {
        for code in [4326, 4283, 32752, 32753, 32654, 28353, 3577] {
            assert_eq!(CoordinateSystemFactory::from_epsg(code).epsg_code(), code);
        }
        assert_eq!(CoordinateSystemFactory::from_epsg(32753), CoordinateSystem::UTM(53, false));
    }

    #[test]
    fn parses_names() {
        assert_eq!(CoordinateSystemFactory::from_string("epsg:4283").unwrap(), CoordinateSystem::GDA94);
        assert_eq!(
            CoordinateSystemFactory::from_ogc_name("urn:ogc:def:crs:EPSG::28353").unwrap(),
            CoordinateSystem::MGA(53)
        );
        assert_eq!(
            CoordinateSystemFactory::from_ogc_name("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(),
            CoordinateSystem::WGS84
        );
        assert!(CoordinateSystemFactory::from_string("mercator").is_err());
    }
}
