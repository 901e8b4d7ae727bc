//! Tile-Grid Resolver
//!
//! Sites are matched against tiles shrunk inward by a fixed margin, one
//! UTM zone at a time. A site overlapping no buffered tile is dropped; a
//! site overlapping more than one is a data-integrity error.

use geo::{BoundingRect, Intersects, MultiPolygon};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::coordinate::CoordinateSystem;
use crate::errors::{AmbiguousSite, PipelineError, PipelineResult};
use crate::vector::{buffer_convex, AttributeValue, Layer};

/// Tile-code membership rule for one UTM zone
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneRule {
    pub zone: u8,
    #[serde(default)]
    pub northern: bool,
    /// Lowest tile code in the zone
    #[serde(default)]
    pub min_code: Option<i64>,
    /// Highest tile code in the zone
    #[serde(default)]
    pub max_code: Option<i64>,
    /// Codes always in the zone
    #[serde(default)]
    pub include: Vec<i64>,
    /// Codes never in the zone
    #[serde(default)]
    pub exclude: Vec<i64>,
}

impl ZoneRule {
    /// Whether tile `code` belongs to this zone
    pub fn matches(&self, code: i64) -> bool {
        if self.include.contains(&code) {
            return true;
        }
        if self.exclude.contains(&code) {
            return false;
        }
        self.min_code.map_or(true, |min| code >= min) && self.max_code.map_or(true, |max| code <= max)
    }

    /// Metric CRS of the zone
    pub fn crs(&self) -> CoordinateSystem {
        CoordinateSystem::UTM(self.zone, self.northern)
    }

    /// The WRS-2 split over northern Australia
    ///
    /// Codes 104072 and 104073 straddle the boundary and fall in both zones.
    pub fn defaults() -> Vec<ZoneRule> {
        vec![
            ZoneRule {
                zone: 52,
                northern: false,
                min_code: Some(104072),
                max_code: None,
                include: vec![103078],
                exclude: Vec::new(),
            },
            ZoneRule {
                zone: 53,
                northern: false,
                min_code: None,
                max_code: Some(104073),
                include: Vec::new(),
                exclude: vec![103078],
            },
        ]
    }
}

/// Attribute columns read from the site and tile layers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub site: String,
    pub uid: String,
    pub tile: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames { site: "site_name".to_string(), uid: "uid".to_string(), tile: "WRSPR".to_string() }
    }
}

/// One site resolved to one tile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteTileAssignment {
    pub uid: i64,
    pub site: String,
    pub tile: String,
    pub zone: u8,
    /// Position of the site in its layer
    #[serde(skip)]
    pub feature_index: usize,
}

/// Resolves sites to tiles with a negative-buffer containment rule
#[derive(Debug, Clone)]
pub struct TileResolver {
    rules: Vec<ZoneRule>,
    margin: f64,
    columns: ColumnNames,
}

impl TileResolver {
    /// # Arguments
    /// * `rules` - Zone membership rules, one per UTM zone
    /// * `margin` - Inward buffer in metres
    /// * `columns` - Attribute names on the site and tile layers
    pub fn new(rules: Vec<ZoneRule>, margin: f64, columns: ColumnNames) -> Self {
        TileResolver { rules, margin: margin.abs(), columns }
    }

    /// Tile id from a tile-code attribute
    fn tile_code(value: &AttributeValue) -> Option<(i64, String)> {
        value.as_i64().map(|code| (code, format!("{:06}", code)))
    }

    /// Unique id per site: the uid column when every site has one, else position + 1
    fn site_uids(&self, sites: &Layer) -> PipelineResult<Vec<i64>> {
        if sites.require_column(&self.columns.uid).is_err() {
            info!(
                "Layer '{}' has no '{}' column; numbering sites from 1",
                sites.name, self.columns.uid
            );
            return Ok((1..=sites.len() as i64).collect());
        }
        let uids = sites
            .features
            .iter()
            .map(|f| f.get_property(&self.columns.uid).and_then(AttributeValue::as_i64))
            .collect::<Option<Vec<i64>>>()
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!("'{}' values must be integers", self.columns.uid))
            })?;
        let mut seen = HashSet::new();
        if let Some(dup) = uids.iter().find(|u| !seen.insert(**u)) {
            return Err(PipelineError::InvalidInput(format!("duplicate site uid {}", dup)));
        }
        Ok(uids)
    }

    /// Assign every site to at most one buffered tile
    ///
    /// # Returns
    /// Assignments sorted by uid, or `AmbiguousAssignment` listing every
    /// site that overlaps more than one buffered tile
    pub fn resolve(&self, tiles: &Layer, sites: &Layer) -> PipelineResult<Vec<SiteTileAssignment>> {
        tiles.require_column(&self.columns.tile)?;
        sites.require_column(&self.columns.site)?;
        let uids = self.site_uids(sites)?;

        let mut rows: Vec<SiteTileAssignment> = Vec::new();
        for rule in &self.rules {
            let mut zone_tiles = Layer::new(tiles.name.clone(), tiles.crs);
            zone_tiles.features = tiles
                .features
                .iter()
                .filter(|f| {
                    f.get_property(&self.columns.tile)
                        .and_then(Self::tile_code)
                        .map_or(false, |(code, _)| rule.matches(code))
                })
                .cloned()
                .collect();
            if zone_tiles.is_empty() {
                debug!("No tiles in zone {}", rule.zone);
                continue;
            }

            let crs = rule.crs();
            let zone_tiles = zone_tiles.reproject(crs)?;
            let zone_sites = sites.reproject(crs)?;
            info!("Zone {}: {} tile(s) against {} site(s)", rule.zone, zone_tiles.len(), zone_sites.len());

            for tile in &zone_tiles.features {
                let Some((_, tile_id)) = tile.get_property(&self.columns.tile).and_then(Self::tile_code) else {
                    continue;
                };
                let buffered: MultiPolygon<f64> = buffer_convex(&tile.geometry, -self.margin)?;
                let Some(extent) = buffered.bounding_rect() else {
                    warn!("Tile {} vanishes under a {} m buffer", tile_id, self.margin);
                    continue;
                };
                for (index, site) in zone_sites.features.iter().enumerate() {
                    let inside = site.geometry.bounding_rect().map_or(false, |r| r.intersects(&extent))
                        && buffered.intersects(&site.geometry);
                    if inside {
                        rows.push(SiteTileAssignment {
                            uid: uids[index],
                            site: site
                                .get_property(&self.columns.site)
                                .map(|v| v.to_string())
                                .unwrap_or_default(),
                            tile: tile_id.clone(),
                            zone: rule.zone,
                            feature_index: index,
                        });
                    }
                }
            }
        }

        // A boundary tile listed in two zones yields the same pair twice
        let mut seen = HashSet::new();
        rows.retain(|r| seen.insert((r.uid, r.tile.clone())));

        let mut by_site: BTreeMap<i64, Vec<&SiteTileAssignment>> = BTreeMap::new();
        for row in &rows {
            by_site.entry(row.uid).or_default().push(row);
        }
        let ambiguous: Vec<AmbiguousSite> = by_site
            .values()
            .filter(|matches| matches.len() > 1)
            .map(|matches| AmbiguousSite {
                site: matches[0].site.clone(),
                uid: matches[0].uid,
                tiles: matches.iter().map(|m| m.tile.clone()).collect(),
            })
            .collect();
        if !ambiguous.is_empty() {
            return Err(PipelineError::AmbiguousAssignment(ambiguous));
        }

        rows.sort_by_key(|r| r.uid);
        let dropped = sites.len() - rows.len();
        if dropped > 0 {
            warn!("{} site(s) fall in no buffered tile and were dropped", dropped);
        }
        info!("Resolved {} site(s) to {} tile(s)", rows.len(), rows.iter().map(|r| &r.tile).collect::<HashSet<_>>().len());
        Ok(rows)
    }
}

/// Writes `uid, site, tile, zone` rows
pub fn write_assignments(assignments: &[SiteTileAssignment], path: &Path) -> PipelineResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in assignments {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} assignment(s) to {}", assignments.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::test_support::square;
    use crate::vector::Feature;

    const UTM53: CoordinateSystem = CoordinateSystem::UTM(53, false);

    fn tile(min_x: f64, min_y: f64, code: i64) -> Feature {
        square(min_x, min_y, 100_000.0, &[("WRSPR", AttributeValue::Int(code))])
    }

    fn site(min_x: f64, min_y: f64, name: &str) -> Feature {
        square(min_x, min_y, 100.0, &[("site_name", AttributeValue::String(name.to_string()))])
    }

    fn resolver() -> TileResolver {
        TileResolver::new(ZoneRule::defaults(), 4000.0, ColumnNames::default())
    }

    fn layers(tiles: Vec<Feature>, sites: Vec<Feature>) -> (Layer, Layer) {
        let mut t = Layer::new("tiles", UTM53);
        t.features = tiles;
        let mut s = Layer::new("sites", UTM53);
        s.features = sites;
        (t, s)
    }

    #[test]
    fn default_zone_split_follows_wrs_codes() {
        let rules = ZoneRule::defaults();
        let zone = |code| rules.iter().filter(|r| r.matches(code)).map(|r| r.zone).collect::<Vec<_>>();
        assert_eq!(zone(101077), vec![53]);
        assert_eq!(zone(103078), vec![52]);
        assert_eq!(zone(104073), vec![52, 53]);
        assert_eq!(zone(105070), vec![52]);
    }

    #[test]
    fn site_in_margin_strip_gets_no_tile() {
        let x0 = 500_000.0;
        let y0 = 7_500_000.0;
        let (tiles, sites) = layers(
            vec![tile(x0, y0, 101077)],
            vec![site(x0 + 50_000.0, y0 + 50_000.0, "centre"), site(x0 + 1_000.0, y0 + 50_000.0, "edge")],
        );
        let rows = resolver().resolve(&tiles, &sites).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].site, "centre");
        assert_eq!(rows[0].tile, "101077");
        assert_eq!(rows[0].zone, 53);
        assert_eq!(rows[0].uid, 1);
    }

    #[test]
    fn overlapping_tiles_resolve_once_after_buffering() {
        // Tiles overlap by 6 km; a site 1 km inside the overlap lies in both
        // unbuffered tiles but only in the buffered copy of the first
        let x0 = 500_000.0;
        let y0 = 7_500_000.0;
        let (tiles, sites) = layers(
            vec![tile(x0, y0, 101077), tile(x0 + 94_000.0, y0, 101078)],
            vec![site(x0 + 94_900.0, y0 + 50_000.0, "overlap")],
        );
        let rows = resolver().resolve(&tiles, &sites).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tile, "101077");
    }

    #[test]
    fn site_in_two_buffered_tiles_is_ambiguous() {
        let x0 = 500_000.0;
        let y0 = 7_500_000.0;
        let (tiles, sites) = layers(
            vec![tile(x0, y0, 101077), tile(x0 + 50_000.0, y0, 101078)],
            vec![site(x0 + 70_000.0, y0 + 50_000.0, "both"), site(x0 + 10_000.0, y0 + 50_000.0, "west")],
        );
        match resolver().resolve(&tiles, &sites) {
            Err(PipelineError::AmbiguousAssignment(sites)) => {
                assert_eq!(sites.len(), 1);
                assert_eq!(sites[0].site, "both");
                assert_eq!(sites[0].tiles, vec!["101077".to_string(), "101078".to_string()]);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn boundary_tile_in_two_zones_is_not_ambiguous() {
        let x0 = 500_000.0;
        let y0 = 7_500_000.0;
        // 104073 is listed in zones 52 and 53; both passes see the same tile
        let t = crate::coordinate::CoordinateTransformer;
        let centre = t.utm_to_geographic(x0 + 50_000.0, y0 + 50_000.0, 53, false);
        let (tiles, mut sites) = layers(vec![tile(x0, y0, 104073)], Vec::new());
        sites.crs = CoordinateSystem::GDA94;
        sites.features.push(square(centre.x, centre.y, 0.001, &[("site_name", AttributeValue::String("s".into()))]));

        let rows = resolver().resolve(&tiles, &sites).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tile, "104073");
    }

    #[test]
    fn uid_column_is_used_and_must_be_unique() {
        let x0 = 500_000.0;
        let y0 = 7_500_000.0;
        let mut a = site(x0 + 50_000.0, y0 + 50_000.0, "a");
        a.set_property("uid", AttributeValue::Int(42));
        let mut b = site(x0 + 60_000.0, y0 + 50_000.0, "b");
        b.set_property("uid", AttributeValue::Int(42));

        let (tiles, sites) = layers(vec![tile(x0, y0, 101077)], vec![a.clone()]);
        assert_eq!(resolver().resolve(&tiles, &sites).unwrap()[0].uid, 42);

        let (tiles, sites) = layers(vec![tile(x0, y0, 101077)], vec![a, b]);
        assert!(matches!(resolver().resolve(&tiles, &sites), Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn missing_tile_column_aborts() {
        let (mut tiles, sites) = layers(vec![tile(0.0, 0.0, 101077)], vec![site(10.0, 10.0, "a")]);
        tiles.features[0].properties.clear();
        assert!(matches!(
            resolver().resolve(&tiles, &sites),
            Err(PipelineError::MissingColumn { column, .. }) if column == "WRSPR"
        ));
    }

    #[test]
    fn assignments_csv_has_expected_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site_tile_assignment.csv");
        let rows = vec![SiteTileAssignment {
            uid: 1,
            site: "alpha".into(),
            tile: "101077".into(),
            zone: 53,
            feature_index: 0,
        }];
        write_assignments(&rows, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "uid,site,tile,zone\n1,alpha,101077,53\n");
    }
}
