//! End-to-end runs over small fabricated GeoTIFFs and GeoJSON layers

use std::fs;
use std::path::{Path, PathBuf};

use firescar_zonal::coordinate::{CoordinateSystem, GeoTransform};
use firescar_zonal::tiff::SampleType;
use firescar_zonal::vector::{write_geojson, AttributeValue, Feature, Layer};
use firescar_zonal::{FirescarZonal, GeoTiffStore, PipelineConfig, PipelineError, Raster, RasterStore};
use geo::{polygon, MultiPolygon};

const X0: f64 = 550_000.0;
const Y0: f64 = 7_550_000.0;
const UTM53: CoordinateSystem = CoordinateSystem::UTM(53, false);

fn square(min_x: f64, min_y: f64, size: f64, attrs: &[(&str, AttributeValue)]) -> Feature {
    let poly = polygon![
        (x: min_x, y: min_y),
        (x: min_x + size, y: min_y),
        (x: min_x + size, y: min_y + size),
        (x: min_x, y: min_y + size),
        (x: min_x, y: min_y),
    ];
    let mut feature = Feature::new(MultiPolygon::new(vec![poly]));
    for (key, value) in attrs {
        feature.set_property(*key, value.clone());
    }
    feature
}

fn write_layer(path: &Path, name: &str, features: Vec<Feature>) {
    let mut layer = Layer::new(name, UTM53);
    layer.features = features;
    write_geojson(&layer, path).unwrap();
}

fn tile(min_x: f64, min_y: f64, code: i64) -> Feature {
    square(min_x, min_y, 200_000.0, &[("WRSPR", AttributeValue::Int(code))])
}

fn site(min_x: f64, min_y: f64, name: &str, uid: i64) -> Feature {
    square(
        min_x,
        min_y,
        60.0,
        &[("site_name", AttributeValue::String(name.to_string())), ("uid", AttributeValue::Int(uid))],
    )
}

fn grid(bands: Vec<Vec<f32>>, sample_type: SampleType, nodata: Option<f64>) -> Raster {
    Raster::new(4, 4, GeoTransform::new(X0, 30.0, Y0, -30.0), UTM53, sample_type, nodata, bands).unwrap()
}

/// Six-band reflectance scene; band b holds 1000 * b + pixel index
fn scene() -> Raster {
    let bands = (1..=6).map(|b| (0..16).map(|i| (1000 * b + i) as f32).collect()).collect();
    grid(bands, SampleType::I16, Some(32767.0))
}

/// Fire scar burnt in March at pixel 5 and in September at pixel 6
fn fire_scar() -> Raster {
    let mut months = vec![0.0f32; 16];
    months[5] = 3.0;
    months[6] = 9.0;
    grid(vec![months], SampleType::U8, Some(0.0))
}

struct Fixture {
    _root: tempfile::TempDir,
    scenes: PathBuf,
    export: PathBuf,
    config: PipelineConfig,
}

fn fixture(product: &str) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let scenes = root.path().join("scenes");
    let fires = root.path().join("fires");
    let export = root.path().join("export");
    fs::create_dir_all(&scenes).unwrap();
    fs::create_dir_all(&fires).unwrap();

    let tiles_path = root.path().join("tiles.geojson");
    let sites_path = root.path().join("sites.geojson");
    write_layer(&tiles_path, "tiles", vec![tile(X0 - 100_000.0, Y0 - 100_000.0, 101077)]);
    write_layer(&sites_path, "sites", vec![site(X0 + 30.0, Y0 - 90.0, "NTABRT0001", 1)]);

    let mut config = PipelineConfig::default();
    config.product = product.to_string();
    config.scene_root = scenes.clone();
    config.fire_root = Some(fires);
    config.tiles_path = Some(tiles_path);
    config.sites_path = Some(sites_path);
    config.export_dir = export.clone();
    config.temp_root = Some(root.path().join("tmp"));
    config.min_scene_count = 2;
    config.workers = 2;

    Fixture { _root: root, scenes, export, config }
}

fn masked_fixture() -> Fixture {
    let fx = fixture("dbg");
    let store = GeoTiffStore::default();
    for date in ["20190612", "20190628"] {
        let name = format!("l8olre_p101r077_{}_dbgm3_zstdmask.tif", date);
        store.write(&scene(), &fx.scenes.join(name)).unwrap();
    }
    let fires = fx.config.fire_root.clone().unwrap();
    store.write(&fire_scar(), &fires.join("nt_p101r077_2019_dkna2.tif")).unwrap();
    fx
}

fn data_lines(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().skip(1).filter(|l| !l.is_empty()).count()
}

#[test]
fn full_run_masks_gates_and_aggregates() {
    let fx = masked_fixture();
    let api = FirescarZonal::new(fx.config.clone()).unwrap();
    let report = api.run().unwrap();

    assert_eq!(report.images, 2);
    assert_eq!(report.fire_scars, 1);
    assert_eq!(report.assignments, 1);
    let mask = report.mask.as_ref().unwrap();
    assert_eq!(mask.masked.len(), 2);
    assert!(mask.unmatched.is_empty());
    assert_eq!(report.gate.ready.len(), 1);
    assert_eq!(report.extracted_images, 2);
    assert_eq!(report.rows, 2);

    // June scenes drop fires from January through June only
    let output = fx.scenes.join("l8olre_p101r077_20190612_dbgm3_dkndmask.tif");
    let masked = GeoTiffStore::default().read(&output).unwrap();
    for band in &masked.bands {
        assert_eq!(band[5], 32767.0);
        assert_ne!(band[6], 32767.0);
    }
    assert_eq!(masked.bands[0][6], 1006.0);

    let table = fx.export.join("dbg_zonal_stats").join("NTABRT0001_dbg_zonal_stats.csv");
    assert_eq!(report.site_tables, vec![table.clone()]);
    assert_eq!(data_lines(&table), 2);
    assert!(fs::read_to_string(&table).unwrap().starts_with("uid,site,image,"));

    assert!(fx.export.join("site_tile_assignment.csv").exists());
    assert!(fx.export.join("dbg_image_list.csv").exists());
    assert_eq!(data_lines(&fx.export.join("dbg_unmatched.csv")), 0);
    assert_eq!(data_lines(&fx.export.join("dbg_fire_footprints.csv")), 2);
    assert_eq!(data_lines(&fx.export.join("dbg_tiles_ready.csv")), 1);
    assert!(fx.export.join("dbg_for_processing").join("101077_dbg_tile_list.csv").exists());
}

#[test]
fn rerun_reuses_masked_outputs() {
    let fx = masked_fixture();
    let api = FirescarZonal::new(fx.config.clone()).unwrap();
    api.mask().unwrap();
    let output = fx.scenes.join("l8olre_p101r077_20190628_dbgm3_dkndmask.tif");
    let first = fs::read(&output).unwrap();

    let again = api.mask().unwrap();
    assert!(again.masked.is_empty());
    assert_eq!(again.skipped.len(), 2);
    assert_eq!(fs::read(&output).unwrap(), first);

    let report = api.zonal().unwrap();
    assert_eq!(report.images, 2);
    assert_eq!(report.rows, 2);
}

#[test]
fn scenes_without_fire_year_are_listed() {
    let fx = masked_fixture();
    GeoTiffStore::default()
        .write(&scene(), &fx.scenes.join("l8olre_p101r077_20200704_dbgm3_zstdmask.tif"))
        .unwrap();
    let summary = FirescarZonal::new(fx.config.clone()).unwrap().mask().unwrap();
    assert_eq!(summary.masked.len(), 2);
    assert_eq!(summary.unmatched.len(), 1);
    let listed = fs::read_to_string(fx.export.join("dbg_unmatched.csv")).unwrap();
    assert!(listed.contains("20200704"));
    assert!(listed.contains("no_fire_year"));
}

#[test]
fn tiles_below_minimum_are_not_extracted() {
    let mut fx = masked_fixture();
    fx.config.min_scene_count = 3;
    let report = FirescarZonal::new(fx.config.clone()).unwrap().run().unwrap();
    assert!(report.gate.ready.is_empty());
    assert_eq!(report.gate.insufficient.len(), 1);
    assert_eq!(report.rows, 0);
    assert!(report.site_tables.is_empty());
    assert_eq!(data_lines(&fx.export.join("dbg_tiles_insufficient.csv")), 1);
}

#[test]
fn ambiguous_sites_abort_the_run() {
    let fx = masked_fixture();
    let tiles_path = fx.config.tiles_path.clone().unwrap();
    write_layer(
        &tiles_path,
        "tiles",
        vec![tile(X0 - 100_000.0, Y0 - 100_000.0, 101077), tile(X0 - 150_000.0, Y0 - 150_000.0, 101078)],
    );
    let result = FirescarZonal::new(fx.config.clone()).unwrap().run();
    match result {
        Err(PipelineError::AmbiguousAssignment(sites)) => {
            assert_eq!(sites.len(), 1);
            assert_eq!(sites[0].tiles.len(), 2);
        }
        other => panic!("expected an ambiguous assignment, got {:?}", other.map(|r| r.rows)),
    }
    let listed = fs::read_to_string(fx.export.join("ambiguous.csv")).unwrap();
    assert!(listed.contains("101077;101078"));
    assert!(!fx.scenes.join("l8olre_p101r077_20190612_dbgm3_dkndmask.tif").exists());
}

#[test]
fn unmasked_products_are_grouped_untiled() {
    let fx = fixture("rainfall");
    let store = GeoTiffStore::default();
    for month in ["201901", "201902", "201903"] {
        let rain = grid(vec![vec![12.5; 16]], SampleType::F32, Some(-1.0));
        store.write(&rain, &fx.scenes.join(format!("{}.monthly_rain.tif", month))).unwrap();
    }
    let report = FirescarZonal::new(fx.config.clone()).unwrap().run().unwrap();
    assert!(report.mask.is_none());
    assert_eq!(report.gate.ready.len(), 1);
    assert_eq!(report.gate.ready[0].tile, "all");
    assert_eq!(report.rows, 3);
    let table = fx.export.join("rainfall_zonal_stats").join("NTABRT0001_rainfall_zonal_stats.csv");
    let content = fs::read_to_string(&table).unwrap();
    assert!(content.lines().next().unwrap().contains("b1_rain_mean"));
    let months: Vec<&str> = content.lines().skip(1).map(|l| l.split(',').nth(4).unwrap()).collect();
    assert_eq!(months, vec!["01", "02", "03"]);
}

#[test]
fn cancelled_runs_stop_before_masking() {
    let fx = masked_fixture();
    let api = FirescarZonal::new(fx.config.clone()).unwrap();
    api.cancellation_token().cancel();
    assert!(matches!(api.run(), Err(PipelineError::Cancelled)));
    assert!(!fx.scenes.join("l8olre_p101r077_20190612_dbgm3_dkndmask.tif").exists());
}
