//! End-to-end tests for STL generation.
//!
//! Tiles live on a 1°, 40 pixel lattice. The tile files only need to exist
//! for the catalog; their samples come from a `MemoryRasterSource`.

use approx::assert_relative_eq;
use demstl_dem::{BoundingBox, MemoryRaster, MemoryRasterSource, TileCatalog, TileLattice};
use demstl_mesh::stl::{HEADER_LEN, TRIANGLE_LEN};
use demstl_mesh::{
    fill_gaps, generate, prepare_grid, ExtractSettings, GridAccumulator, HeightScale, LandMask,
    MeshBuilder, NormalMode, Triangle, Vertex,
};
use std::path::Path;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    catalog: TileCatalog,
    source: MemoryRasterSource,
}

/// n45e007 has data (higher to the north); n45e008 exists on disk but
/// cannot be opened.
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("n45e007_dem.tif"), b"").unwrap();
    std::fs::write(dir.path().join("n45e008_dem.tif"), b"").unwrap();
    let catalog =
        TileCatalog::open_with_lattice(dir.path(), TileLattice::new(1, 40).unwrap()).unwrap();

    let mut raster = MemoryRaster::filled(40, 40, 0.0, Some(-9999.0));
    for y in 0..40 {
        for x in 0..40 {
            raster.set(x, y, 1000.0 - 10.0 * y as f32);
        }
    }
    let mut source = MemoryRasterSource::new();
    let tile = catalog.tile_for_coord(45.5, 7.5).unwrap();
    assert_eq!(tile.name(), "n45e007_dem.tif");
    source.insert(tile.path(), raster);

    Fixture {
        dir,
        catalog,
        source,
    }
}

/// 3 x 5 grid over lon 7.5..8.5. DEM samples reach columns 0-3 only.
fn settings() -> ExtractSettings {
    ExtractSettings {
        resolution: 1.0,
        width: 4.0,
        height: 2.0,
        bounds: Some(BoundingBox::new(45.5, 45.0, 8.5, 7.5).unwrap()),
        ..ExtractSettings::default()
    }
}

fn write_land(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("land.kml");
    std::fs::write(
        &path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2"><Document><Folder>
  <Placemark><Polygon><outerBoundaryIs><LinearRing>
    <coordinates>7,44 9,44 9,47 7,47 7,44</coordinates>
  </LinearRing></outerBoundaryIs></Polygon></Placemark>
</Folder></Document></kml>"#,
    )
    .unwrap();
    path
}

fn read_triangles(bytes: &[u8]) -> Vec<Triangle> {
    let f = |at: usize| f32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
    let v = |at: usize| Vertex::new(f(at), f(at + 4), f(at + 8));
    let count = u32::from_le_bytes(bytes[80..84].try_into().unwrap()) as usize;
    (0..count)
        .map(|i| {
            let at = HEADER_LEN + 4 + i * TRIANGLE_LEN;
            Triangle {
                normal: v(at),
                vertices: [v(at + 12), v(at + 24), v(at + 36)],
            }
        })
        .collect()
}

/// Signed volume of a closed triangle surface; positive when facets wind
/// outward.
fn signed_volume(triangles: &[Triangle]) -> f64 {
    triangles
        .iter()
        .map(|t| {
            let [a, b, c] = t.vertices.map(|v| [v.x as f64, v.y as f64, v.z as f64]);
            let cross = [
                b[1] * c[2] - b[2] * c[1],
                b[2] * c[0] - b[0] * c[2],
                b[0] * c[1] - b[1] * c[0],
            ];
            (a[0] * cross[0] + a[1] * cross[1] + a[2] * cross[2]) / 6.0
        })
        .sum()
}

#[test]
fn test_generate_with_land() {
    let fx = fixture();
    let land = write_land(fx.dir.path());
    let output = fx.dir.path().join("terrain.stl");

    let report = generate(&settings(), &fx.catalog, &fx.source, Some(land.as_path()), &output).unwrap();
    assert_eq!((report.rows, report.cols), (3, 5));
    assert_eq!(report.tiles_read, 1);
    assert_eq!(report.tile_failures.len(), 1);
    assert!(report.tile_failures[0].path.ends_with("n45e008_dem.tif"));
    assert_eq!(report.land_polygons, 1);
    assert_eq!(report.land_error, None);
    assert_eq!(report.averaged_cells, 12);
    assert_eq!(report.interpolated_cells, 3);
    assert_eq!(report.baseline_cells, 0);

    let (min, max) = (report.observed_min.unwrap(), report.observed_max.unwrap());
    assert!(min < max);
    assert_eq!(report.scale_min, f64::from(min));
    assert_eq!(report.scale_max, f64::from(max));

    // 2*2*4 top + 4*2 + 4*4 sides + 2 base
    assert_eq!(report.triangles, 42);
    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(bytes.len(), 84 + 50 * 42);
    assert!(signed_volume(&read_triangles(&bytes)) > 0.0);
}

#[test]
fn test_eastern_column_extends_from_data() {
    let fx = fixture();
    let land = LandMask::from_kml_file(write_land(fx.dir.path())).unwrap();
    let prepared = prepare_grid(&settings(), &fx.catalog, &fx.source, &land).unwrap();
    let grid = &prepared.grid;

    for row in 0..3 {
        let edge = grid.cell(row, 4);
        assert_eq!(edge.count(), 0);
        assert_eq!(edge.horizontal_scan_elevation(), grid.cell(row, 3).elevation());
        assert_eq!(edge.vertical_scan_elevation(), None);
        assert_eq!(edge.elevation(), grid.cell(row, 3).elevation());
    }
    // Higher to the north
    assert!(grid.cell(2, 0).elevation() > grid.cell(0, 0).elevation());
}

#[test]
fn test_generate_without_land_is_baseline() {
    let fx = fixture();
    let output = fx.dir.path().join("terrain.stl");
    let report = generate(&settings(), &fx.catalog, &fx.source, None, &output).unwrap();
    assert_eq!(report.land_polygons, 0);
    assert_eq!(report.land_error, None);
    assert_eq!(report.interpolated_cells, 0);
    assert_eq!(report.baseline_cells, 3);
}

#[test]
fn test_bad_land_file_reported() {
    let fx = fixture();
    let land = fx.dir.path().join("broken.kml");
    std::fs::write(&land, "<kml><Document></kml>").unwrap();
    let output = fx.dir.path().join("terrain.stl");

    let report = generate(&settings(), &fx.catalog, &fx.source, Some(land.as_path()), &output).unwrap();
    assert!(report.land_error.is_some());
    assert_eq!(report.land_polygons, 0);
    assert_eq!(report.baseline_cells, 3);
    assert!(output.exists());
}

#[test]
fn test_no_data_gives_flat_box() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = TileCatalog::open(dir.path()).unwrap();
    let output = dir.path().join("flat.stl");
    let settings = ExtractSettings {
        normals: NormalMode::Unit,
        ..settings()
    };

    let report = generate(&settings, &catalog, &MemoryRasterSource::new(), None, &output).unwrap();
    assert_eq!(report.tiles_read, 0);
    assert_eq!(report.observed_min, None);
    assert_eq!(report.scale_min, settings.min_altitude);
    assert_eq!(report.scale_max, settings.max_altitude);
    assert_eq!(report.baseline_cells, 15);

    let triangles = read_triangles(&std::fs::read(&output).unwrap());
    assert_eq!(triangles.len(), 42);
    let base = settings.base_thickness as f32;
    let center = Vertex::new(2.0, 1.0, base / 2.0);
    for t in &triangles {
        let c = t.centroid();
        let outward = Vertex::new(c.x - center.x, c.y - center.y, c.z - center.z);
        assert!(t.normal.dot(outward) > 0.0, "inward facet {:?}", t);
        assert_relative_eq!(t.normal.length(), 1.0, epsilon = 1e-6);
    }
    // Box of 4 x 2 x base
    assert_relative_eq!(signed_volume(&triangles), 8.0 * base as f64, epsilon = 1e-3);
}

#[test]
fn test_reference_heights() {
    let bounds = BoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
    let mut acc = GridAccumulator::new(bounds, 2, 2, 1.0);
    for (i, e) in [0.0, 10.0, 10.0, 20.0].into_iter().enumerate() {
        acc.accumulate(i / 2, i % 2, e);
    }
    let mut grid = acc.into_grid();
    let stats = fill_gaps(&mut grid, &LandMask::empty());
    assert_eq!(stats.averaged, 4);

    let heights = |thickness: f64| {
        let scale = HeightScale::new(0.0, 20.0, 1.0, thickness);
        grid.cells()
            .iter()
            .map(|c| scale.cell_height(c))
            .collect::<Vec<_>>()
    };
    assert_eq!(heights(3.0), vec![1.0, 2.0, 2.0, 3.0]);
    assert_eq!(heights(5.0), vec![1.0, 3.0, 3.0, 5.0]);
}

#[test]
fn test_three_by_three_has_26_triangles() {
    let bounds = BoundingBox::new(3.0, 0.0, 3.0, 0.0).unwrap();
    let grid = GridAccumulator::new(bounds, 3, 3, 1.0).into_grid();
    let builder = MeshBuilder::new(&grid, HeightScale::new(0.0, 1.0, 1.0, 2.0), NormalMode::Raw);

    let mut bytes = Vec::new();
    assert_eq!(builder.write(&mut bytes).unwrap(), 26);
    assert_eq!(bytes.len(), 84 + 50 * 26);
    assert_eq!(read_triangles(&bytes).len(), 26);
}
