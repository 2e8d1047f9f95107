//! Runner commands against GeoTIFF tiles on disk.

use demstl_dem::BoundingBox;
use demstl_mesh::{triangle_count, MeshError};
use demstl_runner::{
    format_report, list_tiles, report_json, run_generate, run_init, run_load_db, JobConfig,
    RunnerError,
};
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const SIDE: u32 = 16;

/// Write a single-band f32 GeoTIFF with a GDAL no-data tag.
fn write_tile(path: &Path, width: u32, height: u32, data: &[f32], nodata: f32) {
    let file = std::fs::File::create(path).expect("create tile");
    let mut encoder = TiffEncoder::new(file).expect("encoder");
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(width, height)
        .expect("image");
    let nodata = nodata.to_string();
    image
        .encoder()
        .write_tag(Tag::GdalNodata, nodata.as_str())
        .expect("nodata tag");
    image.write_data(data).expect("write data");
}

const NO_DATA: f32 = -9999.0;

/// A job directory with one small tile in the northwest corner of n45e005.
///
/// The tile only holds 16 x 16 samples, so only an area just inside the
/// corner is covered. Every odd column holds the no-data value; the rest
/// drop by one meter per row from 1000 at the top.
fn job_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let dem = dir.path().join("dem");
    std::fs::create_dir(&dem).unwrap();

    let data: Vec<f32> = (0..SIDE * SIDE)
        .map(|i| {
            if i % 2 == 1 {
                NO_DATA
            } else {
                1000.0 - (i / SIDE) as f32
            }
        })
        .collect();
    write_tile(&dem.join("n45e005_dem.tif"), SIDE, SIDE, &data, NO_DATA);

    let mut job = JobConfig::default();
    job.extract.resolution = 1.0;
    job.extract.width = 4.0;
    job.extract.height = 4.0;
    job.extract.bounds = Some(BoundingBox::new(49.997, 49.990, 5.009, 5.002).unwrap());
    job.save_new(dir.path().join("job.yaml")).unwrap();
    dir
}

#[test]
fn test_generate_from_job_file() {
    let dir = job_dir();
    let job = JobConfig::load(dir.path().join("job.yaml")).unwrap();
    assert_eq!(job.dem_directory, dir.path().join("dem"));

    let output = dir.path().join("out").join("terrain.stl");
    let report = run_generate(&job, &output).unwrap();
    assert_eq!((report.rows, report.cols), (5, 5));
    assert_eq!(report.tiles_read, 1);
    assert!(report.tile_failures.is_empty());
    assert_eq!(report.averaged_cells, 25);
    assert_eq!(report.baseline_cells, 0);

    // No-data samples neither count as elevations nor leave cells empty
    let (min, max) = (report.observed_min.unwrap(), report.observed_max.unwrap());
    assert!(min < max);
    assert!(min > 1000.0 - SIDE as f32, "observed min {}", min);
    assert!(max <= 1000.0);
    assert_eq!(report.scale_min, f64::from(min));

    assert_eq!(Some(report.triangles), triangle_count(5, 5));
    let len = std::fs::metadata(&output).unwrap().len();
    assert_eq!(len, 84 + 50 * u64::from(report.triangles));

    let text = format_report(&report);
    assert!(text.contains("5 x 5 cells"));
    assert!(text.contains("25 averaged"));

    let json: serde_json::Value = serde_json::from_str(&report_json(&report).unwrap()).unwrap();
    assert_eq!(json["triangles"], report.triangles);
    assert_eq!(json["tiles_read"], 1);
}

#[test]
fn test_generate_rejects_oversized_grid() {
    let dir = job_dir();
    let mut job = JobConfig::load(dir.path().join("job.yaml")).unwrap();
    job.extract.resolution = 1e-5;
    let output = dir.path().join("terrain.stl");

    let result = run_generate(&job, &output);
    assert!(matches!(
        result,
        Err(RunnerError::Mesh(MeshError::InvalidSettings(_)))
    ));
    assert!(!output.exists());
}

#[test]
fn test_generate_missing_dem_directory() {
    let dir = job_dir();
    let mut job = JobConfig::load(dir.path().join("job.yaml")).unwrap();
    job.dem_directory = dir.path().join("nowhere");
    let result = run_generate(&job, &dir.path().join("terrain.stl"));
    assert!(matches!(result, Err(RunnerError::Dem(_))));
}

#[test]
fn test_load_db() {
    let dir = job_dir();
    let job = JobConfig::load(dir.path().join("job.yaml")).unwrap();

    let database = job.working_database.clone();
    assert_eq!(database, dir.path().join("samples.sqlite"));
    let report = run_load_db(&job, &database).unwrap();
    assert_eq!(report.tiles_loaded, 1);
    assert_eq!(report.samples, u64::from(SIDE * SIDE));
    assert!(report.failures.is_empty());
    assert!(database.exists());

    // Recreated, not appended
    let again = run_load_db(&job, &database).unwrap();
    assert_eq!(again.samples, report.samples);
}

#[test]
fn test_load_db_needs_bounds() {
    let dir = job_dir();
    let mut job = JobConfig::load(dir.path().join("job.yaml")).unwrap();
    job.extract.bounds = None;
    let result = run_load_db(&job, &dir.path().join("samples.sqlite"));
    assert!(matches!(result, Err(RunnerError::Config(_))));
}

#[test]
fn test_list_tiles() {
    let dir = job_dir();
    let dem = dir.path().join("dem");
    std::fs::write(dem.join("n50e005_dem.tif"), b"").unwrap();
    std::fs::write(dem.join("notes.txt"), b"").unwrap();

    let all = list_tiles(&dem, None).unwrap();
    assert_eq!(all.len(), 2);

    let area = BoundingBox::new(49.997, 49.990, 5.009, 5.002).unwrap();
    let near = list_tiles(&dem, Some(&area)).unwrap();
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].name(), "n45e005_dem.tif");
}

#[test]
fn test_init() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job.yaml");
    run_init(&path).unwrap();

    let mut expected = JobConfig::default();
    expected.resolve_relative_to(dir.path());
    assert_eq!(JobConfig::load(&path).unwrap(), expected);

    assert!(matches!(run_init(&path), Err(RunnerError::AlreadyExists(_))));
}
