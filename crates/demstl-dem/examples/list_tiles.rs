//! Example: List the DEM tiles that cover a point.
//!
//! Usage: cargo run --example list_tiles -- <lat> <lon> [dem_dir]

use demstl_dem::{GeoTiffSource, RasterSource, TileCatalog};
use std::env;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <lat> <lon> [dem_dir]", args[0]);
        eprintln!("Example: {} 34.0 -84.0 ./dem", args[0]);
        std::process::exit(1);
    }

    let lat: f64 = args[1].parse().expect("Invalid latitude");
    let lon: f64 = args[2].parse().expect("Invalid longitude");
    let dem_dir = args.get(3).map(|s| s.as_str()).unwrap_or("dem");

    println!("Indexing DEM tiles from {}...", dem_dir);
    let start = Instant::now();
    let catalog = TileCatalog::open(dem_dir).expect("Failed to index DEM directory");
    println!(
        "Indexed {} tiles in {:.3}s",
        catalog.tile_count(),
        start.elapsed().as_secs_f64()
    );

    if let Some(bounds) = catalog.total_bounds() {
        println!(
            "Coverage: lat {:.4}° to {:.4}°, lon {:.4}° to {:.4}°",
            bounds.south, bounds.north, bounds.west, bounds.east
        );
    }

    let Some(tile) = catalog.tile_for_coord(lat, lon) else {
        eprintln!("Coordinate ({}, {}) is outside the tile lattice", lat, lon);
        std::process::exit(1);
    };
    println!("\n({}, {}) falls in {} (exists: {})", lat, lon, tile.name(), tile.exists());

    if tile.exists() {
        let open_start = Instant::now();
        match GeoTiffSource.open(tile.path()) {
            Ok(dataset) => println!(
                "{}x{} samples, {} band(s), no-data {:?} (loaded in {:.2}s)",
                dataset.width(),
                dataset.height(),
                dataset.band_count(),
                dataset.no_data(0),
                open_start.elapsed().as_secs_f64()
            ),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
