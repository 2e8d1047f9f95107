//! SQLite spool of raw raster samples.
//!
//! Every sample of every tile that overlaps an area is written to a single
//! `ElevationData` table, one transaction per tile. The spool is a
//! diagnostic artifact; mesh generation never reads it back.

use crate::raster::{RasterDataset, RasterSource};
use crate::{BoundingBox, Result, Tile, TileCatalog, TileFailure};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info, warn};

const CREATE_TABLE_SQL: &str = "CREATE TABLE ElevationData
(
    File varchar(255) not null,
    XCoord int not null,
    YCoord int not null,
    North real not null,
    South real not null,
    East real not null,
    West real not null,
    Elevation real,
    PRIMARY KEY(File ASC, XCoord ASC, YCoord ASC)
);";

const INSERT_SQL: &str = "INSERT INTO ElevationData (File, XCoord, YCoord, North, South, East, West, Elevation)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);";

/// One spooled raster sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSample {
    /// Sample footprint.
    pub bounds: BoundingBox,
    /// Elevation, or `None` for the no-data sentinel.
    pub elevation: Option<f64>,
}

/// Outcome of spooling an area.
#[derive(Debug, Clone, Default)]
pub struct SpoolReport {
    /// Tiles fully written.
    pub tiles_loaded: usize,
    /// Samples written across all tiles.
    pub samples: u64,
    /// Tiles that failed and were rolled back.
    pub failures: Vec<TileFailure>,
}

/// Writer for the sample spool database.
#[derive(Debug)]
pub struct SampleCache {
    conn: Connection,
}

impl SampleCache {
    /// Create a fresh spool at `path`, replacing any previous database.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            debug!("Removing previous sample database {}", path.display());
            std::fs::remove_file(path)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Create a spool that lives only in memory.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLE_SQL)?;
        Ok(Self { conn })
    }

    /// Spool every sample of one tile.
    ///
    /// The tile is written in a single transaction: on any error nothing
    /// from this tile remains in the table. Returns the number of samples
    /// written.
    pub fn load_tile(&mut self, tile: &Tile, dataset: &mut dyn RasterDataset) -> Result<u64> {
        if dataset.band_count() == 0 {
            return Ok(0);
        }
        let no_data = dataset.no_data(0);
        let file = tile.path().display().to_string();
        let width = dataset.width();
        let mut row = vec![0.0f32; width as usize];
        let mut samples = 0u64;

        // Dropping an uncommitted transaction rolls it back
        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare_cached(INSERT_SQL)?;
            for y in 0..dataset.height() {
                let (north, south) = tile.row_strip(y);
                dataset.read_row(0, y, &mut row)?;
                for (x, &value) in row.iter().enumerate() {
                    let (west, east) = tile.column_strip(x as u32);
                    let elevation = (Some(value) != no_data && value.is_finite())
                        .then_some(f64::from(value));
                    insert.execute(params![
                        file, x as u32, y, north, south, east, west, elevation
                    ])?;
                    samples += 1;
                }
            }
        }
        tx.commit()?;
        Ok(samples)
    }

    /// Spool every existing tile that intersects `area`.
    ///
    /// Tiles that fail to open or write are reported and skipped.
    pub fn load_area(
        &mut self,
        catalog: &TileCatalog,
        source: &dyn RasterSource,
        area: &BoundingBox,
    ) -> SpoolReport {
        let mut report = SpoolReport::default();
        for tile in catalog.tiles_intersecting(area) {
            let result = source
                .open(tile.path())
                .and_then(|mut dataset| self.load_tile(&tile, dataset.as_mut()));
            match result {
                Ok(samples) => {
                    debug!("Spooled {} samples from {}", samples, tile.name());
                    report.tiles_loaded += 1;
                    report.samples += samples;
                }
                Err(e) => {
                    warn!("Problem spooling {}: {}", tile.path().display(), e);
                    report.failures.push(TileFailure::new(&tile, &e));
                }
            }
        }
        info!(
            "Spooled {} samples from {} tile(s), {} failure(s)",
            report.samples,
            report.tiles_loaded,
            report.failures.len()
        );
        report
    }

    /// Total number of spooled samples.
    pub fn sample_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ElevationData", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Look up one spooled sample.
    pub fn sample(&self, file: &str, x: u32, y: u32) -> Result<Option<CachedSample>> {
        let sample = self
            .conn
            .query_row(
                "SELECT North, South, East, West, Elevation FROM ElevationData
                 WHERE File = ?1 AND XCoord = ?2 AND YCoord = ?3",
                params![file, x, y],
                |row| {
                    Ok(CachedSample {
                        bounds: BoundingBox {
                            north: row.get(0)?,
                            south: row.get(1)?,
                            east: row.get(2)?,
                            west: row.get(3)?,
                        },
                        elevation: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(sample)
    }
}
