//! Reading DEM tiles into a [`GridAccumulator`].

use crate::grid::{ElevationGrid, GridAccumulator};
use crate::settings::ExtractSettings;
use crate::{MeshError, Result};
use demstl_dem::{RasterDataset, RasterSource, Tile, TileCatalog, TileFailure};
use tracing::{debug, info, warn};

/// Result of reading every tile that covers a grid.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Averaged grid.
    pub grid: ElevationGrid,
    /// Tiles read successfully.
    pub tiles_read: usize,
    /// Tiles that could not be read.
    pub failures: Vec<TileFailure>,
}

impl GridAccumulator {
    /// Add every valid sample of `tile` that falls inside the read bounds.
    ///
    /// Only band 0 is read; a dataset without bands contributes nothing.
    /// Returns the number of samples used.
    pub fn extract_tile(&mut self, tile: &Tile, dataset: &mut dyn RasterDataset) -> Result<u64> {
        if dataset.band_count() == 0 {
            debug!("{} has no bands", tile.name());
            return Ok(0);
        }

        let read = self.read_bounds();
        let no_data = dataset.no_data(0);
        let mut row = vec![0.0f32; dataset.width() as usize];
        let mut used = 0u64;

        for y in 0..dataset.height() {
            let (north, south) = tile.row_strip(y);
            if south > read.north || north < read.south {
                continue;
            }

            dataset.read_row(0, y, &mut row)?;
            for (x, &value) in row.iter().enumerate() {
                let (west, east) = tile.column_strip(x as u32);
                if west > read.east || east < read.west {
                    continue;
                }
                if Some(value) == no_data || !value.is_finite() {
                    continue;
                }
                self.add_sample(north, south, west, east, value);
                used += 1;
            }
        }

        Ok(used)
    }
}

/// Build the averaged grid for `settings` from the tiles in `catalog`.
///
/// Tiles that fail to open or read are logged, reported and skipped.
pub fn extract_elevations(
    settings: &ExtractSettings,
    catalog: &TileCatalog,
    source: &dyn RasterSource,
) -> Result<Extraction> {
    let bounds = settings.validate()?;
    let (rows, cols) = settings.grid_dimensions();
    let mut acc = GridAccumulator::new(bounds, rows, cols, settings.resolution);
    let read = acc.read_bounds();

    let tiles = catalog.tiles_intersecting(&read);
    info!(
        "Extracting {}x{} grid from {} tile(s)",
        rows,
        cols,
        tiles.len()
    );

    let mut tiles_read = 0;
    let mut failures = Vec::new();
    for tile in &tiles {
        let result = source
            .open(tile.path())
            .map_err(MeshError::from)
            .and_then(|mut dataset| acc.extract_tile(tile, dataset.as_mut()));
        match result {
            Ok(samples) => {
                debug!("Used {} samples from {}", samples, tile.name());
                tiles_read += 1;
            }
            Err(e) => {
                warn!("Problem processing {}: {}", tile.path().display(), e);
                failures.push(TileFailure::new(tile, &e));
            }
        }
    }

    let grid = acc.into_grid();
    info!(
        "Extraction finished: {} of {} cells have data, range {:?}",
        grid.resolved_count(),
        grid.shape().len(),
        grid.observed_range()
    );

    Ok(Extraction {
        grid,
        tiles_read,
        failures,
    })
}
