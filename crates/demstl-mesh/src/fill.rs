//! Filling cells that got no DEM samples.
//!
//! Each row (west to east) and each column (south to north) is scanned for
//! runs of unknown land cells. A run bounded by resolved cells is linearly
//! interpolated; a run open at one end takes the value of the known end.
//! Row and column estimates are kept apart and averaged at the end. Cells
//! that are not land, or that neither scan could estimate, render at the
//! base thickness.

use crate::grid::{ElevationGrid, ScanAxis};
use crate::land::LandClassifier;
use serde::Serialize;
use tracing::{debug, info};

/// How the cells of a grid were resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillStats {
    /// Cells averaged from DEM samples.
    pub averaged: usize,
    /// Cells resolved from scan estimates.
    pub interpolated: usize,
    /// Cells rendered at the base thickness.
    pub baseline: usize,
    /// Land mask lookups made.
    pub land_lookups: usize,
}

/// Memoized land classification of grid cells.
struct LandCache<'a> {
    classifier: &'a dyn LandClassifier,
    known: Vec<Option<bool>>,
    lookups: usize,
}

impl<'a> LandCache<'a> {
    fn new(classifier: &'a dyn LandClassifier, cells: usize) -> Self {
        Self {
            classifier,
            known: vec![None; cells],
            lookups: 0,
        }
    }

    fn is_land(&mut self, grid: &ElevationGrid, index: usize) -> bool {
        if let Some(land) = self.known[index] {
            return land;
        }
        let (lat, lon) = grid.cells()[index].center();
        let land = self.classifier.is_land(lon, lat);
        self.known[index] = Some(land);
        self.lookups += 1;
        land
    }
}

/// Resolve every unknown cell of `grid`.
///
/// Afterwards each cell either has an elevation or is a baseline cell.
pub fn fill_gaps(grid: &mut ElevationGrid, land: &dyn LandClassifier) -> FillStats {
    let shape = grid.shape();
    let averaged = grid.resolved_count();
    let mut cache = LandCache::new(land, shape.len());

    for row in 0..shape.rows {
        let line: Vec<usize> = (0..shape.cols).map(|col| shape.index(row, col)).collect();
        scan_line(grid, &line, ScanAxis::Horizontal, &mut cache);
    }
    for col in 0..shape.cols {
        let line: Vec<usize> = (0..shape.rows).map(|row| shape.index(row, col)).collect();
        scan_line(grid, &line, ScanAxis::Vertical, &mut cache);
    }
    debug!("Scans done with {} land lookups", cache.lookups);

    let mut interpolated = 0;
    for cell in grid.cells_mut() {
        if !cell.is_unknown() {
            continue;
        }
        let horizontal = cell.horizontal_scan_elevation();
        let vertical = cell.vertical_scan_elevation();
        match (horizontal, vertical) {
            (Some(h), Some(v)) => cell.resolve((h + v) / 2.0),
            (Some(e), None) | (None, Some(e)) => cell.resolve(e),
            (None, None) => {
                cell.mark_baseline();
                continue;
            }
        }
        interpolated += 1;
    }

    let stats = FillStats {
        averaged,
        interpolated,
        baseline: grid.baseline_count(),
        land_lookups: cache.lookups,
    };
    info!(
        "Filled grid: {} averaged, {} interpolated, {} baseline",
        stats.averaged, stats.interpolated, stats.baseline
    );
    stats
}

/// Scan one row or column, given as cell indices in scan order.
fn scan_line(grid: &mut ElevationGrid, line: &[usize], axis: ScanAxis, cache: &mut LandCache) {
    let mut run_start: Option<usize> = None;

    for (pos, &index) in line.iter().enumerate() {
        let cell = &grid.cells()[index];
        if cell.elevation().is_some() {
            if let Some(start) = run_start.take() {
                fill_run(grid, line, start, Some(pos), axis);
            }
        } else if cell.use_baseline() {
            run_start = None;
        } else if !cache.is_land(grid, index) {
            grid.cells_mut()[index].mark_baseline();
            run_start = None;
        } else if run_start.is_none() {
            run_start = Some(pos);
        }
    }

    if let Some(start) = run_start {
        fill_run(grid, line, start, None, axis);
    }
}

/// Estimate `line[start..end]` from the resolved cells just outside it.
fn fill_run(
    grid: &mut ElevationGrid,
    line: &[usize],
    start: usize,
    end: Option<usize>,
    axis: ScanAxis,
) {
    let first = start
        .checked_sub(1)
        .and_then(|pos| Some((pos, grid.cells()[line[pos]].elevation()?)));
    let last = end.and_then(|pos| Some((pos, grid.cells()[line[pos]].elevation()?)));
    if first.is_none() && last.is_none() {
        return;
    }

    for pos in start..end.unwrap_or(line.len()) {
        let value = match (first, last) {
            (Some((i0, e0)), Some((i1, e1))) => interpolate(i0, e0, i1, e1, pos),
            (Some((_, e0)), None) => e0,
            (None, Some((_, e1))) => e1,
            (None, None) => return,
        };
        grid.cells_mut()[line[pos]].set_scan(axis, value);
    }
}

fn interpolate(i0: usize, e0: f32, i1: usize, e1: f32, pos: usize) -> f32 {
    let slope = (f64::from(e1) - f64::from(e0)) / (i1 as f64 - i0 as f64);
    (f64::from(e0) + slope * (pos as f64 - i0 as f64)) as f32
}
