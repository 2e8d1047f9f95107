//! The mesh elevation grid.
//!
//! The grid is built in two stages. A [`GridAccumulator`] collects DEM
//! samples into cells; [`GridAccumulator::into_grid`] reduces each cell to
//! its average and hands back an [`ElevationGrid`], which is what gap
//! filling and mesh generation work on. Cell `(row, col)` lives at index
//! `row * cols + col`; row 0 is the southern edge and column 0 the western
//! edge.

use demstl_dem::BoundingBox;

/// Dimensions of a grid and the geographic size of its cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridShape {
    /// Number of rows (south to north).
    pub rows: usize,
    /// Number of columns (west to east).
    pub cols: usize,
    /// Mesh distance between adjacent cells.
    pub resolution: f64,
    /// Latitude span of one cell in degrees.
    pub cell_height: f64,
    /// Longitude span of one cell in degrees.
    pub cell_width: f64,
}

impl GridShape {
    /// Shape for `rows × cols` cells over `bounds`.
    pub fn new(bounds: &BoundingBox, rows: usize, cols: usize, resolution: f64) -> Self {
        Self {
            rows,
            cols,
            resolution,
            cell_height: bounds.height() / rows as f64,
            cell_width: bounds.width() / cols as f64,
        }
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat index of `(row, col)`.
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }
}

/// Which scan pass produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanAxis {
    /// Along a row (west to east).
    Horizontal,
    /// Along a column (south to north).
    Vertical,
}

/// One cell of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationCell {
    x: f32,
    y: f32,
    bounds: BoundingBox,
    sum: f64,
    count: u32,
    elevation: Option<f32>,
    vertical_scan: Option<f32>,
    horizontal_scan: Option<f32>,
    use_baseline: bool,
}

impl ElevationCell {
    fn new(x: f32, y: f32, bounds: BoundingBox) -> Self {
        Self {
            x,
            y,
            bounds,
            sum: 0.0,
            count: 0,
            elevation: None,
            vertical_scan: None,
            horizontal_scan: None,
            use_baseline: false,
        }
    }

    /// Mesh X coordinate.
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Mesh Y coordinate.
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Geographic area the cell covers.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// `(lat, lon)` of the cell center.
    pub fn center(&self) -> (f64, f64) {
        self.bounds.center()
    }

    /// Sum of the samples that fell in the cell.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Number of samples that fell in the cell.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Resolved elevation, if any.
    pub fn elevation(&self) -> Option<f32> {
        self.elevation
    }

    /// Estimate from the column scan.
    pub fn vertical_scan_elevation(&self) -> Option<f32> {
        self.vertical_scan
    }

    /// Estimate from the row scan.
    pub fn horizontal_scan_elevation(&self) -> Option<f32> {
        self.horizontal_scan
    }

    /// Whether the cell renders at the base thickness.
    pub fn use_baseline(&self) -> bool {
        self.use_baseline
    }

    /// Neither resolved nor baseline.
    pub fn is_unknown(&self) -> bool {
        self.elevation.is_none() && !self.use_baseline
    }

    fn add_sample(&mut self, value: f32) {
        self.sum += f64::from(value);
        self.count += 1;
    }

    pub(crate) fn set_scan(&mut self, axis: ScanAxis, value: f32) {
        match axis {
            ScanAxis::Horizontal => self.horizontal_scan = Some(value),
            ScanAxis::Vertical => self.vertical_scan = Some(value),
        }
    }

    pub(crate) fn resolve(&mut self, elevation: f32) {
        debug_assert!(self.is_unknown(), "cell resolved twice");
        self.elevation = Some(elevation);
    }

    pub(crate) fn mark_baseline(&mut self) {
        debug_assert!(self.elevation.is_none(), "baseline set on a resolved cell");
        self.use_baseline = true;
    }
}

/// Collects DEM samples into grid cells.
///
/// # Example
///
/// ```
/// use demstl_dem::BoundingBox;
/// use demstl_mesh::GridAccumulator;
///
/// let bounds = BoundingBox::new(2.0, 0.0, 2.0, 0.0)?;
/// let mut acc = GridAccumulator::new(bounds, 2, 2, 1.0);
/// acc.accumulate(0, 0, 10.0);
/// acc.accumulate(0, 0, 20.0);
///
/// let grid = acc.into_grid();
/// assert_eq!(grid.cell(0, 0).elevation(), Some(15.0));
/// assert_eq!(grid.cell(1, 1).elevation(), None);
/// # Ok::<(), demstl_dem::DemError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GridAccumulator {
    bounds: BoundingBox,
    shape: GridShape,
    cells: Vec<ElevationCell>,
    min_elevation: Option<f32>,
    max_elevation: Option<f32>,
}

impl GridAccumulator {
    /// Empty grid of `rows × cols` cells over `bounds`, `resolution` mesh
    /// units apart.
    ///
    /// # Panics
    ///
    /// Panics if `rows` or `cols` is zero.
    pub fn new(bounds: BoundingBox, rows: usize, cols: usize, resolution: f64) -> Self {
        assert!(rows > 0 && cols > 0, "grid needs at least one cell");
        let shape = GridShape::new(&bounds, rows, cols, resolution);

        let mut cells = Vec::with_capacity(shape.len());
        for row in 0..rows {
            let south = bounds.south + row as f64 * shape.cell_height;
            for col in 0..cols {
                let west = bounds.west + col as f64 * shape.cell_width;
                let cell_bounds = BoundingBox {
                    north: south + shape.cell_height,
                    south,
                    east: west + shape.cell_width,
                    west,
                };
                cells.push(ElevationCell::new(
                    (col as f64 * resolution) as f32,
                    (row as f64 * resolution) as f32,
                    cell_bounds,
                ));
            }
        }

        Self {
            bounds,
            shape,
            cells,
            min_elevation: None,
            max_elevation: None,
        }
    }

    /// Grid area.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Grid dimensions.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Area to read samples from: the grid bounds plus one cell on each side.
    pub fn read_bounds(&self) -> BoundingBox {
        self.bounds
            .expanded(self.shape.cell_height, self.shape.cell_width)
    }

    /// Lowest and highest valid sample seen so far.
    pub fn observed_range(&self) -> Option<(f32, f32)> {
        self.min_elevation.zip(self.max_elevation)
    }

    /// Add `value` to cell `(row, col)` and to the observed range.
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside the grid.
    pub fn accumulate(&mut self, row: usize, col: usize, value: f32) {
        assert!(row < self.shape.rows && col < self.shape.cols);
        self.observe(value);
        let index = self.shape.index(row, col);
        self.cells[index].add_sample(value);
    }

    /// Add a sample covering the given geographic strip to every cell it
    /// overlaps, inclusive at both ends. Returns the number of cells touched.
    ///
    /// The sample counts toward the observed range even when it lands in no
    /// cell.
    pub fn add_sample(&mut self, north: f64, south: f64, west: f64, east: f64, value: f32) -> usize {
        self.observe(value);

        let shape = self.shape;
        let (start_row, end_row) = cell_span(south, north, self.bounds.south, shape.cell_height, shape.rows);
        let (start_col, end_col) = cell_span(west, east, self.bounds.west, shape.cell_width, shape.cols);

        let mut touched = 0;
        for row in start_row..end_row {
            for col in start_col..end_col {
                let index = shape.index(row, col);
                self.cells[index].add_sample(value);
                touched += 1;
            }
        }
        touched
    }

    /// Reduce every cell to its average and finish the grid.
    ///
    /// Cells without samples stay unresolved.
    pub fn into_grid(self) -> ElevationGrid {
        let mut cells = self.cells;
        for cell in &mut cells {
            if cell.count > 0 {
                cell.elevation = Some((cell.sum / f64::from(cell.count)) as f32);
            }
        }
        ElevationGrid {
            bounds: self.bounds,
            shape: self.shape,
            cells,
            min_elevation: self.min_elevation,
            max_elevation: self.max_elevation,
        }
    }

    fn observe(&mut self, value: f32) {
        self.min_elevation = Some(self.min_elevation.map_or(value, |m| m.min(value)));
        self.max_elevation = Some(self.max_elevation.map_or(value, |m| m.max(value)));
    }
}

/// Half-open range of cell indices touched by the strip `[low, high]` along
/// one axis starting at `origin` with cells `step` wide.
///
/// Both ends are inclusive after rounding the start down and the end up, so
/// a sample also feeds the cell just past its far edge.
fn cell_span(low: f64, high: f64, origin: f64, step: f64, count: usize) -> (usize, usize) {
    let start = ((low - origin) / step).floor() as i64;
    let end = ((high - origin) / step).ceil() as i64;
    let start = start.max(0);
    let end = end.min(count as i64 - 1);
    if end < start {
        return (0, 0);
    }
    (start as usize, end as usize + 1)
}

/// Grid of reduced cells, ready for gap filling and meshing.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    bounds: BoundingBox,
    shape: GridShape,
    cells: Vec<ElevationCell>,
    min_elevation: Option<f32>,
    max_elevation: Option<f32>,
}

impl ElevationGrid {
    /// Grid area.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Grid dimensions.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.shape.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.shape.cols
    }

    /// Cell `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside the grid.
    pub fn cell(&self, row: usize, col: usize) -> &ElevationCell {
        assert!(row < self.shape.rows && col < self.shape.cols);
        &self.cells[self.shape.index(row, col)]
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[ElevationCell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [ElevationCell] {
        &mut self.cells
    }

    /// Lowest and highest valid sample read while building the grid.
    pub fn observed_range(&self) -> Option<(f32, f32)> {
        self.min_elevation.zip(self.max_elevation)
    }

    /// Number of cells with an elevation.
    pub fn resolved_count(&self) -> usize {
        self.cells.iter().filter(|c| c.elevation.is_some()).count()
    }

    /// Number of baseline cells.
    pub fn baseline_count(&self) -> usize {
        self.cells.iter().filter(|c| c.use_baseline).count()
    }
}
