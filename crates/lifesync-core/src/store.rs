//! The authoritative grid.
//!
//! [`GridStore`] owns the only mutable copy of the cell matrix. Every
//! mutation takes `&mut self`, so whoever owns the store (the session hub
//! actor in the server) is the single mutual-exclusion boundary: a client
//! toggle and a simulation tick can never interleave partial writes.
//! Readers get owned copies through [`GridStore::snapshot`].

use lifesync_types::Grid;
use rand::Rng;

/// Errors returned by grid mutations. The grid is unchanged whenever one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    /// A coordinate lies outside `[0, cols) x [0, rows)`.
    #[error("cell ({x}, {y}) is outside the {cols}x{rows} grid")]
    OutOfBounds {
        /// Requested column.
        x: i64,
        /// Requested row.
        y: i64,
        /// Grid width.
        cols: usize,
        /// Grid height.
        rows: usize,
    },

    /// A replacement grid has a different shape.
    #[error("grid is {found_rows}x{found_cols}, expected {rows}x{cols}")]
    DimensionMismatch {
        /// Configured rows.
        rows: usize,
        /// Configured columns.
        cols: usize,
        /// Rows of the rejected grid.
        found_rows: usize,
        /// Columns of the rejected grid.
        found_cols: usize,
    },

    /// Randomization density outside `[0, 1]`.
    #[error("density {0} is outside [0, 1]")]
    InvalidDensity(f64),
}

/// Owner of the live grid.
#[derive(Debug, Clone)]
pub struct GridStore {
    grid: Grid,
}

impl GridStore {
    /// Create a store holding an all-dead `rows x cols` grid.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            grid: Grid::new(rows, cols),
        }
    }

    /// Create a store seeded with `grid`. Its shape becomes the fixed
    /// shape of the store.
    pub const fn from_grid(grid: Grid) -> Self {
        Self { grid }
    }

    /// Configured number of rows.
    pub const fn rows(&self) -> usize {
        self.grid.rows()
    }

    /// Configured number of columns.
    pub const fn cols(&self) -> usize {
        self.grid.cols()
    }

    /// Borrow the live grid read-only.
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Owned copy of the current state, safe to send or persist while the
    /// store keeps changing.
    pub fn snapshot(&self) -> Grid {
        self.grid.clone()
    }

    /// Live cells in the current grid.
    pub fn population(&self) -> usize {
        self.grid.population()
    }

    /// Flip the cell at `(x, y)` and return its new state.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if either coordinate is negative
    /// or past the edge.
    pub fn toggle(&mut self, x: i64, y: i64) -> Result<bool, GridError> {
        let (cols, rows) = (self.grid.cols(), self.grid.rows());
        usize::try_from(x)
            .ok()
            .zip(usize::try_from(y).ok())
            .and_then(|(col, row)| self.grid.flip(col, row))
            .ok_or(GridError::OutOfBounds { x, y, cols, rows })
    }

    /// Replace the whole grid at once.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if `new_grid` is not
    /// `rows x cols`.
    pub fn set_grid(&mut self, new_grid: Grid) -> Result<(), GridError> {
        if !self.grid.same_shape(&new_grid) {
            return Err(GridError::DimensionMismatch {
                rows: self.grid.rows(),
                cols: self.grid.cols(),
                found_rows: new_grid.rows(),
                found_cols: new_grid.cols(),
            });
        }
        self.grid = new_grid;
        Ok(())
    }

    /// Kill every cell.
    pub fn clear(&mut self) {
        self.grid.fill(false);
    }

    /// Make each cell alive independently with probability `density`.
    ///
    /// Pass a seeded RNG for reproducible grids.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidDensity`] if `density` is NaN or outside
    /// `[0, 1]`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, density: f64, rng: &mut R) -> Result<(), GridError> {
        if !(0.0..=1.0).contains(&density) {
            return Err(GridError::InvalidDensity(density));
        }
        for cell in self.grid.cells_mut() {
            *cell = rng.random_bool(density);
        }
        Ok(())
    }
}
