//! The cell matrix shared by the store, the engine, the archive, and the
//! wire protocol.
//!
//! A [`Grid`] is a fixed `rows x cols` matrix of alive/dead cells stored
//! row-major in a flat `Vec<bool>`. Coordinates follow the wire
//! convention: `x` is the column, `y` is the row, and the serialized form
//! is `data[y][x]`.
//!
//! On the wire (and in pattern files) a grid is a 2-D JSON array of `0`
//! and `1`. Deserialization goes through [`Grid::from_rows`], so ragged
//! rows, empty matrices, and values other than `0`/`1` are rejected.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

/// Errors raised when building a [`Grid`] from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridShapeError {
    /// The matrix has no rows or no columns.
    #[error("grid must have at least one row and one column")]
    Empty,

    /// A row has a different length from the first row.
    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        /// Index of the offending row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        found: usize,
    },

    /// A cell value other than `0` or `1`.
    #[error("cell ({x}, {y}) has value {value}, expected 0 or 1")]
    InvalidCell {
        /// Column of the offending cell.
        x: usize,
        /// Row of the offending cell.
        y: usize,
        /// The rejected value.
        value: u8,
    },

    /// The flat cell buffer does not match `rows * cols`.
    #[error("expected {expected} cells for the given dimensions, found {found}")]
    CellCount {
        /// `rows * cols`.
        expected: usize,
        /// Length of the supplied buffer.
        found: usize,
    },

    /// An ASCII fixture contained a character other than `.`, `#`, `0`, `1`.
    #[error("unexpected character {0:?} in grid text")]
    InvalidChar(char),
}

/// A fixed-size matrix of binary cell states.
///
/// Dimensions never change after construction. Every accessor is
/// bounds-checked and returns `None` (or `false`) instead of panicking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>")]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl Grid {
    /// Create an all-dead grid.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![false; rows.saturating_mul(cols)],
        }
    }

    /// Build a grid from a flat row-major cell buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GridShapeError::Empty`] for zero dimensions and
    /// [`GridShapeError::CellCount`] when the buffer length is wrong.
    pub fn from_cells(rows: usize, cols: usize, cells: Vec<bool>) -> Result<Self, GridShapeError> {
        if rows == 0 || cols == 0 {
            return Err(GridShapeError::Empty);
        }
        let expected = rows.saturating_mul(cols);
        if cells.len() != expected {
            return Err(GridShapeError::CellCount {
                expected,
                found: cells.len(),
            });
        }
        Ok(Self { rows, cols, cells })
    }

    /// Build a grid from row vectors of `0`/`1`, the wire representation.
    ///
    /// # Errors
    ///
    /// Returns a [`GridShapeError`] if the matrix is empty, ragged, or
    /// contains a value other than `0` or `1`.
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, GridShapeError> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.is_empty() || cols == 0 {
            return Err(GridShapeError::Empty);
        }
        let height = rows.len();
        let mut cells = Vec::with_capacity(height.saturating_mul(cols));
        for (y, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(GridShapeError::Ragged {
                    row: y,
                    expected: cols,
                    found: row.len(),
                });
            }
            for (x, value) in row.into_iter().enumerate() {
                match value {
                    0 => cells.push(false),
                    1 => cells.push(true),
                    other => return Err(GridShapeError::InvalidCell { x, y, value: other }),
                }
            }
        }
        Ok(Self {
            rows: height,
            cols,
            cells,
        })
    }

    /// Parse a text picture of a grid, one line per row.
    ///
    /// `#` or `1` is alive, `.` or `0` is dead. Blank lines and
    /// surrounding whitespace are ignored, which keeps fixtures readable:
    ///
    /// ```
    /// use lifesync_types::Grid;
    ///
    /// let blinker = Grid::from_ascii(
    ///     "
    ///     .....
    ///     ..#..
    ///     ..#..
    ///     ..#..
    ///     .....
    ///     ",
    /// )
    /// .unwrap();
    /// assert_eq!(blinker.population(), 3);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`GridShapeError`] for unknown characters or an
    /// inconsistent shape.
    pub fn from_ascii(text: &str) -> Result<Self, GridShapeError> {
        let mut rows = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let mut row = Vec::with_capacity(line.len());
            for ch in line.chars() {
                match ch {
                    '#' | '1' => row.push(1),
                    '.' | '0' => row.push(0),
                    other => return Err(GridShapeError::InvalidChar(other)),
                }
            }
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    /// Number of rows (the `y` extent).
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (the `x` extent).
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Whether `other` has exactly the same dimensions.
    pub const fn same_shape(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    /// Flat index of `(x, y)`, or `None` when out of range.
    pub fn index_of(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        y.checked_mul(self.cols)?.checked_add(x)
    }

    /// State of the cell at `(x, y)`, or `None` when out of range.
    pub fn get(&self, x: usize, y: usize) -> Option<bool> {
        self.index_of(x, y)
            .and_then(|idx| self.cells.get(idx).copied())
    }

    /// Whether the cell at `(x, y)` is alive. Out-of-range cells are dead.
    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.get(x, y).unwrap_or(false)
    }

    /// Set the cell at `(x, y)`. Returns `false` if out of range.
    pub fn set(&mut self, x: usize, y: usize, alive: bool) -> bool {
        let Some(idx) = self.index_of(x, y) else {
            return false;
        };
        match self.cells.get_mut(idx) {
            Some(cell) => {
                *cell = alive;
                true
            }
            None => false,
        }
    }

    /// Flip the cell at `(x, y)` and return its new state.
    pub fn flip(&mut self, x: usize, y: usize) -> Option<bool> {
        let idx = self.index_of(x, y)?;
        let cell = self.cells.get_mut(idx)?;
        *cell = !*cell;
        Some(*cell)
    }

    /// Set every cell to `alive`.
    pub fn fill(&mut self, alive: bool) {
        self.cells.fill(alive);
    }

    /// Number of live cells.
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Mutable access to the flat row-major buffer.
    ///
    /// The length is fixed; callers may only change cell values.
    pub fn cells_mut(&mut self) -> &mut [bool] {
        &mut self.cells
    }

    /// Iterate over rows as slices.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[bool]> {
        self.cells.chunks(self.cols.max(1))
    }

    /// Convert to row vectors of `0`/`1`.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.iter_rows()
            .map(|row| row.iter().map(|c| u8::from(*c)).collect())
            .collect()
    }
}

impl TryFrom<Vec<Vec<u8>>> for Grid {
    type Error = GridShapeError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

/// One row serialized as a sequence of `0`/`1` without an intermediate
/// allocation.
struct RowRef<'a>(&'a [bool]);

impl Serialize for RowRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for cell in self.0 {
            seq.serialize_element(&u8::from(*cell))?;
        }
        seq.end()
    }
}

impl Serialize for Grid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows))?;
        for row in self.iter_rows() {
            seq.serialize_element(&RowRef(row))?;
        }
        seq.end()
    }
}
