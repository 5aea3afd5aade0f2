//! The persisted form of a pattern.

use chrono::{DateTime, Utc};
use lifesync_types::{Grid, PatternSummary};
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;
use crate::name::PatternName;

/// A named, immutable grid snapshot with metadata.
///
/// This is also the on-disk JSON layout of the file backend:
///
/// ```json
/// {"name": "blinker", "rows": 5, "cols": 5,
///  "saved_at": "2026-01-01T00:00:00Z", "cells": [[0, 0, 1, 0, 0], ...]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRecord {
    /// Pattern name.
    pub name: String,
    /// Rows of `cells`, repeated for readers that skip the matrix.
    pub rows: usize,
    /// Columns of `cells`.
    pub cols: usize,
    /// When the record was written.
    pub saved_at: DateTime<Utc>,
    /// The grid, `cells[y][x]`.
    pub cells: Grid,
}

impl PatternRecord {
    /// Build a record stamped with the current time.
    pub fn new(name: &PatternName, grid: Grid) -> Self {
        Self {
            name: name.as_str().to_owned(),
            rows: grid.rows(),
            cols: grid.cols(),
            saved_at: Utc::now(),
            cells: grid,
        }
    }

    /// Check that the header agrees with the matrix and the expected name.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Corrupt`] on any disagreement.
    pub fn verify(&self, expected: &PatternName) -> Result<(), ArchiveError> {
        if self.name != expected.as_str() {
            return Err(ArchiveError::Corrupt {
                name: expected.as_str().to_owned(),
                reason: format!("record is named {:?}", self.name),
            });
        }
        if self.rows != self.cells.rows() || self.cols != self.cells.cols() {
            return Err(ArchiveError::Corrupt {
                name: expected.as_str().to_owned(),
                reason: format!(
                    "header says {}x{} but cells are {}x{}",
                    self.rows,
                    self.cols,
                    self.cells.rows(),
                    self.cells.cols()
                ),
            });
        }
        Ok(())
    }

    /// Listing entry for this record.
    pub fn summary(&self) -> PatternSummary {
        PatternSummary {
            name: self.name.clone(),
            rows: u32::try_from(self.rows).unwrap_or(u32::MAX),
            cols: u32::try_from(self.cols).unwrap_or(u32::MAX),
            population: u64::try_from(self.cells.population()).unwrap_or(u64::MAX),
            saved_at: self.saved_at,
        }
    }
}
