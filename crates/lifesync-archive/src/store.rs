//! The [`PatternStore`] trait and its in-memory backend.
//!
//! Store methods are synchronous and may block (the file backend does
//! disk I/O). Async callers run them on the blocking pool, e.g. with
//! `tokio::task::spawn_blocking`, so they stay off the tick path.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use lifesync_types::{Grid, PatternSummary};

use crate::error::ArchiveError;
use crate::name::PatternName;
use crate::record::PatternRecord;

/// A mapping from unique pattern names to grid snapshots.
pub trait PatternStore: Send + Sync {
    /// Persist `grid` under `name`, replacing any previous pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidName`] for an unusable name, or a
    /// storage error if the write fails. A failed save leaves any
    /// previous pattern under `name` intact.
    fn save(&self, name: &str, grid: &Grid) -> Result<PatternSummary, ArchiveError>;

    /// Fetch the grid stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::NotFound`] if nothing is stored under
    /// `name`, or a storage error if the read fails.
    fn load(&self, name: &str) -> Result<Grid, ArchiveError>;

    /// Summaries of every stored pattern, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing cannot be read.
    fn list(&self) -> Result<Vec<PatternSummary>, ArchiveError>;

    /// Remove the pattern stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::NotFound`] if nothing is stored under
    /// `name`.
    fn delete(&self, name: &str) -> Result<(), ArchiveError>;
}

/// Process-local store. Patterns are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryPatternStore {
    records: RwLock<BTreeMap<PatternName, PatternRecord>>,
}

impl MemoryPatternStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatternStore for MemoryPatternStore {
    fn save(&self, name: &str, grid: &Grid) -> Result<PatternSummary, ArchiveError> {
        let name = PatternName::parse(name)?;
        let record = PatternRecord::new(&name, grid.clone());
        let summary = record.summary();
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, record);
        Ok(summary)
    }

    fn load(&self, name: &str) -> Result<Grid, ArchiveError> {
        let name = PatternName::parse(name)?;
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .map(|record| record.cells.clone())
            .ok_or_else(|| ArchiveError::NotFound(name.to_string()))
    }

    fn list(&self) -> Result<Vec<PatternSummary>, ArchiveError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(PatternRecord::summary)
            .collect())
    }

    fn delete(&self, name: &str) -> Result<(), ArchiveError> {
        let name = PatternName::parse(name)?;
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name)
            .map(|_| ())
            .ok_or_else(|| ArchiveError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn glider() -> Grid {
        Grid::from_ascii(".#..\n..#.\n###.\n....").unwrap()
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = MemoryPatternStore::new();
        let summary = store.save("p1", &glider()).unwrap();
        assert_eq!(summary.name, "p1");
        assert_eq!(summary.population, 5);
        assert_eq!(store.load("p1").unwrap(), glider());
    }

    #[test]
    fn save_overwrites() {
        let store = MemoryPatternStore::new();
        store.save("p", &glider()).unwrap();
        store.save("p", &Grid::new(4, 4)).unwrap();
        assert_eq!(store.load("p").unwrap().population(), 0);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn load_missing_is_not_found() {
        let store = MemoryPatternStore::new();
        assert!(matches!(store.load("nope"), Err(ArchiveError::NotFound(n)) if n == "nope"));
    }

    #[test]
    fn empty_name_is_invalid() {
        let store = MemoryPatternStore::new();
        assert!(matches!(store.save("", &glider()), Err(ArchiveError::InvalidName { .. })));
    }

    #[test]
    fn list_is_sorted_and_delete_removes() {
        let store = MemoryPatternStore::new();
        store.save("b", &glider()).unwrap();
        store.save("a", &glider()).unwrap();
        let names: Vec<_> = store.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        store.delete("a").unwrap();
        assert!(matches!(store.load("a"), Err(ArchiveError::NotFound(_))));
        assert!(matches!(store.delete("a"), Err(ArchiveError::NotFound(_))));
    }

    #[test]
    fn stored_grid_is_a_copy() {
        let store = MemoryPatternStore::new();
        let mut grid = glider();
        store.save("g", &grid).unwrap();
        grid.fill(true);
        assert_eq!(store.load("g").unwrap(), glider());
    }
}
