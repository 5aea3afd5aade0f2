//! Crash-safe file backend.
//!
//! Each pattern is one JSON file `<dir>/<name>.json` holding a
//! [`PatternRecord`]. A save writes the whole record to a hidden temp file
//! in the same directory, syncs it, then renames it over the target. A
//! crash at any point leaves either the old file or the new one, never a
//! torn write. Leftover temp files are removed when the store is opened.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lifesync_types::{Grid, PatternSummary};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ArchiveError;
use crate::name::PatternName;
use crate::record::PatternRecord;
use crate::store::PatternStore;

const TEMP_SUFFIX: &str = ".tmp";
const RECORD_EXTENSION: &str = "json";

/// Pattern store backed by one JSON file per pattern.
#[derive(Debug, Clone)]
pub struct FilePatternStore {
    dir: PathBuf,
}

impl FilePatternStore {
    /// Open (creating if needed) the store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`] if the directory cannot be created or
    /// read.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let store = Self { dir };
        let removed = store.remove_stale_temp_files()?;
        info!(
            directory = %store.dir.display(),
            stale_temp_files = removed,
            "Pattern archive opened"
        );
        Ok(store)
    }

    /// Directory holding the pattern files.
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &PatternName) -> PathBuf {
        self.dir.join(name.file_name())
    }

    fn remove_stale_temp_files(&self) -> Result<usize, ArchiveError> {
        let mut removed: usize = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with('.') && file_name.ends_with(TEMP_SUFFIX) {
                warn!(file = file_name, "Removing interrupted pattern write");
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!(file = file_name, error = %e, "Could not remove temp file");
                } else {
                    removed = removed.saturating_add(1);
                }
            }
        }
        Ok(removed)
    }

    fn read_record(&self, name: &PatternName) -> Result<PatternRecord, ArchiveError> {
        let bytes = match fs::read(self.path_for(name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArchiveError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let record: PatternRecord =
            serde_json::from_slice(&bytes).map_err(|e| ArchiveError::Corrupt {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        record.verify(name)?;
        Ok(record)
    }

    fn write_atomically(&self, name: &PatternName, bytes: &[u8]) -> Result<(), ArchiveError> {
        let target = self.path_for(name);
        let temp = self
            .dir
            .join(format!(".{name}.{}{TEMP_SUFFIX}", Uuid::new_v4().simple()));

        if let Err(e) = write_and_rename(&temp, &target, bytes) {
            // The target is untouched; only the temp file may be left over.
            match fs::remove_file(&temp) {
                Err(cleanup) if cleanup.kind() != io::ErrorKind::NotFound => {
                    warn!(file = %temp.display(), error = %cleanup, "Could not remove temp file");
                }
                _ => {}
            }
            return Err(e.into());
        }

        sync_dir(&self.dir);
        Ok(())
    }
}

fn write_and_rename(temp: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(temp, target)
}

/// Persist the rename itself. Not every platform supports syncing a
/// directory handle, so failures are only logged.
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(directory = %dir.display(), error = %e, "Directory sync skipped");
    }
}

impl PatternStore for FilePatternStore {
    fn save(&self, name: &str, grid: &Grid) -> Result<PatternSummary, ArchiveError> {
        let name = PatternName::parse(name)?;
        let record = PatternRecord::new(&name, grid.clone());
        let bytes = serde_json::to_vec(&record)?;
        self.write_atomically(&name, &bytes)?;
        debug!(pattern = %name, bytes = bytes.len(), "Pattern written");
        Ok(record.summary())
    }

    fn load(&self, name: &str) -> Result<Grid, ArchiveError> {
        let name = PatternName::parse(name)?;
        Ok(self.read_record(&name)?.cells)
    }

    fn list(&self) -> Result<Vec<PatternSummary>, ArchiveError> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(name) = PatternName::parse(stem) else {
                continue;
            };
            match self.read_record(&name) {
                Ok(record) => summaries.push(record.summary()),
                Err(e) => warn!(pattern = %name, error = %e, "Skipping unreadable pattern"),
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    fn delete(&self, name: &str) -> Result<(), ArchiveError> {
        let name = PatternName::parse(name)?;
        match fs::remove_file(self.path_for(&name)) {
            Ok(()) => {
                sync_dir(&self.dir);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ArchiveError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
