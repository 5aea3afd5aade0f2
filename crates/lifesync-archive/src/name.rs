//! Pattern name validation.
//!
//! Names come straight from client prompts and end up as file names, so
//! they are checked once here and carried as [`PatternName`] afterwards.

use crate::error::ArchiveError;

/// Longest accepted name, in UTF-8 bytes. Leaves room for the `.json`
/// suffix and the temporary-file affixes within a 255-byte file name.
pub const MAX_NAME_BYTES: usize = 200;

/// A validated pattern name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternName(String);

impl PatternName {
    /// Validate `raw`.
    ///
    /// Surrounding whitespace is not trimmed: `" glider"` and `"glider"`
    /// are different names, but a name made only of whitespace is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidName`] if the name is blank, too
    /// long, starts with `.`, or contains a path separator or control
    /// character.
    pub fn parse(raw: &str) -> Result<Self, ArchiveError> {
        let invalid = |reason| ArchiveError::InvalidName {
            name: raw.to_owned(),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if raw.len() > MAX_NAME_BYTES {
            return Err(invalid("name is longer than 200 bytes"));
        }
        if raw.starts_with('.') {
            return Err(invalid("name may not start with '.'"));
        }
        if raw.chars().any(|c| matches!(c, '/' | '\\') || c.is_control()) {
            return Err(invalid("name may not contain path separators or control characters"));
        }
        Ok(Self(raw.to_owned()))
    }

    /// The name as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name used by the file backend.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl core::fmt::Display for PatternName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
