//! Metadata describing a saved pattern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Listing entry for one archived pattern. The cells themselves are only
/// transferred by `load`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PatternSummary {
    /// Unique pattern name.
    pub name: String,
    /// Number of rows in the stored grid.
    pub rows: u32,
    /// Number of columns in the stored grid.
    pub cols: u32,
    /// Live cells in the stored grid.
    pub population: u64,
    /// When the pattern was last written.
    pub saved_at: DateTime<Utc>,
}
