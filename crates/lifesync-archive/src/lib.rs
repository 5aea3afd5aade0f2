//! Named pattern persistence for the Lifesync server.
//!
//! A pattern is an immutable grid snapshot stored under a unique name.
//! Two backends implement [`PatternStore`]:
//!
//! - [`FilePatternStore`] writes one JSON file per pattern with an atomic
//!   temp-file-and-rename protocol, so a crash mid-save never corrupts a
//!   previously saved pattern.
//! - [`MemoryPatternStore`] keeps patterns in process memory.

pub mod error;
pub mod file;
pub mod name;
pub mod record;
pub mod store;

pub use error::ArchiveError;
pub use file::FilePatternStore;
pub use name::PatternName;
pub use record::PatternRecord;
pub use store::{MemoryPatternStore, PatternStore};
