// src/source/mod.rs
use glob::MatchOptions;

use crate::error::Result;
use crate::pattern::Location;

pub mod gcs;
pub mod local;
pub mod memory;

pub use gcs::GcsSource;
pub use local::LocalSource;
pub use memory::MemorySource;

/// A place objects can be listed by glob pattern and read whole.
pub trait ObjectSource: Send + Sync {
    /// Keys matching `pattern`, sorted. `*` does not cross `/`.
    fn list(&self, pattern: &str) -> Result<Vec<String>>;

    /// Full contents of the object at `key` (as returned by `list`).
    fn fetch(&self, key: &str) -> Result<Vec<u8>>;
}

/// Pick the backend for a resolved wildcard pattern.
pub fn source_for(location: &Location) -> Result<Box<dyn ObjectSource>> {
    match location {
        Location::Gcs { bucket, .. } => Ok(Box::new(GcsSource::connect(bucket.clone())?)),
        Location::Local(_) => Ok(Box::new(LocalSource)),
    }
}

pub(crate) fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}
