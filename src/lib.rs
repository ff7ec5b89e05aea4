//! Read every CSV file under a Google Cloud Storage (or local) directory into
//! one Arrow table, parse declared date columns, and save a local copy.

pub mod clock;
pub mod dataset;
pub mod datetime;
pub mod error;
pub mod pattern;
pub mod reader;
pub mod source;
pub mod writer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dataset::Dataset;
pub use error::{Error, ErrorKind, Result};
pub use pattern::{resolve_pattern, FileType, Location};
pub use reader::{read_from_gcs, ReadOptions, Reader};
pub use source::{GcsSource, LocalSource, MemorySource, ObjectSource};
pub use writer::{save_file, SaveOutcome, Writer};
