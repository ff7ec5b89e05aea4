// src/pattern.rs
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

const GCS_SCHEME: &str = "gs://";

/// File formats the reader understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Csv,
}

impl FileType {
    /// Extension without the dot, used for both the wildcard and output names.
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Csv => "csv",
        }
    }
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("csv") {
            Ok(FileType::Csv)
        } else {
            Err(Error::UnsupportedFileType(s.to_string()))
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Turn a directory into `<dir>/*.<ext>`, adding the separator when missing.
pub fn resolve_pattern(dir: &str, file_type: FileType) -> String {
    if dir.ends_with('/') {
        format!("{}*.{}", dir, file_type.extension())
    } else {
        format!("{}/*.{}", dir, file_type.extension())
    }
}

/// Where a wildcard pattern points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Object pattern inside a bucket, without the `gs://bucket/` part.
    Gcs { bucket: String, pattern: String },
    Local(String),
}

impl Location {
    pub fn parse(pattern: &str) -> Result<Self> {
        let Some(rest) = pattern.strip_prefix(GCS_SCHEME) else {
            return Ok(Location::Local(pattern.to_string()));
        };
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(Error::InvalidLocation {
                location: pattern.to_string(),
                reason: "missing bucket name".into(),
            });
        }
        Ok(Location::Gcs {
            bucket: bucket.to_string(),
            pattern: key.to_string(),
        })
    }
}

/// Literal leading part of a glob pattern, up to the last `/` before the
/// first metacharacter. Narrows a bucket listing.
pub fn list_prefix(pattern: &str) -> &str {
    let literal_end = pattern
        .find(|c| matches!(c, '*' | '?' | '['))
        .unwrap_or(pattern.len());
    match pattern[..literal_end].rfind('/') {
        Some(i) => &pattern[..=i],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_separator_is_optional() {
        assert_eq!(
            resolve_pattern("gs://bucket/data", FileType::Csv),
            "gs://bucket/data/*.csv"
        );
        assert_eq!(
            resolve_pattern("gs://bucket/data", FileType::Csv),
            resolve_pattern("gs://bucket/data/", FileType::Csv)
        );
    }

    #[test]
    fn file_type_tag() {
        assert_eq!("csv".parse::<FileType>().unwrap(), FileType::Csv);
        assert_eq!("CSV".parse::<FileType>().unwrap(), FileType::Csv);
        assert!(matches!(
            "parquet".parse::<FileType>(),
            Err(Error::UnsupportedFileType(t)) if t == "parquet"
        ));
    }

    #[test]
    fn parse_locations() {
        assert_eq!(
            Location::parse("gs://my-bucket/exports/2024/*.csv").unwrap(),
            Location::Gcs {
                bucket: "my-bucket".into(),
                pattern: "exports/2024/*.csv".into(),
            }
        );
        assert_eq!(
            Location::parse("/tmp/exports/*.csv").unwrap(),
            Location::Local("/tmp/exports/*.csv".into())
        );
        assert!(matches!(
            Location::parse("gs:///*.csv"),
            Err(Error::InvalidLocation { .. })
        ));
    }

    #[test]
    fn prefix_before_metacharacters() {
        assert_eq!(list_prefix("exports/2024/*.csv"), "exports/2024/");
        assert_eq!(list_prefix("exports/part-?.csv"), "exports/");
        assert_eq!(list_prefix("*.csv"), "");
        assert_eq!(list_prefix("exports/a.csv"), "exports/");
    }
}
