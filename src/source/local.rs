use glob::glob_with;
use std::fs;
use tracing::debug;

use super::{match_options, ObjectSource};
use crate::error::{Error, Result};

/// Reads files from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSource;

impl ObjectSource for LocalSource {
    fn list(&self, pattern: &str) -> Result<Vec<String>> {
        let paths = glob_with(pattern, match_options()).map_err(|e| Error::InvalidLocation {
            location: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let mut keys = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| Error::from_source(pattern, e))?;
            if path.is_file() {
                keys.push(path.to_string_lossy().into_owned());
            } else {
                debug!(path = %path.display(), "skipping non-file match");
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        fs::read(key).map_err(|e| Error::from_source(key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn lists_only_direct_csv_files() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("b.csv"), "id\n1\n")?;
        fs::write(dir.path().join("a.csv"), "id\n2\n")?;
        fs::write(dir.path().join("notes.txt"), "skip me")?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(dir.path().join("nested").join("c.csv"), "id\n3\n")?;
        fs::create_dir(dir.path().join("folder.csv"))?;

        let pattern = format!("{}/*.csv", dir.path().display());
        let keys = LocalSource.list(&pattern)?;
        let names: Vec<_> = keys
            .iter()
            .map(|k| k.rsplit('/').next().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);

        assert_eq!(LocalSource.fetch(&keys[0])?, b"id\n2\n");
        Ok(())
    }

    #[test]
    fn missing_file_is_source_error() {
        let err = LocalSource.fetch("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, Error::Source { .. }));
    }
}
