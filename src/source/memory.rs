use glob::Pattern;
use std::collections::BTreeMap;

use super::{match_options, ObjectSource};
use crate::error::{Error, Result};

/// Objects held in memory, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    objects: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.objects.insert(key.into(), data.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(key, data);
        self
    }
}

impl ObjectSource for MemorySource {
    fn list(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = Pattern::new(pattern).map_err(|e| Error::InvalidLocation {
            location: pattern.to_string(),
            reason: e.to_string(),
        })?;
        // BTreeMap keys are already sorted
        Ok(self
            .objects
            .keys()
            .filter(|k| matcher.matches_with(k, match_options()))
            .cloned()
            .collect())
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.objects.get(key).cloned().ok_or_else(|| {
            Error::from_source(key, std::io::Error::from(std::io::ErrorKind::NotFound))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_stays_in_directory() {
        let src = MemorySource::new()
            .with("gs://b/data/2.csv", "x")
            .with("gs://b/data/1.csv", "y")
            .with("gs://b/data/old/3.csv", "z")
            .with("gs://b/data/readme.md", "w");

        assert_eq!(
            src.list("gs://b/data/*.csv").unwrap(),
            vec!["gs://b/data/1.csv", "gs://b/data/2.csv"]
        );
        assert!(src.list("gs://b/other/*.csv").unwrap().is_empty());
    }
}
