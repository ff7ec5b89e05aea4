// src/source/gcs.rs
use glob::Pattern;
use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::objects::{download::Range, get::GetObjectRequest, list::ListObjectsRequest},
};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use super::{match_options, ObjectSource};
use crate::error::{Error, Result};
use crate::pattern::{list_prefix, Location};

/// Reads objects from one Google Cloud Storage bucket.
///
/// Credentials come from the environment (Application Default Credentials).
/// The client's async calls are driven on a private current-thread runtime,
/// so this must not be used from inside another tokio runtime.
pub struct GcsSource {
    bucket: String,
    client: Client,
    runtime: Runtime,
}

impl GcsSource {
    pub fn connect(bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let config = runtime
            .block_on(ClientConfig::default().with_auth())
            .map_err(|e| Error::from_source(format!("gs://{}", bucket), e))?;
        let client = Client::new(config);
        info!(bucket = %bucket, "connected to GCS");

        Ok(Self {
            bucket,
            client,
            runtime,
        })
    }
}

/// Object name inside `bucket` for a `gs://bucket/name` key.
fn object_name<'a>(bucket: &str, key: &'a str) -> Result<&'a str> {
    match key
        .strip_prefix("gs://")
        .and_then(|rest| rest.strip_prefix(bucket))
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(name) => Ok(name),
        None => Err(Error::InvalidLocation {
            location: key.to_string(),
            reason: format!("not an object in bucket {}", bucket),
        }),
    }
}

/// Object-name glob inside `bucket` for a full `gs://bucket/...` pattern.
fn object_pattern(bucket: &str, pattern: &str) -> Result<Pattern> {
    let object_pattern = match Location::parse(pattern)? {
        Location::Gcs { bucket: b, pattern } if b == bucket => pattern,
        _ => {
            return Err(Error::InvalidLocation {
                location: pattern.to_string(),
                reason: format!("not a pattern in bucket {}", bucket),
            })
        }
    };
    Pattern::new(&object_pattern).map_err(|e| Error::InvalidLocation {
        location: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Full keys for the listed object names the glob accepts.
fn matching_keys<'a>(
    bucket: &str,
    matcher: &Pattern,
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| matcher.matches_with(name, match_options()))
        .map(|name| format!("gs://{}/{}", bucket, name))
        .collect()
}

/// Token for the following page, if the listing is not finished.
fn next_page(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

impl ObjectSource for GcsSource {
    fn list(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = object_pattern(&self.bucket, pattern)?;
        let prefix = list_prefix(matcher.as_str()).to_string();

        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let request = ListObjectsRequest {
                bucket: self.bucket.clone(),
                prefix: Some(prefix.clone()),
                page_token: page_token.take(),
                ..Default::default()
            };
            let response = self
                .runtime
                .block_on(self.client.list_objects(&request))
                .map_err(|e| Error::from_source(pattern, e))?;

            let items = response.items.unwrap_or_default();
            keys.extend(matching_keys(
                &self.bucket,
                &matcher,
                items.iter().map(|o| o.name.as_str()),
            ));

            page_token = next_page(response.next_page_token);
            if page_token.is_none() {
                break;
            }
        }

        keys.sort();
        debug!(pattern, matched = keys.len(), "listed GCS objects");
        Ok(keys)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            object: object_name(&self.bucket, key)?.to_string(),
            ..Default::default()
        };
        let data = self
            .runtime
            .block_on(self.client.download_object(&request, &Range::default()))
            .map_err(|e| Error::from_source(key, e))?;
        debug!(key, bytes = data.len(), "downloaded object");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_object_names() {
        assert_eq!(
            object_name("exports", "gs://exports/2024/a.csv").unwrap(),
            "2024/a.csv"
        );
        assert!(matches!(
            object_name("exports", "gs://other/2024/a.csv"),
            Err(Error::InvalidLocation { .. })
        ));
        assert!(object_name("exports", "gs://exports-old/a.csv").is_err());
        assert!(object_name("exports", "/tmp/a.csv").is_err());
    }

    #[test]
    fn listing_filter() {
        let matcher = object_pattern("exports", "gs://exports/2024/*.csv").unwrap();
        assert_eq!(list_prefix(matcher.as_str()), "2024/");

        let names = ["2024/a.csv", "2024/b.txt", "2024/old/c.csv", "2025/d.csv"];
        assert_eq!(
            matching_keys("exports", &matcher, names),
            vec!["gs://exports/2024/a.csv"]
        );

        assert!(object_pattern("exports", "gs://other/*.csv").is_err());
        assert!(object_pattern("exports", "/local/*.csv").is_err());
    }

    #[test]
    fn pagination_stops_on_empty_token() {
        assert_eq!(next_page(Some("abc".into())), Some("abc".to_string()));
        assert_eq!(next_page(Some(String::new())), None);
        assert_eq!(next_page(None), None);
    }
}
