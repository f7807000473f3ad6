use std::{collections::BTreeMap, sync::Mutex};

use bytes::Bytes;
use url::Url;

use crate::error::{Result, StageError};

/// One file the warehouse wrote while unloading, as seen in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Full location of the file.
    pub location: Url,
    /// File name relative to the listed prefix.
    pub name: String,
    /// Size in bytes as stored.
    pub size: u64,
}

/// Transient object storage the warehouse unloads into. Credentials,
/// retries and cleanup policy are the host engine's concern; this seam
/// only lists and fetches.
pub trait StageStore: Send + Sync {
    fn list(&self, prefix: &Url) -> Result<Vec<StagedFile>>;

    fn fetch(&self, location: &Url) -> Result<Bytes>;
}

/// In-memory stage for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStage {
    files: Mutex<BTreeMap<String, Bytes>>,
}

impl InMemoryStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, location: &Url, bytes: Bytes) {
        let mut files = self.files.lock().unwrap();
        files.insert(location.to_string(), bytes);
    }
}

impl StageStore for InMemoryStage {
    fn list(&self, prefix: &Url) -> Result<Vec<StagedFile>> {
        let files = self.files.lock().unwrap();
        let prefix_text = prefix.to_string();
        Ok(files
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix_text))
            .map(|(key, bytes)| {
                let location = Url::parse(key).map_err(|_| StageError::List {
                    location: prefix.clone(),
                    reason: format!("stored key {:?} is not a url", key),
                })?;
                Ok(StagedFile {
                    name: key[prefix_text.len()..].trim_start_matches('/').to_string(),
                    location,
                    size: bytes.len() as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?)
    }

    fn fetch(&self, location: &Url) -> Result<Bytes> {
        let files = self.files.lock().unwrap();
        files
            .get(location.as_str())
            .cloned()
            .ok_or_else(|| StageError::NotFound(location.clone()).into())
    }
}
