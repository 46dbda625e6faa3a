//! File storage for generated artifacts and uploaded import files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ArtifactError {
    fn io(path: &Path, source: io::Error) -> Self {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where a written artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    /// Public URL path under which the uploads directory is served.
    pub url: String,
}

pub trait ArtifactStore: Send + Sync {
    /// Persist `document` as `{category}/{stem}-{millis}.json`.
    fn write_json(
        &self,
        category: &str,
        stem: &str,
        document: &JsonValue,
        now: DateTime<Utc>,
    ) -> Result<StoredArtifact, ArtifactError>;

    /// Delete an uploaded file. A file that is already gone is not an error.
    fn remove(&self, path: &Path) -> Result<(), ArtifactError>;
}

/// Artifacts on the local filesystem below one uploads root.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
    url_prefix: String,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            url_prefix: "/uploads".to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifactStore {
    fn write_json(
        &self,
        category: &str,
        stem: &str,
        document: &JsonValue,
        now: DateTime<Utc>,
    ) -> Result<StoredArtifact, ArtifactError> {
        let dir = self.root.join(category);
        fs::create_dir_all(&dir).map_err(|e| ArtifactError::io(&dir, e))?;

        let file_name = format!("{stem}-{}.json", now.timestamp_millis());
        let path = dir.join(&file_name);
        let body = serde_json::to_vec_pretty(document)?;
        fs::write(&path, body).map_err(|e| ArtifactError::io(&path, e))?;

        tracing::debug!(path = %path.display(), "artifact written");
        Ok(StoredArtifact {
            url: format!("{}/{category}/{file_name}", self.url_prefix),
            path,
        })
    }

    fn remove(&self, path: &Path) -> Result<(), ArtifactError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ArtifactError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn writes_pretty_json_under_category() {
        let tmp = TempDir::new().unwrap();
        let store = FsArtifactStore::new(tmp.path());
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let stored = store
            .write_json("reports", "general-report", &json!({"total": 3}), now)
            .unwrap();

        assert_eq!(stored.url, "/uploads/reports/general-report-1700000000123.json");
        assert!(stored.path.starts_with(tmp.path().join("reports")));
        let text = fs::read_to_string(&stored.path).unwrap();
        assert!(text.contains('\n'));
        let back: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(back["total"], 3);
    }

    #[test]
    fn removing_a_missing_file_is_ok() {
        let tmp = TempDir::new().unwrap();
        let store = FsArtifactStore::new(tmp.path());
        let path = tmp.path().join("upload.csv");
        fs::write(&path, "name,type\n").unwrap();

        store.remove(&path).unwrap();
        assert!(!path.exists());
        store.remove(&path).unwrap();
    }
}
