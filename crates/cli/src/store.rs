//! Directory-backed asset store.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pipeline::{AssetStore, CollaboratorError};
use tracing::debug;

/// Writes each asset to its own file under one directory.
///
/// File names are `NNN-<stem>.<ext>`, where `NNN` is a per-store sequence
/// number and `<stem>` is the sanitised last path segment of the source URL.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    next: AtomicUsize,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AssetStore for DirectoryStore {
    async fn store(
        &self,
        source_url: &str,
        bytes: &[u8],
        media_type: &str,
        extension: &str,
    ) -> Result<String, CollaboratorError> {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        let path = self
            .root
            .join(format!("{sequence:03}-{}.{extension}", file_stem(source_url)));

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| rejected(&self.root, e))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| rejected(&path, e))?;

        debug!(path = %path.display(), media_type, bytes = bytes.len(), "Asset written");
        Ok(path.display().to_string())
    }
}

fn rejected(path: &std::path::Path, error: std::io::Error) -> CollaboratorError {
    CollaboratorError::Rejected {
        message: format!("writing {}: {error}", path.display()),
    }
}

/// Last path segment of `url` without its extension, reduced to
/// `[A-Za-z0-9_-]`, or `asset` when nothing usable remains.
fn file_stem(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or("");
    let stem = segment.split('.').next().unwrap_or("");
    let cleaned: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(48)
        .collect();
    if cleaned.is_empty() {
        "asset".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_are_sanitised() {
        assert_eq!(file_stem("https://cdn.example/img/map.png?w=200"), "map");
        assert_eq!(file_stem("https://cdn.example/"), "asset");
        assert_eq!(file_stem("https://cdn.example/..%2F..%2Fetc"), "asset");
        assert_eq!(file_stem("https://cdn.example/a b(1).jpg"), "ab1");
    }

    #[tokio::test]
    async fn assets_land_in_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("assets"));

        let first = store
            .store("https://cdn.example/map.png", b"one", "image/png", "png")
            .await
            .unwrap();
        let second = store
            .store("https://cdn.example/map.png", b"two", "image/png", "png")
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(first.ends_with("000-map.png"));
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }
}
