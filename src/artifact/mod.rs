//! Finished videos and the transient references used to fetch them.

mod download;

pub use download::{sanitize_filename, DirectorySaver, DownloadLink, Downloader, SaveTrigger, DEFAULT_FILENAME};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{ReelError, ReelResult};

/// One finished render: the container bytes plus what they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
    mime_type: String,
    frame_count: u64,
    duration: Duration,
}

impl Artifact {
    /// Join encoder chunks in arrival order.
    pub fn from_chunks(chunks: Vec<Vec<u8>>, mime_type: impl Into<String>, frame_count: u64, duration: Duration) -> Self {
        Self {
            bytes: chunks.concat(),
            mime_type: mime_type.into(),
            frame_count,
            duration,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Locally resolvable reference to a registered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectUrl {
    fn from(s: &str) -> Self {
        ObjectUrl(s.to_string())
    }
}

static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

/// Holds artifacts until their references are revoked.
pub struct ObjectUrlRegistry {
    id: u64,
    next: AtomicU64,
    entries: Mutex<HashMap<ObjectUrl, Arc<Artifact>>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ObjectUrl, Arc<Artifact>>> {
        // A panic elsewhere cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create_object_url(&self, artifact: Artifact) -> ObjectUrl {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let url = ObjectUrl(format!("blob:storyreel/{}/{}", self.id, n));
        tracing::debug!(url = %url, bytes = artifact.len(), "registered artifact");
        self.entries().insert(url.clone(), Arc::new(artifact));
        url
    }

    pub fn resolve(&self, url: &ObjectUrl) -> ReelResult<Arc<Artifact>> {
        self.entries()
            .get(url)
            .cloned()
            .ok_or_else(|| ReelError::UnknownArtifact { url: url.to_string() })
    }

    /// Release the artifact. Returns false if the reference was unknown.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        let removed = self.entries().remove(url).is_some();
        if removed {
            tracing::debug!(url = %url, "revoked artifact");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ObjectUrlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> Artifact {
        Artifact::from_chunks(vec![b"ab".to_vec(), b"cd".to_vec()], "video/webm", 2, Duration::from_millis(66))
    }

    #[test]
    fn test_chunks_are_concatenated_in_order() {
        let a = artifact();
        assert_eq!(a.bytes(), b"abcd");
        assert_eq!(a.mime_type(), "video/webm");
        assert_eq!(a.frame_count(), 2);
    }

    #[test]
    fn test_create_resolve_revoke() {
        let registry = ObjectUrlRegistry::new();
        let first = registry.create_object_url(artifact());
        let second = registry.create_object_url(artifact());
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("blob:storyreel/"));

        assert_eq!(registry.resolve(&first).unwrap().bytes(), b"abcd");
        assert!(registry.revoke(&first));
        assert!(!registry.revoke(&first));
        assert!(matches!(registry.resolve(&first), Err(ReelError::UnknownArtifact { .. })));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_urls_do_not_cross_registries() {
        let a = ObjectUrlRegistry::new();
        let b = ObjectUrlRegistry::new();
        let url = a.create_object_url(artifact());
        assert!(b.resolve(&url).is_err());
    }
}
