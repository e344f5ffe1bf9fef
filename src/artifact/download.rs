use std::path::{Path, PathBuf};

use super::{Artifact, ObjectUrl, ObjectUrlRegistry};
use crate::error::ReelResult;

/// Filename used when the caller does not name one.
pub const DEFAULT_FILENAME: &str = "anime-story.webm";

/// The side effect behind a download: hand the bytes to the user under `filename`.
pub trait SaveTrigger: Send + Sync {
    fn save(&self, filename: &str, artifact: &Artifact) -> ReelResult<()>;
}

/// Saves into a fixed directory.
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveTrigger for DirectorySaver {
    fn save(&self, filename: &str, artifact: &Artifact) -> ReelResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(filename);

        // Write next to the target and rename so a partial file never appears
        let partial = self.dir.join(format!(".{}.part", filename));
        std::fs::write(&partial, artifact.bytes())?;
        std::fs::rename(&partial, &target)?;

        tracing::info!(
            path = %target.display(),
            bytes = artifact.len(),
            mime = artifact.mime_type(),
            "saved video"
        );
        Ok(())
    }
}

/// A single-use link: built for one click, then discarded.
pub struct DownloadLink<'a> {
    artifact: &'a Artifact,
    filename: String,
}

impl<'a> DownloadLink<'a> {
    pub fn new(artifact: &'a Artifact, filename: &str) -> Self {
        Self {
            artifact,
            filename: sanitize_filename(filename),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Fire the save once. Consuming `self` removes the link.
    pub fn click(self, trigger: &dyn SaveTrigger) -> ReelResult<()> {
        trigger.save(&self.filename, self.artifact)
    }
}

/// Reduce a caller-supplied name to a bare file name.
pub fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .trim_start_matches('.');
    if base.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        base.to_string()
    }
}

/// Resolves object URLs and saves them through a trigger.
pub struct Downloader<T: SaveTrigger> {
    trigger: T,
}

impl<T: SaveTrigger> Downloader<T> {
    pub fn new(trigger: T) -> Self {
        Self { trigger }
    }

    pub fn trigger(&self) -> &T {
        &self.trigger
    }

    /// Each call saves again; nothing is remembered between calls.
    pub fn download_video(&self, registry: &ObjectUrlRegistry, url: &ObjectUrl, filename: Option<&str>) -> ReelResult<()> {
        let artifact = registry.resolve(url)?;
        let link = DownloadLink::new(&artifact, filename.unwrap_or(DEFAULT_FILENAME));
        tracing::debug!(url = %url, filename = link.filename(), "triggering download");
        link.click(&self.trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelError;
    use std::time::Duration;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("story.webm"), "story.webm");
        assert_eq!(sanitize_filename("../../etc/story.webm"), "story.webm");
        assert_eq!(sanitize_filename(""), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename("/"), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename(".hidden"), "hidden");
    }

    #[test]
    fn test_directory_saver_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ObjectUrlRegistry::new();
        let url = registry.create_object_url(Artifact::from_chunks(
            vec![b"webm".to_vec()],
            "video/webm",
            1,
            Duration::from_millis(33),
        ));

        let downloader = Downloader::new(DirectorySaver::new(dir.path().join("out")));
        downloader.download_video(&registry, &url, None).unwrap();
        let saved = std::fs::read(dir.path().join("out").join(DEFAULT_FILENAME)).unwrap();
        assert_eq!(saved, b"webm");

        // No leftovers from the atomic write
        let names: Vec<_> = std::fs::read_dir(dir.path().join("out")).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_unknown_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ObjectUrlRegistry::new();
        let downloader = Downloader::new(DirectorySaver::new(dir.path()));
        let err = downloader
            .download_video(&registry, &ObjectUrl::from("blob:storyreel/0/0"), Some("x.webm"))
            .unwrap_err();
        assert!(matches!(err, ReelError::UnknownArtifact { .. }));
    }
}
