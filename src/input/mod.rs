//! Story manifests: the scene list and timing of one render request.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ReelError, ReelResult};
use crate::loader::ImageSource;
use crate::schedule::TimingConfig;

/// One scene to render: an image reference plus its nominal timestamp.
///
/// The timestamp is descriptive only; scenes always render in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneForRender {
    #[serde(alias = "imageUrl", alias = "image_url", alias = "image", alias = "image_source")]
    pub image_source: String,

    #[serde(default)]
    pub timestamp: f64,

    // Storyboard notes carried along for logging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub characters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "visual_prompt")]
    pub visual_prompt: Option<String>,
}

impl SceneForRender {
    pub fn new(image_source: impl Into<String>, timestamp: f64) -> Self {
        Self {
            image_source: image_source.into(),
            timestamp,
            scene: None,
            description: None,
            dialogue: None,
            characters: Vec::new(),
            setting: None,
            visual_prompt: None,
        }
    }

    pub fn source(&self) -> ReelResult<ImageSource> {
        ImageSource::parse(&self.image_source)
    }

    /// One-line label for logs.
    pub fn summary(&self) -> String {
        match &self.description {
            Some(desc) if desc.chars().count() > 60 => {
                format!("{}...", desc.chars().take(57).collect::<String>())
            }
            Some(desc) => desc.clone(),
            None => format!("t={:.1}s", self.timestamp),
        }
    }
}

/// File form of a render request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingConfig>,

    /// Requested story length in seconds
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "total_duration", alias = "duration")]
    pub total_duration: Option<f64>,

    pub scenes: Vec<SceneForRender>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Full(StoryManifest),
    Scenes(Vec<SceneForRender>),
}

impl From<ManifestFile> for StoryManifest {
    fn from(file: ManifestFile) -> Self {
        match file {
            ManifestFile::Full(manifest) => manifest,
            ManifestFile::Scenes(scenes) => StoryManifest {
                scenes,
                ..Default::default()
            },
        }
    }
}

impl StoryManifest {
    pub fn from_json_str(text: &str) -> ReelResult<Self> {
        let file: ManifestFile = serde_json::from_str(text)?;
        Ok(file.into())
    }

    pub fn from_yaml_str(text: &str) -> ReelResult<Self> {
        let file: ManifestFile = serde_yaml::from_str(text)?;
        Ok(file.into())
    }

    /// Explicit timing if given, otherwise an even per-scene split of
    /// `total_duration`.
    pub fn effective_timing(&self) -> Option<TimingConfig> {
        if self.timing.is_some() {
            return self.timing;
        }
        match self.total_duration {
            Some(total) if total > 0.0 && !self.scenes.is_empty() => Some(TimingConfig::PerScene {
                seconds_per_scene: total / self.scenes.len() as f64,
            }),
            _ => None,
        }
    }

    /// Rewrite relative image paths so they no longer depend on the working directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        for scene in &mut self.scenes {
            if let Ok(ImageSource::Path(path)) = scene.source().map(|s| s.resolved_against(base)) {
                scene.image_source = path.to_string_lossy().into_owned();
            }
        }
    }
}

/// Load a manifest, picking JSON or YAML by file extension.
pub fn read_manifest(path: &Path) -> ReelResult<StoryManifest> {
    let text = std::fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let mut manifest = match ext.as_str() {
        "json" => StoryManifest::from_json_str(&text)?,
        "yaml" | "yml" => StoryManifest::from_yaml_str(&text)?,
        other => {
            return Err(ReelError::precondition(format!(
                "Unsupported manifest type '{}' for {} (expected .json, .yaml or .yml)",
                other,
                path.display()
            )))
        }
    };

    if let Some(base) = path.parent() {
        manifest.resolve_paths(base);
    }

    tracing::debug!(
        path = %path.display(),
        scenes = manifest.scenes.len(),
        title = manifest.title.as_deref().unwrap_or(""),
        "read story manifest"
    );

    Ok(manifest)
}

/// Reject empty scene lists and unusable timestamps.
pub fn validate_scenes(scenes: &[SceneForRender]) -> ReelResult<()> {
    if scenes.is_empty() {
        return Err(ReelError::precondition("at least one scene is required"));
    }
    for (i, scene) in scenes.iter().enumerate() {
        if !scene.timestamp.is_finite() || scene.timestamp < 0.0 {
            return Err(ReelError::precondition(format!(
                "scene {} has invalid timestamp {}",
                i + 1,
                scene.timestamp
            )));
        }
        if scene.image_source.trim().is_empty() {
            return Err(ReelError::precondition(format!("scene {} has no image", i + 1)));
        }
    }
    Ok(())
}
