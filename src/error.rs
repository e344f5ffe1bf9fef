//! Error types for story rendering.

/// Top-level error type for storyreel operations.
///
/// `SceneImage` is the only recoverable kind: the pipeline turns it into
/// error frames for one scene. Encoder errors abort the whole render.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("Scene {scene}: failed to load image '{image_ref}': {message}")]
    SceneImage {
        scene: usize,
        image_ref: String,
        message: String,
    },

    #[error("Encoder initialization failed: {message}")]
    EncoderInit { message: String },

    #[error("Encoder failed while recording: {message}")]
    EncoderRuntime { message: String },

    #[error("Invalid render request: {message}")]
    Precondition { message: String },

    #[error("Unknown artifact reference: {url}")]
    UnknownArtifact { url: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Result type alias using ReelError.
pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn scene_image(scene: usize, image_ref: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SceneImage {
            scene,
            image_ref: image_ref.into(),
            message: msg.into(),
        }
    }

    pub fn encoder_init(msg: impl Into<String>) -> Self {
        Self::EncoderInit {
            message: msg.into(),
        }
    }

    pub fn encoder_runtime(msg: impl Into<String>) -> Self {
        Self::EncoderRuntime {
            message: msg.into(),
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the render can continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SceneImage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_scene_errors_are_recoverable() {
        assert!(ReelError::scene_image(2, "a.png", "missing").is_recoverable());
        assert!(!ReelError::encoder_init("no codec").is_recoverable());
        assert!(!ReelError::encoder_runtime("boom").is_recoverable());
        assert!(!ReelError::precondition("zero scenes").is_recoverable());
    }

    #[test]
    fn scene_error_message_names_scene_and_source() {
        let err = ReelError::scene_image(3, "data:image/png;base64,xx", "bad data");
        let msg = err.to_string();
        assert!(msg.contains("Scene 3"));
        assert!(msg.contains("bad data"));
    }
}
