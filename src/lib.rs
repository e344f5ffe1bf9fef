//! storyreel composites an ordered list of timestamped story images into a
//! single WebM (or GIF) video with fade-ins, aspect-fit letterboxing, scene
//! labels and a frame counter.
//!
//! The usual flow is [`session::ReelSession::create_video_from_images`],
//! which returns a transient [`artifact::ObjectUrl`], followed by
//! [`session::ReelSession::download_video`].

pub mod artifact;
pub mod config;
pub mod credentials;
pub mod encoder;
pub mod error;
pub mod input;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod renderer;
pub mod schedule;
pub mod session;

pub use artifact::{Artifact, DirectorySaver, ObjectUrl, ObjectUrlRegistry, SaveTrigger};
pub use encoder::{AnimatedEncoder, EncodedStream, EncoderSpec, OutputFormat};
pub use error::{ReelError, ReelResult};
pub use input::{SceneForRender, StoryManifest};
pub use loader::{DefaultLoader, ImageLoader, ImageSource};
pub use pipeline::{Pacing, PipelineState, RenderOptions, RenderPipeline, RenderReport, SceneOutcome};
pub use schedule::{Schedule, TimingConfig};
pub use session::ReelSession;
