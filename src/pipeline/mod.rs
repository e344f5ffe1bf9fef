//! The render/capture loop: paint every scheduled frame onto one surface and
//! feed it to the encoder.
//!
//! Scenes are consumed strictly in order, one at a time. An image that cannot
//! be loaded costs that scene its picture, not the render: the scene's whole
//! frame budget is filled with error frames instead. Encoder failures abort
//! the render and discard everything captured so far.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::artifact::Artifact;
use crate::encoder::{AnimatedEncoder, EncoderSpec, EncoderWrapper, OutputFormat};
use crate::error::{ReelError, ReelResult};
use crate::input::{validate_scenes, SceneForRender};
use crate::loader::ImageLoader;
use crate::renderer::{Canvas, Compositor, FrameContext, OverlayStyle, PreparedImage, Typeface, REFERENCE_HEIGHT, REFERENCE_WIDTH};
use crate::schedule::{FrameSpacing, Schedule, TimingConfig, DEFAULT_FPS};

/// How long a scene image may take to load before it is treated as failed.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Recording,
    LoadingImage { scene: usize },
    Painting { scene: usize },
    PaintingErrorFrames { scene: usize },
    Finalizing,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Recording => write!(f, "recording"),
            PipelineState::LoadingImage { scene } => write!(f, "loading image for scene {}", scene + 1),
            PipelineState::Painting { scene } => write!(f, "painting scene {}", scene + 1),
            PipelineState::PaintingErrorFrames { scene } => write!(f, "painting error frames for scene {}", scene + 1),
            PipelineState::Finalizing => write!(f, "finalizing"),
            PipelineState::Done => write!(f, "done"),
            PipelineState::Failed => write!(f, "failed"),
        }
    }
}

/// What happens between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Wait for each frame boundary; playback time equals render time.
    #[default]
    Realtime,
    /// Only yield to the runtime; render as fast as the encoder allows.
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub width: usize,
    pub height: usize,
    /// Sampling rate for modes that do not carry one
    pub default_fps: u32,
    /// 0-100, higher is better
    pub quality: u8,
    pub format: OutputFormat,
    pub pacing: Pacing,
    /// `None` waits for slow images indefinitely
    pub load_timeout: Option<Duration>,
    pub overlays: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: REFERENCE_WIDTH,
            height: REFERENCE_HEIGHT,
            default_fps: DEFAULT_FPS,
            quality: 50,
            format: OutputFormat::default(),
            pacing: Pacing::Realtime,
            load_timeout: Some(DEFAULT_LOAD_TIMEOUT),
            overlays: true,
        }
    }
}

/// How one scene ended up in the video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneOutcome {
    Rendered { frames: u64 },
    ErrorFrames { frames: u64, reason: String },
    /// Allocated zero frames; never loaded or painted
    Skipped,
}

impl SceneOutcome {
    pub fn frames(&self) -> u64 {
        match self {
            SceneOutcome::Rendered { frames } | SceneOutcome::ErrorFrames { frames, .. } => *frames,
            SceneOutcome::Skipped => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub scenes: Vec<SceneOutcome>,
    pub frames_written: u64,
    /// Playback length of the encoded stream
    pub duration: Duration,
    pub spacing: FrameSpacing,
}

impl RenderReport {
    pub fn failed_scenes(&self) -> Vec<usize> {
        self.scenes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| matches!(outcome, SceneOutcome::ErrorFrames { .. }))
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug)]
pub struct Rendered {
    pub artifact: Artifact,
    pub report: RenderReport,
}

pub struct RenderPipeline<L: ImageLoader> {
    loader: L,
    options: RenderOptions,
    compositor: Compositor,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl<L: ImageLoader> RenderPipeline<L> {
    pub fn new(loader: L, options: RenderOptions) -> Self {
        Self::with_typeface(loader, options, Typeface::default())
    }

    pub fn with_typeface(loader: L, options: RenderOptions, typeface: Typeface) -> Self {
        let compositor = Compositor::new(options.width, options.height, typeface).with_overlays(options.overlays);
        Self {
            loader,
            options,
            compositor,
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.compositor = self.compositor.with_style(style);
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state entered by the most recent render, starting with `Idle`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
        self.history.push(next);
    }

    fn fail(&mut self, error: ReelError) -> ReelError {
        tracing::error!(error = %error, "render failed");
        self.transition(PipelineState::Failed);
        error
    }

    /// Render with the encoder selected by `options.format`.
    pub async fn render(&mut self, scenes: &[SceneForRender], timing: &TimingConfig) -> ReelResult<Rendered> {
        self.render_with(scenes, timing, EncoderWrapper::new).await
    }

    /// Render into an encoder built by `make_encoder`.
    #[tracing::instrument(skip_all, fields(scenes = scenes.len(), width = self.options.width, height = self.options.height))]
    pub async fn render_with<E, F>(&mut self, scenes: &[SceneForRender], timing: &TimingConfig, make_encoder: F) -> ReelResult<Rendered>
    where
        E: AnimatedEncoder,
        F: FnOnce(&EncoderSpec) -> ReelResult<E>,
    {
        self.history.clear();
        self.state = PipelineState::Idle;
        self.history.push(PipelineState::Idle);

        validate_scenes(scenes)?;
        let schedule = Schedule::plan(scenes.len(), timing, self.options.default_fps)?;
        let spacing = *schedule.spacing();

        let spec = EncoderSpec {
            width: self.options.width,
            height: self.options.height,
            spacing,
            quality: self.options.quality,
            format: self.options.format,
        };

        let mut encoder = match make_encoder(&spec) {
            Ok(encoder) => encoder,
            Err(e @ ReelError::EncoderInit { .. }) => return Err(self.fail(e)),
            Err(e) => return Err(self.fail(ReelError::encoder_init(e.to_string()))),
        };
        self.transition(PipelineState::Recording);

        tracing::info!(
            frames = schedule.frame_count(),
            fps = spacing.fps(),
            duration_ms = schedule.playback_duration().as_millis() as u64,
            "render started"
        );

        let mut canvas = self.compositor.new_canvas();
        let mut outcomes = Vec::with_capacity(scenes.len());
        let mut global_frame = 0u64;

        for (index, scene) in scenes.iter().enumerate() {
            let frames = schedule.scene_frames()[index];
            if frames == 0 {
                tracing::debug!(scene = index + 1, "scene has no frames; skipping");
                outcomes.push(SceneOutcome::Skipped);
                continue;
            }

            self.transition(PipelineState::LoadingImage { scene: index });
            let loaded = self.load_scene(index, scene).await;

            let frame_plan = FramePlan {
                scene_index: index,
                scene_frames: frames,
                first_global: global_frame,
                total_frames: schedule.total_frames(),
                spacing,
                pacing: self.options.pacing,
            };

            let outcome = match loaded {
                Ok(prepared) => {
                    self.transition(PipelineState::Painting { scene: index });
                    let result = frame_plan
                        .run(&mut canvas, &mut encoder, |canvas, ctx| {
                            self.compositor.paint_scene_frame(canvas, &prepared, ctx)
                        })
                        .await;
                    if let Err(e) = result {
                        return Err(self.fail(e));
                    }
                    SceneOutcome::Rendered { frames }
                }
                Err(e) => {
                    tracing::warn!(scene = index + 1, error = %e, "scene image unavailable; painting error frames");
                    self.transition(PipelineState::PaintingErrorFrames { scene: index });
                    let result = frame_plan
                        .run(&mut canvas, &mut encoder, |canvas, ctx| {
                            self.compositor.paint_error_frame(canvas, ctx.scene_index)
                        })
                        .await;
                    if let Err(e) = result {
                        return Err(self.fail(e));
                    }
                    SceneOutcome::ErrorFrames {
                        frames,
                        reason: e.to_string(),
                    }
                }
            };

            global_frame += frames;
            outcomes.push(outcome);
        }

        self.transition(PipelineState::Finalizing);
        let stream = match encoder.finish() {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(as_runtime(e))),
        };

        let duration = spacing.offset(global_frame);
        let artifact = Artifact::from_chunks(stream.chunks, stream.mime_type, global_frame, duration);
        let report = RenderReport {
            scenes: outcomes,
            frames_written: global_frame,
            duration,
            spacing,
        };

        tracing::info!(
            frames = global_frame,
            bytes = artifact.len(),
            failed_scenes = report.failed_scenes().len(),
            "render finished"
        );
        self.transition(PipelineState::Done);

        Ok(Rendered { artifact, report })
    }

    /// Load and fit one scene's image. Every failure becomes a `SceneImage` error.
    async fn load_scene(&self, index: usize, scene: &SceneForRender) -> ReelResult<PreparedImage> {
        let scene_no = index + 1;
        let source = scene
            .source()
            .map_err(|e| ReelError::scene_image(scene_no, short_ref(&scene.image_source), e.to_string()))?;
        tracing::debug!(scene = scene_no, source = %source, note = %scene.summary(), "loading scene image");

        let load = self.loader.load(&source);
        let loaded = match self.options.load_timeout {
            Some(limit) => tokio::time::timeout(limit, load)
                .await
                .map_err(|_| ReelError::scene_image(scene_no, source.to_string(), format!("timed out after {:?}", limit)))?,
            None => load.await,
        };

        let image = loaded.map_err(|e| match e {
            ReelError::SceneImage { .. } => e,
            other => ReelError::scene_image(scene_no, source.to_string(), other.to_string()),
        })?;

        if image.width() == 0 || image.height() == 0 {
            return Err(ReelError::scene_image(scene_no, source.to_string(), "image has no pixels"));
        }
        Ok(self.compositor.prepare(&image))
    }
}

/// Frame loop for one scene.
struct FramePlan {
    scene_index: usize,
    scene_frames: u64,
    first_global: u64,
    total_frames: Option<u64>,
    spacing: FrameSpacing,
    pacing: Pacing,
}

impl FramePlan {
    /// Paint, hand the surface to the encoder, then wait for the next boundary.
    ///
    /// Deadlines are measured from the start of the scene, so time spent
    /// loading the image delays the scene without shortening it.
    async fn run<E, P>(&self, canvas: &mut Canvas, encoder: &mut E, paint: P) -> ReelResult<()>
    where
        E: AnimatedEncoder,
        P: Fn(&mut Canvas, &FrameContext),
    {
        let scene_start = Instant::now();

        for frame in 0..self.scene_frames {
            let global_frame = self.first_global + frame;
            let ctx = FrameContext {
                scene_index: self.scene_index,
                frame_in_scene: frame,
                scene_frames: self.scene_frames,
                global_frame,
                total_frames: self.total_frames,
            };

            paint(canvas, &ctx);
            encoder
                .add_frame(canvas, self.spacing.offset(global_frame))
                .map_err(as_runtime)?;

            match self.pacing {
                Pacing::Realtime => tokio::time::sleep_until(scene_start + self.spacing.offset(frame + 1)).await,
                Pacing::Offline => tokio::task::yield_now().await,
            }
        }
        Ok(())
    }
}

fn as_runtime(error: ReelError) -> ReelError {
    match error {
        ReelError::EncoderRuntime { .. } => error,
        other => ReelError::encoder_runtime(other.to_string()),
    }
}

/// Image reference trimmed for error messages.
fn short_ref(reference: &str) -> String {
    if reference.chars().count() > 80 {
        format!("{}...", reference.chars().take(77).collect::<String>())
    } else {
        reference.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = RenderOptions::default();
        assert_eq!((options.width, options.height), (1280, 720));
        assert_eq!(options.default_fps, 30);
        assert_eq!(options.pacing, Pacing::Realtime);
        assert_eq!(options.load_timeout, Some(Duration::from_secs(30)));
        assert!(options.overlays);
    }

    #[test]
    fn test_outcome_frames() {
        assert_eq!(SceneOutcome::Rendered { frames: 6 }.frames(), 6);
        assert_eq!(
            SceneOutcome::ErrorFrames {
                frames: 4,
                reason: "x".into()
            }
            .frames(),
            4
        );
        assert_eq!(SceneOutcome::Skipped.frames(), 0);
    }

    #[test]
    fn test_short_ref() {
        assert_eq!(short_ref("a.png"), "a.png");
        let long = format!("data:image/png;base64,{}", "A".repeat(500));
        assert_eq!(short_ref(&long).chars().count(), 80);
    }

    #[test]
    fn test_as_runtime_wraps_other_errors() {
        let io = ReelError::Io(std::io::Error::other("disk full"));
        assert!(matches!(as_runtime(io), ReelError::EncoderRuntime { .. }));
    }
}
