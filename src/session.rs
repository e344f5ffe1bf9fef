//! Caller-facing entry point: render to a transient reference, then download it.

use crate::artifact::{Downloader, ObjectUrl, ObjectUrlRegistry, SaveTrigger};
use crate::encoder::{AnimatedEncoder, EncoderSpec};
use crate::error::ReelResult;
use crate::input::SceneForRender;
use crate::loader::ImageLoader;
use crate::pipeline::{RenderPipeline, RenderReport};
use crate::schedule::TimingConfig;

pub struct ReelSession<L: ImageLoader, T: SaveTrigger> {
    pipeline: RenderPipeline<L>,
    registry: ObjectUrlRegistry,
    downloader: Downloader<T>,
    last_report: Option<RenderReport>,
}

impl<L: ImageLoader, T: SaveTrigger> ReelSession<L, T> {
    pub fn new(pipeline: RenderPipeline<L>, trigger: T) -> Self {
        Self {
            pipeline,
            registry: ObjectUrlRegistry::new(),
            downloader: Downloader::new(trigger),
            last_report: None,
        }
    }

    /// Render the scenes and register the result. Nothing is registered on failure.
    pub async fn create_video_from_images(
        &mut self,
        scenes: &[SceneForRender],
        timing: &TimingConfig,
    ) -> ReelResult<ObjectUrl> {
        let rendered = self.pipeline.render(scenes, timing).await?;
        self.last_report = Some(rendered.report);
        Ok(self.registry.create_object_url(rendered.artifact))
    }

    /// Same as [`Self::create_video_from_images`] with a caller-built encoder.
    pub async fn create_video_with<E, F>(
        &mut self,
        scenes: &[SceneForRender],
        timing: &TimingConfig,
        make_encoder: F,
    ) -> ReelResult<ObjectUrl>
    where
        E: AnimatedEncoder,
        F: FnOnce(&EncoderSpec) -> ReelResult<E>,
    {
        let rendered = self.pipeline.render_with(scenes, timing, make_encoder).await?;
        self.last_report = Some(rendered.report);
        Ok(self.registry.create_object_url(rendered.artifact))
    }

    /// Save the artifact behind `url`. Every call saves again.
    pub fn download_video(&self, url: &ObjectUrl, filename: Option<&str>) -> ReelResult<()> {
        self.downloader.download_video(&self.registry, url, filename)
    }

    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        self.registry.revoke(url)
    }

    pub fn last_report(&self) -> Option<&RenderReport> {
        self.last_report.as_ref()
    }

    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &RenderPipeline<L> {
        &self.pipeline
    }

    pub fn trigger(&self) -> &T {
        self.downloader.trigger()
    }
}
