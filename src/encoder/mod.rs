mod chunk;
mod gif_encoder;
#[cfg(feature = "webm")]
mod webm_encoder;

pub use chunk::{ChunkBuffer, EncodedStream};
pub use gif_encoder::GifEncoder;
#[cfg(feature = "webm")]
pub use webm_encoder::WebmEncoder;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ReelError, ReelResult};
use crate::renderer::Canvas;
use crate::schedule::FrameSpacing;

/// Sink that samples the drawing surface once per frame boundary.
pub trait AnimatedEncoder {
    /// Encode the current surface contents as the frame presented at `timestamp`.
    fn add_frame(&mut self, canvas: &Canvas, timestamp: Duration) -> ReelResult<()>;

    /// Flush pending frames and hand back every encoded chunk in order.
    fn finish(self) -> ReelResult<EncodedStream>;
}

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Gif,
    #[cfg(feature = "webm")]
    Webm,
}

impl Default for OutputFormat {
    #[cfg(feature = "webm")]
    fn default() -> Self {
        OutputFormat::Webm
    }

    #[cfg(not(feature = "webm"))]
    fn default() -> Self {
        OutputFormat::Gif
    }
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_name)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "gif" => Some(OutputFormat::Gif),
            #[cfg(feature = "webm")]
            "webm" => Some(OutputFormat::Webm),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Gif => "gif",
            #[cfg(feature = "webm")]
            OutputFormat::Webm => "webm",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Gif => "image/gif",
            #[cfg(feature = "webm")]
            OutputFormat::Webm => "video/webm",
        }
    }
}

/// Everything an encoder needs to know before the first frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderSpec {
    pub width: usize,
    pub height: usize,
    pub spacing: FrameSpacing,
    /// 0-100, higher is better
    pub quality: u8,
    pub format: OutputFormat,
}

impl EncoderSpec {
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::encoder_init(format!(
                "Invalid surface size {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Wrapper enum for different encoder types
pub enum EncoderWrapper {
    Gif(GifEncoder),
    #[cfg(feature = "webm")]
    Webm(WebmEncoder),
}

impl EncoderWrapper {
    pub fn new(spec: &EncoderSpec) -> ReelResult<Self> {
        spec.validate()?;
        match spec.format {
            OutputFormat::Gif => Ok(EncoderWrapper::Gif(GifEncoder::new(spec)?)),
            #[cfg(feature = "webm")]
            OutputFormat::Webm => Ok(EncoderWrapper::Webm(WebmEncoder::new(spec)?)),
        }
    }
}

impl AnimatedEncoder for EncoderWrapper {
    fn add_frame(&mut self, canvas: &Canvas, timestamp: Duration) -> ReelResult<()> {
        match self {
            EncoderWrapper::Gif(encoder) => encoder.add_frame(canvas, timestamp),
            #[cfg(feature = "webm")]
            EncoderWrapper::Webm(encoder) => encoder.add_frame(canvas, timestamp),
        }
    }

    fn finish(self) -> ReelResult<EncodedStream> {
        match self {
            EncoderWrapper::Gif(encoder) => encoder.finish(),
            #[cfg(feature = "webm")]
            EncoderWrapper::Webm(encoder) => encoder.finish(),
        }
    }
}
