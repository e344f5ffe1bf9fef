//! Application configuration, read from YAML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::encoder::OutputFormat;
use crate::error::{ReelError, ReelResult};
use crate::pipeline::{Pacing, RenderOptions, DEFAULT_LOAD_TIMEOUT};
use crate::renderer::{Color, Font, OverlayStyle, TrueTypeFont, Typeface, REFERENCE_HEIGHT, REFERENCE_WIDTH};
use crate::schedule::DEFAULT_FPS;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Global application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub render: RenderDefaults,
    pub output: OutputDefaults,
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    pub width: usize,
    pub height: usize,

    /// Sampling rate when the timing mode does not carry one.
    pub fps: u32,

    /// Encoder quality, 0-100.
    pub quality: u8,

    pub pacing: Pacing,

    /// Seconds to wait for a scene image; omit to wait forever.
    pub load_timeout_secs: Option<f64>,

    /// Whether to draw the scene label and frame counter.
    pub overlays: bool,

    /// Embedded bitmap font for labels.
    pub font: Option<String>,

    /// TrueType font file for labels; takes precedence over `font`.
    pub font_file: Option<PathBuf>,

    pub colors: ColorDefaults,
}

/// Overlay colors as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorDefaults {
    pub background: String,
    pub label_box: String,
    pub label_text: String,
    pub error_fill: String,
    pub error_text: String,
}

/// Where finished videos go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDefaults {
    pub dir: PathBuf,
    pub format: OutputFormat,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: REFERENCE_WIDTH,
            height: REFERENCE_HEIGHT,
            fps: DEFAULT_FPS,
            quality: 50,
            pacing: Pacing::Realtime,
            load_timeout_secs: Some(DEFAULT_LOAD_TIMEOUT.as_secs_f64()),
            overlays: true,
            font: None,
            font_file: None,
            colors: ColorDefaults::default(),
        }
    }
}

impl Default for ColorDefaults {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self {
            background: style.background.to_hex(),
            label_box: style.label_box.to_hex(),
            label_text: style.label_text.to_hex(),
            error_fill: style.error_fill.to_hex(),
            error_text: style.error_text.to_hex(),
        }
    }
}

impl Default for OutputDefaults {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            format: OutputFormat::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load from `path` if given (errors are fatal), otherwise from the
    /// standard location, falling back to defaults.
    pub fn load(path: Option<&Path>) -> ReelResult<Self> {
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ReelError::config(format!("Failed to read config {}: {}", path.display(), e)))?;
            return Self::from_yaml_str(&content);
        }

        let Some(config_path) = Self::default_path() else {
            return Ok(Self::default());
        };
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match Self::from_yaml_str(&content) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config at {:?}: {}", config_path, e),
                },
                Err(e) => tracing::warn!("Failed to read config at {:?}: {}", config_path, e),
            }
        }
        Ok(Self::default())
    }

    pub fn from_yaml_str(content: &str) -> ReelResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Standard config file location.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "storyreel").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> ReelResult<()> {
        let render = &self.render;
        if render.width == 0 || render.height == 0 {
            return Err(ReelError::config(format!("Invalid size {}x{}", render.width, render.height)));
        }
        if render.fps == 0 {
            return Err(ReelError::config("fps must be positive"));
        }
        if render.quality > 100 {
            return Err(ReelError::config(format!("quality must be 0-100, got {}", render.quality)));
        }
        if let Some(secs) = render.load_timeout_secs {
            load_timeout(secs)?;
        }
        render.colors.to_style()?;
        Ok(())
    }
}

impl RenderDefaults {
    pub fn to_options(&self, format: OutputFormat) -> ReelResult<RenderOptions> {
        Ok(RenderOptions {
            width: self.width,
            height: self.height,
            default_fps: self.fps,
            quality: self.quality,
            format,
            pacing: self.pacing,
            load_timeout: self.load_timeout_secs.map(load_timeout).transpose()?,
            overlays: self.overlays,
        })
    }

    pub fn typeface(&self) -> ReelResult<Typeface> {
        if let Some(path) = &self.font_file {
            let font = TrueTypeFont::from_file(path).map_err(ReelError::config)?;
            return Ok(Typeface::TrueType(font));
        }
        Ok(Typeface::Bitmap(Font::load(self.font.as_deref())))
    }
}

fn load_timeout(secs: f64) -> ReelResult<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ReelError::config(format!("load_timeout_secs must be positive, got {}", secs)));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ReelError::config(format!("load_timeout_secs is too large, got {}", secs)))
}

impl ColorDefaults {
    pub fn to_style(&self) -> ReelResult<OverlayStyle> {
        Ok(OverlayStyle {
            background: Color::from_hex(&self.background)?,
            label_box: Color::from_hex(&self.label_box)?,
            label_text: Color::from_hex(&self.label_text)?,
            error_fill: Color::from_hex(&self.error_fill)?,
            error_text: Color::from_hex(&self.error_text)?,
        })
    }
}
