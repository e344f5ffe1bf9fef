use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use storyreel::schedule::{TimingConfig, DEFAULT_FPS};

#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(version)]
#[command(about = "Composite timestamped story images into a WebM or GIF video", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: the per-user storyreel config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level filter, e.g. "debug" or "storyreel=trace" (RUST_LOG wins)
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a story manifest (JSON or YAML) into a video
    Render(RenderArgs),

    /// Show how frames would be split across scenes
    Plan {
        /// Number of scenes
        scene_count: usize,

        #[command(flatten)]
        timing: TimingArgs,

        /// Sampling rate for --per-scene timing
        #[arg(long, default_value_t = DEFAULT_FPS)]
        default_fps: u32,
    },

    /// List embedded label fonts
    ListFonts,
}

#[derive(ClapArgs, Debug)]
pub struct RenderArgs {
    /// Story manifest: a list of scenes, or an object with `scenes` and `timing`
    pub manifest: PathBuf,

    /// Output file (default: a timestamped name in the configured output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub timing: TimingArgs,

    /// Output format (gif, webm); detected from --output when omitted
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Video quality (0-100, higher is better)
    #[arg(short = 'q', long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: Option<u8>,

    /// Surface size, e.g. 1280x720
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub size: Option<(usize, usize)>,

    /// Render as fast as possible instead of in real time
    #[arg(long)]
    pub offline: bool,

    /// Seconds to wait for each scene image (0 waits forever; negative values are rejected)
    #[arg(long, value_name = "SECS", value_parser = parse_timeout)]
    pub load_timeout: Option<f64>,

    /// Hide the scene label and frame counter
    #[arg(long)]
    pub no_overlays: bool,

    /// Embedded bitmap font name for labels
    #[arg(short = 'f', long)]
    pub font: Option<String>,

    /// TrueType font file for labels
    #[arg(long, value_name = "PATH")]
    pub font_file: Option<PathBuf>,
}

/// Exactly one timing mode, or none to use the manifest's.
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct TimingArgs {
    /// Total frame budget (with --fps or --seconds)
    #[arg(long, requires = "frame_timing")]
    pub frames: Option<u64>,

    /// Encoding frame rate
    #[arg(long, group = "frame_timing", requires = "frames", conflicts_with = "per_scene")]
    pub fps: Option<u32>,

    /// Total playback length in seconds
    #[arg(long, group = "frame_timing", requires = "frames", conflicts_with_all = ["fps", "per_scene"])]
    pub seconds: Option<f64>,

    /// Seconds each scene stays on screen
    #[arg(long, conflicts_with = "frames")]
    pub per_scene: Option<f64>,
}

impl TimingArgs {
    /// The timing mode named on the command line, if any.
    pub fn to_config(&self) -> Option<TimingConfig> {
        match (self.frames, self.fps, self.seconds, self.per_scene) {
            (Some(total_frames), Some(fps), None, None) => Some(TimingConfig::FrameRate { total_frames, fps }),
            (Some(total_frames), None, Some(total_seconds), None) => Some(TimingConfig::FixedLength {
                total_frames,
                total_seconds,
            }),
            (None, None, None, Some(seconds_per_scene)) => Some(TimingConfig::PerScene { seconds_per_scene }),
            _ => None,
        }
    }
}

fn parse_size(s: &str) -> Result<(usize, usize), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w: usize = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let h: usize = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    if w == 0 || h == 0 {
        return Err("width and height must be positive".to_string());
    }
    Ok((w, h))
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let secs: f64 = s.trim().parse().map_err(|_| format!("invalid number of seconds '{}'", s))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("timeout must be zero or a positive number of seconds, got '{}'", s));
    }
    Ok(secs)
}
