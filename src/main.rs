use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

mod cli;

use storyreel::artifact::{sanitize_filename, DirectorySaver};
use storyreel::config::{AppConfig, RenderDefaults};
use storyreel::credentials::CredentialPool;
use storyreel::encoder::OutputFormat;
use storyreel::input::{read_manifest, StoryManifest};
use storyreel::loader::DefaultLoader;
use storyreel::logging::init_logging;
use storyreel::pipeline::{Pacing, RenderPipeline, RenderReport, SceneOutcome};
use storyreel::renderer::Font;
use storyreel::schedule::{Allocation, Schedule, TimingConfig};
use storyreel::session::ReelSession;

/// Comma- or newline-separated keys sent as bearer tokens with image URL requests.
const API_KEYS_ENV: &str = "STORYREEL_API_KEYS";

fn main() -> Result<()> {
    let args = cli::Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json = true;
    }
    init_logging(&config.logging);

    match args.command {
        cli::Command::Render(render) => {
            // One scene at a time on the caller's thread
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(run_render(render, &config))
        }
        cli::Command::Plan {
            scene_count,
            timing,
            default_fps,
        } => {
            let timing = timing
                .to_config()
                .context("No timing given: use --frames with --fps or --seconds, or --per-scene")?;
            print_plan(scene_count, &timing, default_fps)
        }
        cli::Command::ListFonts => {
            let font_names = Font::available_fonts();
            println!("Embedded Bitmap Fonts:");
            println!("======================\n");
            for (i, font) in font_names.iter().enumerate() {
                println!("  {:3}. {}", i + 1, font);
            }
            println!("\n  Total: {} fonts", font_names.len());
            println!("\nUsage: storyreel render story.json --font FontName");
            println!("       storyreel render story.json --font-file /path/to/font.ttf");
            Ok(())
        }
    }
}

async fn run_render(args: cli::RenderArgs, config: &AppConfig) -> Result<()> {
    let manifest = read_manifest(&args.manifest)
        .with_context(|| format!("Failed to read manifest {}", args.manifest.display()))?;

    let timing = args
        .timing
        .to_config()
        .or_else(|| manifest.effective_timing())
        .context(
            "No timing given: use --frames with --fps or --seconds, or --per-scene, \
             or set `timing` or `total_duration` in the manifest",
        )?;

    let format = resolve_format(args.format.as_deref(), args.output.as_deref(), config.output.format)?;
    let defaults = apply_overrides(&config.render, &args);
    let options = defaults.to_options(format).context("Invalid render settings")?;
    let style = defaults.colors.to_style().context("Invalid overlay colors")?;
    let typeface = defaults.typeface().context("Failed to load label font")?;

    let mut loader = match options.load_timeout {
        Some(limit) => DefaultLoader::with_timeout(limit).context("Failed to build HTTP client")?,
        None => DefaultLoader::new(),
    };
    if let Ok(keys) = std::env::var(API_KEYS_ENV) {
        let pool = CredentialPool::from_list(&keys).with_context(|| format!("Invalid {}", API_KEYS_ENV))?;
        tracing::debug!(keys = pool.len(), "using API keys for image requests");
        loader = loader.with_credentials(pool);
    }

    let (dir, filename) = output_target(args.output.as_deref(), &config.output.dir, &manifest, format);

    eprintln!(
        "Rendering {} scene(s) at {}x{} as {:?}{}",
        manifest.scenes.len(),
        options.width,
        options.height,
        format,
        if options.pacing == Pacing::Offline { " (offline)" } else { "" }
    );
    if let Some(title) = &manifest.title {
        eprintln!("  {}", title);
    }

    let pipeline = RenderPipeline::with_typeface(loader, options, typeface).with_style(style);
    let mut session = ReelSession::new(pipeline, DirectorySaver::new(&dir));

    let url = session
        .create_video_from_images(&manifest.scenes, &timing)
        .await
        .context("Render failed")?;
    if let Some(report) = session.last_report() {
        print_report(report);
    }

    session
        .download_video(&url, Some(&filename))
        .with_context(|| format!("Failed to save video into {}", dir.display()))?;
    session.revoke(&url);

    eprintln!("\nGenerated files:");
    eprintln!("  ✓ {}", dir.join(sanitize_filename(&filename)).display());
    Ok(())
}

fn resolve_format(explicit: Option<&str>, output: Option<&Path>, fallback: OutputFormat) -> Result<OutputFormat> {
    let detected = output.and_then(OutputFormat::from_path);

    let Some(name) = explicit else {
        return Ok(detected.unwrap_or(fallback));
    };

    let Some(format) = OutputFormat::from_name(name) else {
        #[cfg(feature = "webm")]
        {
            anyhow::bail!("Unknown format: {}. Supported formats: gif, webm", name)
        }
        #[cfg(not(feature = "webm"))]
        {
            anyhow::bail!("Unknown format: {}. Supported formats: gif (compile with --features webm for WebM support)", name)
        }
    };

    if let (Some(detected), Some(path)) = (detected, output) {
        if detected != format {
            eprintln!(
                "Warning: Specified format '{:?}' doesn't match output file extension '.{}'",
                format,
                path.extension().and_then(|e| e.to_str()).unwrap_or("?")
            );
            eprintln!("         Using specified format: {:?}", format);
        }
    }
    Ok(format)
}

/// Command-line flags win over config values.
fn apply_overrides(config: &RenderDefaults, args: &cli::RenderArgs) -> RenderDefaults {
    let mut defaults = config.clone();
    if let Some((width, height)) = args.size {
        defaults.width = width;
        defaults.height = height;
    }
    if let Some(quality) = args.quality {
        defaults.quality = quality;
    }
    if args.offline {
        defaults.pacing = Pacing::Offline;
    }
    if let Some(secs) = args.load_timeout {
        defaults.load_timeout_secs = (secs > 0.0).then_some(secs);
    }
    if args.no_overlays {
        defaults.overlays = false;
    }
    if args.font.is_some() {
        defaults.font = args.font.clone();
    }
    if args.font_file.is_some() {
        defaults.font_file = args.font_file.clone();
    }
    defaults
}

/// Directory and filename for the saved video.
fn output_target(output: Option<&Path>, default_dir: &Path, manifest: &StoryManifest, format: OutputFormat) -> (PathBuf, String) {
    if let Some(path) = output {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            return (dir, name.to_string());
        }
    }

    let stem = manifest
        .title
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "story".to_string());
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    (
        default_dir.to_path_buf(),
        format!("{}-{}.{}", stem, timestamp, format.extension()),
    )
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn print_report(report: &RenderReport) {
    eprintln!(
        "\nEncoded {} frames ({:.2}s at {:.2} fps)",
        report.frames_written,
        report.duration.as_secs_f64(),
        report.spacing.fps()
    );
    for (i, outcome) in report.scenes.iter().enumerate() {
        match outcome {
            SceneOutcome::Rendered { frames } => eprintln!("  scene {:3}: {} frames", i + 1, frames),
            SceneOutcome::ErrorFrames { frames, reason } => {
                eprintln!("  scene {:3}: {} error frames ({})", i + 1, frames, reason)
            }
            SceneOutcome::Skipped => eprintln!("  scene {:3}: skipped (no frames)", i + 1),
        }
    }
    let failed = report.failed_scenes();
    if !failed.is_empty() {
        let list: Vec<String> = failed.iter().map(|i| (i + 1).to_string()).collect();
        eprintln!("Warning: {} scene(s) could not be loaded: {}", failed.len(), list.join(", "));
    }
}

fn print_plan(scene_count: usize, timing: &TimingConfig, default_fps: u32) -> Result<()> {
    let schedule = Schedule::plan(scene_count, timing, default_fps).context("Cannot plan this timing")?;
    let spacing = schedule.spacing();

    println!("Timing: {:?}", timing);
    println!("Frame interval: {:?} ({:.3} fps)\n", spacing.interval(), spacing.fps());
    println!("  {:>5}  {:>12}  {:>7}  {:>10}  {:>10}", "scene", "allocation", "frames", "start", "end");

    let mut first = 0u64;
    for (i, (allocation, frames)) in schedule.allocations().iter().zip(schedule.scene_frames()).enumerate() {
        let requested = match allocation {
            Allocation::Frames(n) => format!("{} frames", n),
            Allocation::Duration(d) => format!("{:.3}s", d.as_secs_f64()),
        };
        println!(
            "  {:>5}  {:>12}  {:>7}  {:>9.3}s  {:>9.3}s",
            i + 1,
            requested,
            frames,
            spacing.offset(first).as_secs_f64(),
            spacing.offset(first + frames).as_secs_f64()
        );
        first += frames;
    }

    println!(
        "\n  Total: {} frames, {:.3}s",
        schedule.frame_count(),
        schedule.playback_duration().as_secs_f64()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_format() {
        assert_eq!(
            resolve_format(Some("gif"), Some(Path::new("out.webm")), OutputFormat::default()).unwrap(),
            OutputFormat::Gif
        );
        assert_eq!(
            resolve_format(None, Some(Path::new("out.gif")), OutputFormat::default()).unwrap(),
            OutputFormat::Gif
        );
        assert_eq!(resolve_format(None, None, OutputFormat::Gif).unwrap(), OutputFormat::Gif);
        assert!(resolve_format(Some("mp4"), None, OutputFormat::Gif).is_err());
    }

    #[test]
    fn test_output_target() {
        let manifest = StoryManifest::from_json_str(r#"{"title": "The Red Fox!", "scenes": [{"imageUrl": "a.png", "timestamp": 0}]}"#).unwrap();
        let (dir, name) = output_target(Some(Path::new("videos/out.gif")), Path::new("."), &manifest, OutputFormat::Gif);
        assert_eq!((dir, name.as_str()), (PathBuf::from("videos"), "out.gif"));

        let (dir, name) = output_target(None, Path::new("/tmp/reels"), &manifest, OutputFormat::Gif);
        assert_eq!(dir, PathBuf::from("/tmp/reels"));
        assert!(name.starts_with("the-red-fox-"));
        assert!(name.ends_with(".gif"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Hello, World  "), "hello-world");
        assert_eq!(slugify("!!!"), "");
    }
}
