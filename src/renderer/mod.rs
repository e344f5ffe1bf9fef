//! Per-frame painting onto the drawing surface.
//!
//! Overlay geometry is defined at the 1280x720 reference resolution and
//! scaled with the surface width.

mod canvas;
mod colors;
mod font;
mod layout;
mod truetype_font;

pub use canvas::Canvas;
pub use colors::Color;
pub use font::{Font, DEFAULT_FONT_NAME};
pub use layout::{fit_contain, DrawRect};
pub use truetype_font::TrueTypeFont;

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

pub const REFERENCE_WIDTH: usize = 1280;
pub const REFERENCE_HEIGHT: usize = 720;

/// Fraction of a scene's frames spent fading the image in.
const FADE_FRACTION: f64 = 0.1;

/// Opacity of the scene image on frame `frame` of a `scene_frames`-frame scene.
pub fn fade_opacity(frame: u64, scene_frames: u64) -> f32 {
    let fade_frames = scene_frames as f64 * FADE_FRACTION;
    if fade_frames <= 0.0 {
        return 1.0;
    }
    (frame as f64 / fade_frames).min(1.0) as f32
}

/// Label renderer: embedded bitmap font or a user-supplied TrueType face.
pub enum Typeface {
    Bitmap(Font),
    TrueType(TrueTypeFont),
}

impl Typeface {
    pub fn draw_text(&self, canvas: &mut Canvas, x: i32, baseline: i32, text: &str, px: f32, color: Color) {
        match self {
            Typeface::Bitmap(font) => {
                let size = font.scale_for(px);
                font.render_baseline(canvas, x, baseline, text, color, size);
            }
            Typeface::TrueType(font) => font.render_baseline(canvas, x, baseline, text, color, px),
        }
    }
}

impl Default for Typeface {
    fn default() -> Self {
        Typeface::Bitmap(Font::load(None))
    }
}

/// Colors used for the background, label boxes, and error frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub background: Color,
    pub label_box: Color,
    pub label_text: Color,
    pub error_fill: Color,
    pub error_text: Color,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            background: Color::BLACK,
            label_box: Color::BLACK.with_opacity(0.7),
            label_text: Color::WHITE,
            error_fill: Color::RED,
            error_text: Color::WHITE,
        }
    }
}

/// A scene image already scaled to its letterboxed size.
pub struct PreparedImage {
    image: RgbaImage,
    x: i32,
    y: i32,
}

impl PreparedImage {
    pub fn placement(&self) -> (i32, i32, u32, u32) {
        (self.x, self.y, self.image.width(), self.image.height())
    }
}

/// Where a frame sits within its scene and within the whole render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    /// 0-based scene index
    pub scene_index: usize,
    pub frame_in_scene: u64,
    pub scene_frames: u64,
    /// 0-based frame index across all scenes
    pub global_frame: u64,
    /// Known only for frame-based timing modes
    pub total_frames: Option<u64>,
}

pub struct Compositor {
    width: usize,
    height: usize,
    typeface: Typeface,
    style: OverlayStyle,
    overlays: bool,
}

impl Compositor {
    pub fn new(width: usize, height: usize, typeface: Typeface) -> Self {
        Self {
            width,
            height,
            typeface,
            style: OverlayStyle::default(),
            overlays: true,
        }
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_overlays(mut self, overlays: bool) -> Self {
        self.overlays = overlays;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn new_canvas(&self) -> Canvas {
        Canvas::new(self.width, self.height)
    }

    /// Scale to reference-resolution coordinates.
    fn scaled(&self, v: f32) -> i32 {
        (v * self.width as f32 / REFERENCE_WIDTH as f32).round() as i32
    }

    fn scaled_px(&self, px: f32) -> f32 {
        px * self.width as f32 / REFERENCE_WIDTH as f32
    }

    /// Fit and resample a loaded image once per scene.
    pub fn prepare(&self, image: &DynamicImage) -> PreparedImage {
        let (surface_w, surface_h) = (self.width as u32, self.height as u32);
        let rect = fit_contain(image.width(), image.height(), surface_w, surface_h);
        let (x, y, w, h) = rect.to_pixels(surface_w, surface_h);

        let rgba = image.to_rgba8();
        let scaled = if rgba.dimensions() == (w, h) {
            rgba
        } else {
            image::imageops::resize(&rgba, w, h, FilterType::Triangle)
        };

        PreparedImage { image: scaled, x, y }
    }

    /// Paint one frame of a successfully loaded scene.
    pub fn paint_scene_frame(&self, canvas: &mut Canvas, image: &PreparedImage, ctx: &FrameContext) {
        // Opaque fill so nothing from the previous frame shows through the fade
        canvas.fill(self.style.background);

        let opacity = fade_opacity(ctx.frame_in_scene, ctx.scene_frames);
        canvas.draw_image(&image.image, image.x, image.y, opacity);

        if self.overlays {
            self.draw_labels(canvas, ctx);
        }
    }

    fn draw_labels(&self, canvas: &mut Canvas, ctx: &FrameContext) {
        let w = REFERENCE_WIDTH as f32;

        canvas.fill_rect(
            self.scaled(10.0),
            self.scaled(10.0),
            self.scaled(120.0),
            self.scaled(40.0),
            self.style.label_box,
        );
        self.typeface.draw_text(
            canvas,
            self.scaled(20.0),
            self.scaled(35.0),
            &format!("Scene {}", ctx.scene_index + 1),
            self.scaled_px(20.0),
            self.style.label_text,
        );

        if let Some(total) = ctx.total_frames {
            canvas.fill_rect(
                self.scaled(w - 100.0),
                self.scaled(10.0),
                self.scaled(90.0),
                self.scaled(40.0),
                self.style.label_box,
            );
            self.typeface.draw_text(
                canvas,
                self.scaled(w - 95.0),
                self.scaled(35.0),
                &format!("{}/{}", ctx.global_frame + 1, total),
                self.scaled_px(16.0),
                self.style.label_text,
            );
        }
    }

    /// Paint the marker frame used when a scene's image could not be loaded.
    pub fn paint_error_frame(&self, canvas: &mut Canvas, scene_index: usize) {
        canvas.fill(self.style.error_fill);
        let baseline = (self.height / 2) as i32;
        self.typeface.draw_text(
            canvas,
            self.scaled(50.0),
            baseline,
            &format!("Error loading scene {}", scene_index + 1),
            self.scaled_px(30.0),
            self.style.error_text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn ctx(frame_in_scene: u64, scene_frames: u64) -> FrameContext {
        FrameContext {
            scene_index: 0,
            frame_in_scene,
            scene_frames,
            global_frame: frame_in_scene,
            total_frames: Some(scene_frames),
        }
    }

    #[test]
    fn test_fade_curve() {
        assert_eq!(fade_opacity(0, 30), 0.0);
        assert!((fade_opacity(1, 30) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(fade_opacity(3, 30), 1.0);
        assert_eq!(fade_opacity(29, 30), 1.0);
        assert_eq!(fade_opacity(0, 0), 1.0);
    }

    #[test]
    fn test_fade_is_monotonic() {
        for size in [1u64, 2, 7, 10, 33, 100] {
            let mut last = 0.0f32;
            for f in 0..size {
                let o = fade_opacity(f, size);
                assert!(o >= last);
                last = o;
            }
            let full_at = (0.1 * size as f64).ceil() as u64;
            assert_eq!(fade_opacity(full_at, size), 1.0);
        }
    }

    #[test]
    fn test_scene_frame_letterboxes_and_fades() {
        let compositor = Compositor::new(160, 90, Typeface::default()).with_overlays(false);
        // 1:1 image on a 16:9 surface -> pillarboxed, 90x90 centered
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 200, 0, 255])));
        let prepared = compositor.prepare(&image);
        assert_eq!(prepared.placement(), (35, 0, 90, 90));

        let mut canvas = compositor.new_canvas();
        compositor.paint_scene_frame(&mut canvas, &prepared, &ctx(0, 10));
        assert_eq!(canvas.get_pixel(80, 45), Some(Color::BLACK));

        compositor.paint_scene_frame(&mut canvas, &prepared, &ctx(5, 10));
        assert_eq!(canvas.get_pixel(80, 45), Some(Color::rgb(0, 200, 0)));
        assert_eq!(canvas.get_pixel(5, 45), Some(Color::BLACK));
        assert_eq!(canvas.get_pixel(155, 45), Some(Color::BLACK));
    }

    #[test]
    fn test_labels_stay_opaque_during_fade() {
        let compositor = Compositor::new(1280, 720, Typeface::default());
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 9, Rgba([255, 255, 255, 255])));
        let prepared = compositor.prepare(&image);
        let mut canvas = compositor.new_canvas();

        compositor.paint_scene_frame(&mut canvas, &prepared, &ctx(5, 10));
        // Inside the scene label box but away from its text: 70% black over white
        assert_eq!(canvas.get_pixel(125, 45), Some(Color::rgb(76, 76, 76)));
        // Frame counter box in the top-right corner
        assert_eq!(canvas.get_pixel(1265, 45), Some(Color::rgb(76, 76, 76)));
        // Some label text pixels are pure white
        let mut lit = 0;
        for y in 10..50 {
            for x in 10..130 {
                if canvas.get_pixel(x, y) == Some(Color::WHITE) {
                    lit += 1;
                }
            }
        }
        assert!(lit > 0);
    }

    #[test]
    fn test_counter_hidden_without_total() {
        let compositor = Compositor::new(1280, 720, Typeface::default());
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 9, Rgba([255, 255, 255, 255])));
        let prepared = compositor.prepare(&image);
        let mut canvas = compositor.new_canvas();
        let context = FrameContext { total_frames: None, ..ctx(5, 10) };

        compositor.paint_scene_frame(&mut canvas, &prepared, &context);
        assert_eq!(canvas.get_pixel(1265, 45), Some(Color::WHITE));
    }

    #[test]
    fn test_error_frame_is_red_with_text() {
        let compositor = Compositor::new(1280, 720, Typeface::default());
        let mut canvas = compositor.new_canvas();
        compositor.paint_error_frame(&mut canvas, 1);

        assert_eq!(canvas.get_pixel(0, 0), Some(Color::RED));
        assert_eq!(canvas.get_pixel(1279, 719), Some(Color::RED));
        let white = (330..360)
            .flat_map(|y| (50..700).map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.get_pixel(x, y) == Some(Color::WHITE))
            .count();
        assert!(white > 0);
    }
}
