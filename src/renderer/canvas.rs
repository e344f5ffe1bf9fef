use image::RgbaImage;
use rayon::prelude::*;

use super::colors::{blend_channel, Color};

/// Opaque RGBA8 drawing surface. Every pixel keeps alpha 255.
#[derive(Clone)]
pub struct Canvas {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        // Initialize with opaque black
        let mut canvas = Self {
            data: vec![0; width * height * 4],
            width,
            height,
        };
        canvas.fill(Color::BLACK);
        canvas
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Overwrite every pixel with an opaque color.
    pub fn fill(&mut self, color: Color) {
        self.data.par_chunks_mut(4).for_each(|px| {
            px[0] = color.r;
            px[1] = color.g;
            px[2] = color.b;
            px[3] = 255;
        });
    }

    /// Alpha-blend a rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: Color) {
        let x0 = x.max(0) as usize;
        let y0 = y.max(0) as usize;
        let x1 = (x.saturating_add(width)).clamp(0, self.width as i32) as usize;
        let y1 = (y.saturating_add(height)).clamp(0, self.height as i32) as usize;
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let a = color.a as u32;
        for py in y0..y1 {
            let row = py * self.width * 4;
            for px in x0..x1 {
                let idx = row + px * 4;
                self.data[idx] = blend_channel(color.r, self.data[idx], a);
                self.data[idx + 1] = blend_channel(color.g, self.data[idx + 1], a);
                self.data[idx + 2] = blend_channel(color.b, self.data[idx + 2], a);
            }
        }
    }

    /// Blend a single pixel with extra coverage (0.0-1.0), e.g. from glyph antialiasing.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Color, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let a = (color.a as f32 * coverage.clamp(0.0, 1.0)).round() as u32;
        if a == 0 {
            return;
        }
        let idx = (y as usize * self.width + x as usize) * 4;
        self.data[idx] = blend_channel(color.r, self.data[idx], a);
        self.data[idx + 1] = blend_channel(color.g, self.data[idx + 1], a);
        self.data[idx + 2] = blend_channel(color.b, self.data[idx + 2], a);
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if x < self.width && y < self.height {
            let idx = (y * self.width + x) * 4;
            self.data[idx] = color.r;
            self.data[idx + 1] = color.g;
            self.data[idx + 2] = color.b;
            self.data[idx + 3] = 255;
        }
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x < self.width && y < self.height {
            let idx = (y * self.width + x) * 4;
            Some(Color::rgb(self.data[idx], self.data[idx + 1], self.data[idx + 2]))
        } else {
            None
        }
    }

    /// Draw `image` with its top-left corner at (x, y), scaled by `opacity`.
    ///
    /// Rows are blended in parallel; the image is expected to already be at
    /// its final size.
    pub fn draw_image(&mut self, image: &RgbaImage, x: i32, y: i32, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 || self.width == 0 {
            return;
        }

        let canvas_width = self.width as i32;
        let (img_w, img_h) = (image.width() as i32, image.height() as i32);

        self.data
            .par_chunks_mut(self.width * 4)
            .enumerate()
            .for_each(|(row, line)| {
                let sy = row as i32 - y;
                if sy < 0 || sy >= img_h {
                    return;
                }
                for sx in 0..img_w {
                    let dx = x + sx;
                    if dx < 0 || dx >= canvas_width {
                        continue;
                    }
                    let src = image.get_pixel(sx as u32, sy as u32);
                    let a = (src[3] as f32 * opacity).round() as u32;
                    if a == 0 {
                        continue;
                    }
                    let idx = dx as usize * 4;
                    line[idx] = blend_channel(src[0], line[idx], a);
                    line[idx + 1] = blend_channel(src[1], line[idx + 1], a);
                    line[idx + 2] = blend_channel(src[2], line[idx + 2], a);
                }
            });
    }

    /// Copy of the surface as an `image` buffer (for snapshots and PNG dumps).
    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width as u32, self.height as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_new_canvas_is_opaque_black() {
        let canvas = Canvas::new(4, 3);
        assert_eq!(canvas.data().len(), 4 * 3 * 4);
        assert!(canvas.data().chunks(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn test_fill_rect_clips_and_blends() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill(Color::WHITE);
        canvas.fill_rect(-2, -2, 4, 4, Color::BLACK.with_opacity(0.5));
        assert_eq!(canvas.get_pixel(0, 0), Some(Color::rgb(127, 127, 127)));
        assert_eq!(canvas.get_pixel(1, 1), Some(Color::rgb(127, 127, 127)));
        assert_eq!(canvas.get_pixel(2, 2), Some(Color::WHITE));
    }

    #[test]
    fn test_draw_image_with_opacity() {
        let mut canvas = Canvas::new(4, 4);
        let image = RgbaImage::from_pixel(2, 2, Rgba([200, 100, 50, 255]));

        canvas.draw_image(&image, 1, 1, 1.0);
        assert_eq!(canvas.get_pixel(1, 1), Some(Color::rgb(200, 100, 50)));
        assert_eq!(canvas.get_pixel(0, 0), Some(Color::BLACK));
        assert_eq!(canvas.get_pixel(3, 3), Some(Color::BLACK));

        let mut faded = Canvas::new(4, 4);
        faded.draw_image(&image, 0, 0, 0.0);
        assert_eq!(faded.get_pixel(0, 0), Some(Color::BLACK));
    }

    #[test]
    fn test_draw_image_partially_offscreen() {
        let mut canvas = Canvas::new(3, 3);
        let image = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 255]));
        canvas.draw_image(&image, 2, -2, 1.0);
        assert_eq!(canvas.get_pixel(2, 0), Some(Color::rgb(10, 20, 30)));
        assert_eq!(canvas.get_pixel(1, 0), Some(Color::BLACK));
        assert_eq!(canvas.get_pixel(2, 1), Some(Color::BLACK));
    }
}
