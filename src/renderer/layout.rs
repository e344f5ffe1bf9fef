/// Where a scaled image lands on the surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DrawRect {
    /// Integer placement: (x, y, width, height), clamped so it stays on the surface.
    pub fn to_pixels(&self, surface_width: u32, surface_height: u32) -> (i32, i32, u32, u32) {
        let width = (self.width.round() as u32).clamp(1, surface_width.max(1));
        let height = (self.height.round() as u32).clamp(1, surface_height.max(1));
        let x = (self.x.round() as i32).clamp(0, surface_width.saturating_sub(width) as i32);
        let y = (self.y.round() as i32).clamp(0, surface_height.saturating_sub(height) as i32);
        (x, y, width, height)
    }
}

/// Fit an image into the surface without cropping or distortion.
///
/// A relatively wider image spans the full width and is centered vertically;
/// otherwise it spans the full height and is centered horizontally.
pub fn fit_contain(image_width: u32, image_height: u32, surface_width: u32, surface_height: u32) -> DrawRect {
    let (sw, sh) = (surface_width as f64, surface_height as f64);
    if image_width == 0 || image_height == 0 || surface_width == 0 || surface_height == 0 {
        return DrawRect { x: sw / 2.0, y: sh / 2.0, width: 0.0, height: 0.0 };
    }

    let aspect = image_width as f64 / image_height as f64;
    let surface_aspect = sw / sh;

    if aspect > surface_aspect {
        let height = sw / aspect;
        DrawRect {
            x: 0.0,
            y: (sh - height) / 2.0,
            width: sw,
            height,
        }
    } else {
        let width = sh * aspect;
        DrawRect {
            x: (sw - width) / 2.0,
            y: 0.0,
            width,
            height: sh,
        }
    }
}
