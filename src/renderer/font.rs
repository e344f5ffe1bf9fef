use rust_embed::RustEmbed;

use super::{Canvas, Color};

/// Bitmap label fonts shipped inside the binary.
#[derive(RustEmbed)]
#[folder = "assets/fonts/"]
struct EmbeddedFonts;

pub const DEFAULT_FONT_NAME: &str = "Reel_6x8";

/// Rows of a glyph cell that sit above the baseline.
const ASCENT_ROWS: usize = 7;

pub struct Font {
    width: usize,
    height: usize,
    glyphs: Vec<Vec<bool>>, // Bitmap data for each of 256 characters
}

/// Labels only ever need printable ASCII; everything else renders as '?'.
fn glyph_code(ch: char) -> u8 {
    if ch.is_ascii() && !ch.is_ascii_control() {
        ch as u8
    } else {
        b'?'
    }
}

impl Font {
    pub fn load(name: Option<&str>) -> Self {
        // Use specified font or default
        let font_name = name.unwrap_or(DEFAULT_FONT_NAME);

        match Self::embedded(font_name) {
            Some(Ok(font)) => return font,
            Some(Err(e)) => tracing::warn!("Failed to parse font '{}': {}", font_name, e),
            None => tracing::warn!(
                "Font '{}' not found. Available fonts: {:?}",
                font_name,
                Self::available_fonts()
            ),
        }

        // Fall back to default font if specified font failed
        if font_name != DEFAULT_FONT_NAME {
            if let Some(Ok(font)) = Self::embedded(DEFAULT_FONT_NAME) {
                return font;
            }
        }

        // Last resort: fallback font
        Self::fallback_font()
    }

    fn embedded(name: &str) -> Option<Result<Self, String>> {
        let file = EmbeddedFonts::get(&format!("{}.fd", name))?;
        Some(
            std::str::from_utf8(&file.data)
                .map_err(|e| format!("font is not UTF-8: {}", e))
                .and_then(Self::parse_fd_font),
        )
    }

    /// Get list of available embedded font names
    pub fn available_fonts() -> Vec<String> {
        let mut names: Vec<String> = EmbeddedFonts::iter()
            .filter_map(|file| file.strip_suffix(".fd").map(str::to_string))
            .collect();
        names.sort();
        names
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get_glyph(&self, ch: u8) -> &[bool] {
        &self.glyphs[ch as usize]
    }

    /// Pixel scale that makes the cell `px` pixels tall.
    pub fn scale_for(&self, px: f32) -> f32 {
        (px / self.height as f32).max(0.25)
    }

    /// Width in pixels of `text` drawn at `size`.
    pub fn text_width(&self, text: &str, size: f32) -> i32 {
        let scaled_width = (self.width as f32 * size) as i32;
        text.chars().count() as i32 * scaled_width
    }

    /// Render `text` so that its baseline sits at `baseline`.
    pub fn render_baseline(&self, canvas: &mut Canvas, x: i32, baseline: i32, text: &str, color: Color, size: f32) {
        let ascent = (ASCENT_ROWS.min(self.height) as f32 * size).round() as i32;
        self.render_string(canvas, x, baseline - ascent, text, color, size);
    }

    /// Render a string of text onto a canvas with scaling
    pub fn render_string(&self, canvas: &mut Canvas, x: i32, y: i32, text: &str, color: Color, size: f32) {
        let scaled_width = (self.width as f32 * size) as i32;

        for (char_idx, ch) in text.chars().enumerate() {
            let char_x = x + (char_idx as i32 * scaled_width);
            self.render_character(canvas, char_x, y, glyph_code(ch), color, size);
        }
    }

    /// Render a single character onto a canvas with scaling
    /// Only renders foreground pixels, leaving background untouched
    fn render_character(&self, canvas: &mut Canvas, x: i32, y: i32, ch: u8, color: Color, size: f32) {
        let glyph = self.get_glyph(ch);
        let scaled_width = (self.width as f32 * size).round() as usize;
        let scaled_height = (self.height as f32 * size).round() as usize;

        for sy in 0..scaled_height {
            for sx in 0..scaled_width {
                // Map scaled pixel back to source glyph pixel (nearest neighbor)
                let glyph_x = ((sx as f32) / size) as usize;
                let glyph_y = ((sy as f32) / size) as usize;

                if glyph_x < self.width && glyph_y < self.height && glyph[glyph_y * self.width + glyph_x] {
                    canvas.blend_pixel(x + sx as i32, y + sy as i32, color, 1.0);
                }
            }
        }
    }

    // Parse .fd font format
    fn parse_fd_font(data: &str) -> Result<Self, String> {
        let lines: Vec<&str> = data.lines().collect();
        let mut height = 16;
        let mut width = 9;
        let mut char_start_idx = None;

        // Parse header
        for (idx, line) in lines.iter().enumerate() {
            let line = line.trim();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }

            if line.starts_with("height") {
                height = line.split_whitespace()
                    .nth(1)
                    .and_then(|s| s.parse().ok())
                    .ok_or("Invalid height")?;
            } else if line.starts_with("width") {
                width = line.split_whitespace()
                    .nth(1)
                    .and_then(|s| s.parse().ok())
                    .ok_or("Invalid width")?;
            } else if line.starts_with("char") {
                // Found first character, remember where it starts
                char_start_idx = Some(idx);
                break;
            }
        }

        let char_start_idx = char_start_idx.ok_or("Font has no characters")?;
        if width == 0 || height == 0 {
            return Err("Font cell must be non-empty".to_string());
        }

        // Now parse characters starting from char_start_idx
        let mut glyphs = vec![vec![false; width * height]; 256];
        let mut current_char: Option<usize> = None;
        let mut bitmap_lines: Vec<String> = Vec::new();

        for line in &lines[char_start_idx..] {
            let line = line.trim();

            if line.starts_with("char") {
                // Save previous character if we have one
                if let Some(ch_idx) = current_char {
                    if ch_idx < 256 && bitmap_lines.len() == height {
                        glyphs[ch_idx] = Self::parse_bitmap(&bitmap_lines, width, height);
                    }
                }

                // Start new character
                current_char = line.split_whitespace()
                    .nth(1)
                    .and_then(|s| s.parse().ok());
                bitmap_lines.clear();
            } else if !line.is_empty() && !line.starts_with('#') && (line.contains('x') || line.contains('.')) {
                // This is a bitmap line
                bitmap_lines.push(line.to_string());
            }
        }

        // Save last character
        if let Some(ch_idx) = current_char {
            if ch_idx < 256 && bitmap_lines.len() == height {
                glyphs[ch_idx] = Self::parse_bitmap(&bitmap_lines, width, height);
            }
        }

        Ok(Self {
            width,
            height,
            glyphs,
        })
    }

    fn parse_bitmap(lines: &[String], char_width: usize, height: usize) -> Vec<bool> {
        let mut bitmap = Vec::with_capacity(char_width * height);

        for line in lines {
            let mut row: Vec<bool> = line.chars().take(char_width).map(|ch| ch == 'x').collect();
            // Pad line if needed
            row.resize(char_width, false);
            bitmap.extend(row);
        }

        // Ensure we have exactly width * height pixels
        bitmap.resize(char_width * height, false);
        bitmap
    }

    // Fallback font in case parsing fails
    fn fallback_font() -> Self {
        let width = 6;
        let height = 8;
        let glyphs = (0..=255u8)
            .map(|i| Self::generate_fallback_glyph(i, width, height))
            .collect();

        Self {
            width,
            height,
            glyphs,
        }
    }

    fn generate_fallback_glyph(ch: u8, width: usize, height: usize) -> Vec<bool> {
        let mut bitmap = vec![false; width * height];

        if ch > b' ' && ch < 127 {
            // Hollow box for every printable character
            for y in 1..height - 1 {
                bitmap[y * width] = true;
                bitmap[y * width + width - 2] = true;
            }
            for x in 0..width - 1 {
                bitmap[width + x] = true;
                bitmap[(height - 2) * width + x] = true;
            }
        }

        bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_font_is_embedded() {
        assert!(Font::available_fonts().contains(&DEFAULT_FONT_NAME.to_string()));
        let font = Font::load(None);
        assert_eq!((font.width(), font.height()), (6, 8));
        // '1' has a vertical stroke; space is blank
        assert!(font.get_glyph(b'1').iter().any(|&on| on));
        assert!(font.get_glyph(b' ').iter().all(|&on| !on));
    }

    #[test]
    fn test_unknown_font_falls_back() {
        let font = Font::load(Some("No_Such_Font"));
        assert_eq!(font.height(), 8);
    }

    #[test]
    fn test_parse_fd() {
        let src = "# tiny\nheight 2\nwidth 3\nchar 65\nx.x\n.x.\n";
        let font = Font::parse_fd_font(src).unwrap();
        assert_eq!(font.get_glyph(b'A'), &[true, false, true, false, true, false]);
        assert!(Font::parse_fd_font("height 2\n").is_err());
    }

    #[test]
    fn test_render_string_draws_foreground_only() {
        let font = Font::load(None);
        let mut canvas = Canvas::new(40, 20);
        font.render_baseline(&mut canvas, 2, 16, "1", Color::WHITE, 2.0);
        let lit = canvas.data().chunks(4).filter(|px| px[0] == 255).count();
        assert!(lit > 0);
        assert_eq!(canvas.get_pixel(39, 19), Some(Color::BLACK));
        assert_eq!(font.text_width("Scene 1", 2.0), 7 * 12);
    }
}
