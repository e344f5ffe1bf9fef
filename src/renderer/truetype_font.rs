use fontdue::{Font as FontdueFont, FontSettings};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{Canvas, Color};

/// A rasterized glyph: coverage bitmap plus placement metrics.
#[derive(Clone)]
struct CachedGlyph {
    width: usize,
    height: usize,
    xmin: i32,
    ymin: i32,
    advance: f32,
    coverage: Vec<u8>,
}

/// TrueType font wrapper using fontdue for antialiased label rendering
pub struct TrueTypeFont {
    font: Arc<FontdueFont>,
    family: Option<String>,
    /// Cache keyed by character and pixel size (bit pattern of the f32)
    glyph_cache: Arc<Mutex<HashMap<(char, u32), CachedGlyph>>>,
}

impl TrueTypeFont {
    /// Load a TrueType font from a file path
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let font_data = std::fs::read(path)
            .map_err(|e| format!("Failed to read font file '{}': {}", path.display(), e))?;
        Self::from_bytes(&font_data)
    }

    /// Load a TrueType font from bytes
    pub fn from_bytes(font_data: &[u8]) -> Result<Self, String> {
        let font = FontdueFont::from_bytes(font_data, FontSettings::default())
            .map_err(|e| format!("Failed to parse font: {}", e))?;

        // Family name comes from the name table, which fontdue does not expose
        let face = ttf_parser::Face::parse(font_data, 0)
            .map_err(|e| format!("Failed to parse font metrics: {:?}", e))?;
        let family = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode())
            .find_map(|name| name.to_string());

        tracing::debug!(family = ?family, "loaded TrueType label font");

        Ok(Self {
            font: Arc::new(font),
            family,
            glyph_cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    fn glyph(&self, ch: char, px: f32) -> CachedGlyph {
        let key = (ch, px.to_bits());

        // Check cache first
        if let Ok(cache) = self.glyph_cache.lock() {
            if let Some(glyph) = cache.get(&key) {
                return glyph.clone();
            }
        }

        let (metrics, coverage) = self.font.rasterize(ch, px);
        let glyph = CachedGlyph {
            width: metrics.width,
            height: metrics.height,
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            advance: metrics.advance_width,
            coverage,
        };

        if let Ok(mut cache) = self.glyph_cache.lock() {
            cache.insert(key, glyph.clone());
        }

        glyph
    }

    /// Width in pixels of `text` at `px` size.
    pub fn text_width(&self, text: &str, px: f32) -> i32 {
        text.chars().map(|ch| self.glyph(ch, px).advance).sum::<f32>().round() as i32
    }

    /// Render `text` with its baseline at `baseline`, blending glyph coverage.
    pub fn render_baseline(&self, canvas: &mut Canvas, x: i32, baseline: i32, text: &str, color: Color, px: f32) {
        let mut pen_x = x as f32;

        for ch in text.chars() {
            let glyph = self.glyph(ch, px);

            // fontdue's ymin is the distance from the baseline to the glyph's bottom edge
            let top = baseline - glyph.ymin - glyph.height as i32;
            let left = pen_x.round() as i32 + glyph.xmin;

            for gy in 0..glyph.height {
                for gx in 0..glyph.width {
                    let alpha = glyph.coverage[gy * glyph.width + gx];
                    if alpha > 0 {
                        canvas.blend_pixel(left + gx as i32, top + gy as i32, color, alpha as f32 / 255.0);
                    }
                }
            }

            pen_x += glyph.advance;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_garbage() {
        assert!(TrueTypeFont::from_bytes(b"definitely not a font").is_err());
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = TrueTypeFont::from_file(Path::new("/no/such/font.ttf")).err().unwrap();
        assert!(err.contains("/no/such/font.ttf"));
    }
}
