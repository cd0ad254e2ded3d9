//! # Label Canvas
//!
//! A small monochrome drawing surface for label composition, backed by an
//! 8-bit grayscale [`GrayImage`]. Only two shades are ever drawn ([`BLACK`]
//! and [`WHITE`]); the 1-bit conversion happens later in
//! [`label`](super::label).
//!
//! The canvas is composed in the logical (landscape) orientation and
//! rotated 90 degrees clockwise into the device (portrait) orientation
//! with [`Canvas::into_device`], matching the printer's feed direction.

use image::{GrayImage, Luma, imageops};
use qrcode::QrCode;
use spleen_font::{FONT_12X24, PSF2Font};

use crate::error::NimboError;

/// Background shade. Thresholds below ink, so black areas print blank.
pub const BLACK: u8 = 0;

/// Foreground shade. Thresholds above ink, so white areas burn.
pub const WHITE: u8 = 255;

/// Spleen glyph cell width in pixels.
pub const GLYPH_WIDTH: u32 = 12;

/// Spleen glyph cell height in pixels.
pub const GLYPH_HEIGHT: u32 = 24;

/// QR quiet zone, in modules, on each side of the code.
const QR_QUIET_MODULES: u32 = 2;

/// A grayscale label canvas in logical (pre-rotation) orientation.
pub struct Canvas {
    image: GrayImage,
}

impl Canvas {
    /// Create a canvas filled with `shade`.
    pub fn new(width: u32, height: u32, shade: u8) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, Luma([shade])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Set one pixel. Out-of-bounds coordinates are clipped silently.
    #[inline]
    pub fn set(&mut self, x: i64, y: i64, shade: u8) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height() {
            self.image.put_pixel(x as u32, y as u32, Luma([shade]));
        }
    }

    /// Fill an axis-aligned rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, shade: u8) {
        for dy in 0..h as i64 {
            for dx in 0..w as i64 {
                self.set(x + dx, y + dy, shade);
            }
        }
    }

    /// # Blit a QR Code
    ///
    /// Draws `code` into a `box_px` x `box_px` square at `(x, y)`: the
    /// whole box is filled white, then the dark modules are drawn black
    /// at an integer cell size with a 2-module quiet zone, centered in
    /// the box.
    ///
    /// Fails when the code has too many modules to fit the box at one
    /// pixel per module.
    pub fn blit_qr(&mut self, code: &QrCode, x: i64, y: i64, box_px: u32) -> Result<(), NimboError> {
        let modules = code.width() as u32;
        let total = modules + 2 * QR_QUIET_MODULES;
        let cell = box_px / total;
        if cell == 0 {
            return Err(NimboError::Render(format!(
                "QR code with {modules} modules does not fit a {box_px}px box"
            )));
        }

        self.fill_rect(x, y, box_px, box_px, WHITE);

        // Center the quiet-zone-included code within the box
        let offset = ((box_px - total * cell) / 2 + QR_QUIET_MODULES * cell) as i64;
        for qy in 0..modules as usize {
            for qx in 0..modules as usize {
                if code[(qx, qy)] == qrcode::Color::Dark {
                    self.fill_rect(
                        x + offset + qx as i64 * cell as i64,
                        y + offset + qy as i64 * cell as i64,
                        cell,
                        cell,
                        BLACK,
                    );
                }
            }
        }
        Ok(())
    }

    /// # Draw a Text Line
    ///
    /// Renders `text` in Spleen 12x24 glyphs, left-aligned at `x` and
    /// vertically centered on `center_y`. Characters missing from the
    /// font get a box outline, matching the usual bitmap-font fallback.
    pub fn draw_text(&mut self, text: &str, x: i64, center_y: i64, shade: u8) {
        let top = center_y - GLYPH_HEIGHT as i64 / 2;
        let mut font = PSF2Font::new(FONT_12X24).unwrap();

        for (i, ch) in text.chars().enumerate() {
            let glyph_x = x + (i as u32 * GLYPH_WIDTH) as i64;
            let utf8 = ch.to_string();

            match font.glyph_for_utf8(utf8.as_bytes()) {
                Some(glyph) => {
                    for (gy, row) in glyph.enumerate() {
                        for (gx, on) in row.enumerate() {
                            if on {
                                self.set(glyph_x + gx as i64, top + gy as i64, shade);
                            }
                        }
                    }
                }
                None => self.draw_box_outline(glyph_x, top, GLYPH_WIDTH, GLYPH_HEIGHT, shade),
            }
        }
    }

    /// Box outline fallback for characters the font does not cover.
    fn draw_box_outline(&mut self, x: i64, y: i64, w: u32, h: u32, shade: u8) {
        for dx in 0..w as i64 {
            self.set(x + dx, y, shade);
            self.set(x + dx, y + h as i64 - 1, shade);
        }
        for dy in 0..h as i64 {
            self.set(x, y + dy, shade);
            self.set(x + w as i64 - 1, y + dy, shade);
        }
    }

    /// Rotate 90 degrees clockwise into the device orientation.
    ///
    /// A logical pixel `(x, y)` on a canvas of height `H` lands at device
    /// `(H - 1 - y, x)`, the same mapping the firmware expects for a
    /// landscape label fed sideways.
    pub fn into_device(self) -> GrayImage {
        imageops::rotate90(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrcode::EcLevel;

    #[test]
    fn test_new_fills_background() {
        let canvas = Canvas::new(10, 5, BLACK);
        let device = canvas.into_device();
        assert!(device.pixels().all(|p| p.0[0] == BLACK));
    }

    #[test]
    fn test_set_clips_out_of_bounds() {
        let mut canvas = Canvas::new(4, 4, BLACK);
        canvas.set(-1, 0, WHITE);
        canvas.set(0, -1, WHITE);
        canvas.set(4, 0, WHITE);
        canvas.set(0, 4, WHITE);
        assert!(canvas.into_device().pixels().all(|p| p.0[0] == BLACK));
    }

    #[test]
    fn test_rotation_mapping() {
        // Mark logical (3, 1) on a 6x4 canvas; after a clockwise rotation
        // it must land at device (H - 1 - y, x) = (2, 3) on a 4x6 image.
        let mut canvas = Canvas::new(6, 4, BLACK);
        canvas.set(3, 1, WHITE);
        let device = canvas.into_device();

        assert_eq!(device.width(), 4);
        assert_eq!(device.height(), 6);
        assert_eq!(device.get_pixel(2, 3).0[0], WHITE);
        assert_eq!(
            device.pixels().filter(|p| p.0[0] == WHITE).count(),
            1,
            "exactly one pixel should be set"
        );
    }

    #[test]
    fn test_blit_qr_draws_finder_pattern() {
        let code = QrCode::with_error_correction_level(b"B001XYZCN", EcLevel::M).unwrap();
        let mut canvas = Canvas::new(120, 120, BLACK);
        canvas.blit_qr(&code, 10, 10, 85).unwrap();

        let device = canvas.into_device();
        let shades: Vec<u8> = device.pixels().map(|p| p.0[0]).collect();
        // The box contributes both white (quiet zone) and black (modules)
        assert!(shades.iter().any(|&s| s == WHITE));
        assert!(shades.iter().any(|&s| s == BLACK));
    }

    #[test]
    fn test_blit_qr_rejects_overfull_box() {
        let code = QrCode::with_error_correction_level(b"B001XYZCN", EcLevel::M).unwrap();
        let mut canvas = Canvas::new(50, 50, BLACK);
        // 21 modules + quiet zone cannot fit a 20px box at 1px/module
        let err = canvas.blit_qr(&code, 0, 0, 20).unwrap_err();
        assert!(matches!(err, NimboError::Render(_)));
    }

    #[test]
    fn test_draw_text_marks_pixels() {
        let mut canvas = Canvas::new(120, 40, BLACK);
        canvas.draw_text("B001XY", 0, 20, WHITE);
        let device = canvas.into_device();
        assert!(device.pixels().any(|p| p.0[0] == WHITE));
    }

    #[test]
    fn test_draw_text_deterministic() {
        let render = |text: &str| {
            let mut canvas = Canvas::new(120, 40, BLACK);
            canvas.draw_text(text, 2, 20, WHITE);
            canvas.into_device().into_raw()
        };
        assert_eq!(render("ABC123"), render("ABC123"));
    }
}
