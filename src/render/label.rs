//! # Label Rasterizer
//!
//! Renders one identification label (a QR glyph plus two text lines)
//! and converts it to the printer's row packets.
//!
//! ## Geometry
//!
//! The label is composed on a logical 240x120 canvas (landscape), then
//! rotated 90 degrees clockwise to the 120x240 device orientation:
//!
//! ```text
//! (0,0)                                240
//!   ┌───────────────────────────────────┐
//!   │   ┌─────────┐                     │
//!   │   │         │   B001XY            │  line 1: chars 0-5
//!   │   │   QR    │                     │
//!   │   │  85x85  │   ZCN               │  line 2: chars 6..
//!   │   └─────────┘                     │
//!   └───────────────────────────────────┘ 120
//!      (15,28)        x=130
//! ```
//!
//! The QR glyph encodes `productCode + conditionLabel` at error
//! correction level M; the same concatenation is split at index 6 into
//! the two text lines.
//!
//! ## 1-Bit Conversion
//!
//! The background is black and the glyph strokes are white, and a device
//! pixel becomes ink when its shade is **greater than 128**, the
//! firmware-calibrated threshold. It determines print contrast
//! and must not change: the printed label is the photographic negative
//! of the canvas, with text and QR quiet zone burned and QR modules
//! left blank.

use std::sync::Arc;

use image::GrayImage;
use qrcode::{EcLevel, QrCode};

use crate::error::NimboError;
use crate::protocol::image::{pack_row, row_frame};
use crate::render::canvas::{BLACK, Canvas, WHITE};

/// Ink threshold: a device pixel with shade strictly above this burns.
pub const INK_THRESHOLD: u8 = 128;

/// The full ordered collection of row frames for one rendered label,
/// shared cheaply between the cache and in-flight jobs.
pub type ImagePacketSet = Arc<Vec<Vec<u8>>>;

/// Rasterization seam. The print session driver and the packet cache see
/// rendering only through this trait, so tests can substitute a counting
/// or stub renderer.
pub trait RenderLabel: Send + Sync {
    /// Render the label for `product_code` + `condition_label`.
    ///
    /// Deterministic: identical inputs yield bit-identical packet sets.
    fn render(&self, product_code: &str, condition_label: &str)
    -> Result<ImagePacketSet, NimboError>;
}

/// # Label Layout
///
/// Fixed geometry of the 30x15mm identification label, in logical
/// (pre-rotation) pixels at 8 dots/mm.
#[derive(Debug, Clone, Copy)]
pub struct LabelLayout {
    /// Logical canvas width (the label's long edge)
    pub width: u32,
    /// Logical canvas height (the label's short edge)
    pub height: u32,
    /// Top-left corner of the QR box
    pub qr_origin: (i64, i64),
    /// Side length of the QR box
    pub qr_box: u32,
    /// Left edge of both text lines
    pub text_x: i64,
    /// Vertical centers of text lines one and two
    pub line_centers: [i64; 2],
    /// Split index: characters before it go to line one, the rest to line two
    pub split_at: usize,
}

impl Default for LabelLayout {
    fn default() -> Self {
        Self {
            width: 240,
            height: 120,
            qr_origin: (15, 28),
            qr_box: 85,
            text_x: 130,
            line_centers: [55, 85],
            split_at: 6,
        }
    }
}

/// The production rasterizer.
#[derive(Debug, Clone, Default)]
pub struct LabelRenderer {
    layout: LabelLayout,
}

impl LabelRenderer {
    pub fn new(layout: LabelLayout) -> Self {
        Self { layout }
    }

    /// Compose the label and return it in device orientation (120x240).
    ///
    /// This is the render pipeline up to (but not including) the 1-bit
    /// conversion; the CLI uses it for PNG previews.
    pub fn render_device_image(
        &self,
        product_code: &str,
        condition_label: &str,
    ) -> Result<GrayImage, NimboError> {
        let layout = &self.layout;
        let text = format!("{product_code}{condition_label}");

        let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::M)
            .map_err(|e| NimboError::Render(format!("QR encoding failed: {e}")))?;

        let mut canvas = Canvas::new(layout.width, layout.height, BLACK);
        canvas.blit_qr(&code, layout.qr_origin.0, layout.qr_origin.1, layout.qr_box)?;

        // Split by characters, not bytes: codes are ASCII in practice but
        // a stray multi-byte character must not panic the renderer.
        let split = text
            .char_indices()
            .nth(layout.split_at)
            .map_or(text.len(), |(i, _)| i);
        canvas.draw_text(&text[..split], layout.text_x, layout.line_centers[0], WHITE);
        canvas.draw_text(&text[split..], layout.text_x, layout.line_centers[1], WHITE);

        Ok(canvas.into_device())
    }
}

impl RenderLabel for LabelRenderer {
    fn render(
        &self,
        product_code: &str,
        condition_label: &str,
    ) -> Result<ImagePacketSet, NimboError> {
        let device = self.render_device_image(product_code, condition_label)?;

        let width = device.width() as usize;
        let mut packets = Vec::with_capacity(device.height() as usize);
        let mut row = vec![false; width];

        for y in 0..device.height() {
            for (x, ink) in row.iter_mut().enumerate() {
                *ink = device.get_pixel(x as u32, y).0[0] > INK_THRESHOLD;
            }
            packets.push(row_frame(y as u16, &pack_row(&row)));
        }

        Ok(Arc::new(packets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_produces_one_packet_per_device_row() {
        let renderer = LabelRenderer::default();
        let packets = renderer.render("B001XYZ", "CN").unwrap();
        assert_eq!(packets.len(), 240);
    }

    #[test]
    fn test_row_packets_have_fixed_length() {
        let renderer = LabelRenderer::default();
        let packets = renderer.render("B001XYZ", "CN").unwrap();
        // 7 framing bytes + 6 header bytes + 15 bitmap bytes for 120 dots
        for packet in packets.iter() {
            assert_eq!(packet.len(), 28);
        }
    }

    #[test]
    fn test_row_packets_are_framed_in_ascending_order() {
        let renderer = LabelRenderer::default();
        let packets = renderer.render("B001XYZ", "CN").unwrap();
        for (y, packet) in packets.iter().enumerate() {
            assert_eq!(&packet[..2], &[0x55, 0x55]);
            assert_eq!(packet[2], 0x85);
            assert_eq!(
                u16::from_be_bytes([packet[4], packet[5]]),
                y as u16,
                "row index header"
            );
            assert_eq!(&packet[packet.len() - 2..], &[0xAA, 0xAA]);
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = LabelRenderer::default();
        let a = renderer.render("B001XYZ", "FB").unwrap();
        let b = renderer.render("B001XYZ", "FB").unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_different_inputs_differ() {
        let renderer = LabelRenderer::default();
        let a = renderer.render("B001XYZ", "CN").unwrap();
        let b = renderer.render("B001XYZ", "B").unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_label_has_ink_and_blank_regions() {
        let renderer = LabelRenderer::default();
        let packets = renderer.render("B001XYZ", "CN").unwrap();
        let any_ink = packets.iter().any(|p| p[10..25].iter().any(|&b| b != 0));
        let any_blank = packets.iter().any(|p| p[10..25].iter().any(|&b| b != 0xFF));
        assert!(any_ink, "QR quiet zone and text should burn");
        assert!(any_blank, "background should stay blank");
    }

    #[test]
    fn test_short_text_renders() {
        // Shorter than the split index: line two is empty.
        let renderer = LabelRenderer::default();
        let packets = renderer.render("B01", "B").unwrap();
        assert_eq!(packets.len(), 240);
    }

    #[test]
    fn test_oversized_payload_is_a_render_error() {
        let renderer = LabelRenderer::default();
        let huge = "X".repeat(4000);
        let err = renderer.render(&huge, "CN").unwrap_err();
        assert!(matches!(err, NimboError::Render(_)));
    }
}
