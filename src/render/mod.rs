//! # Label Rasterization
//!
//! This module turns a product code and condition label into the 1-bit
//! row packets the printer firmware understands.
//!
//! ## Pipeline
//!
//! 1. [`canvas`]: compose the label on a logical 240x120 grayscale canvas
//!    (QR glyph + two text lines) and rotate it 90 degrees clockwise into
//!    the 120x240 device orientation
//! 2. [`label`]: threshold the rotated canvas to 1-bit rows and wrap each
//!    row as an image row frame
//!
//! Rendering is deterministic: identical inputs produce bit-identical
//! packet sets. The packet cache relies on this.

pub mod canvas;
pub mod label;

pub use label::{ImagePacketSet, LabelRenderer, RenderLabel};
