//! # Nimbo - Bluetooth LE Label Printer Library
//!
//! Nimbo is a Rust library for printing identification labels on
//! Niimbot-style handheld thermal label printers over Bluetooth LE. It
//! provides:
//!
//! - **Protocol implementation**: checksummed wire-protocol frame builders
//! - **Label rasterization**: QR code + text composed into 1-bit row packets
//! - **Packet caching**: per-product pre-rendering so repeat prints are instant
//! - **Print session driver**: paced frame streaming with a strict job lifecycle
//! - **Transport**: BLE central connection management with auto-reconnect
//!
//! ## Quick Start
//!
//! ```no_run
//! use nimbo::{PrinterConfig, PrinterSession};
//! use nimbo::transport::BleScanner;
//!
//! # async fn example() -> Result<(), nimbo::NimboError> {
//! let session = PrinterSession::new(PrinterConfig::D11);
//!
//! // Find and connect the printer
//! let scanner = BleScanner::new().await?;
//! let filter = session.config().device_filter();
//! session
//!     .connection()
//!     .discover_and_connect(&scanner, &filter)
//!     .await?;
//!
//! // Pre-render every condition label while the operator works
//! let precache = session.spawn_precache("B001XYZ");
//! precache.await.ok();
//!
//! // Print two labels for a "new"-condition item
//! session.print_label("B001XYZ", "CN", 2).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | Wire-protocol frame builders |
//! | [`render`] | Label canvas and rasterization |
//! | [`cache`] | Per-product packet cache |
//! | [`printer`] | Print session driver and printer configs |
//! | [`transport`] | BLE connection management |
//! | [`condition`] | Inventory condition buckets |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Currently targeted at the Niimbot D11 (30x15mm gap labels, 203 DPI).
//! Other D-series printers speaking the same frame protocol should work
//! with an adjusted [`PrinterConfig`].

pub mod cache;
pub mod condition;
pub mod error;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod transport;

// Re-exports for convenience
pub use cache::PacketCache;
pub use condition::Condition;
pub use error::NimboError;
pub use printer::{PrinterConfig, PrinterSession};
pub use render::LabelRenderer;
pub use transport::ConnectionManager;
