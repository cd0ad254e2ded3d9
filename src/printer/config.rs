//! # Printer Configuration
//!
//! Hardware and protocol parameters for supported label printers.
//!
//! ## Supported Printers
//!
//! | Model | Label (dots) | Resolution | Interface |
//! |-------|--------------|------------|-----------|
//! | D11 | 120 x 240 (30x15mm) | 203 DPI | Bluetooth LE |
//!
//! ## Usage
//!
//! ```
//! use nimbo::printer::PrinterConfig;
//!
//! let config = PrinterConfig::D11;
//! assert_eq!(config.row_bytes(), 15);
//! ```

use std::time::Duration;

use uuid::Uuid;

use crate::transport::DeviceFilter;

/// Vendor serial-port-emulation service advertised by D-series printers.
pub const SPP_SERVICE_UUID: Uuid = Uuid::from_u128(0xe7810a71_73ae_499d_8c15_faa9aef0c3f2);

/// ISSC transparent UART service, the alternative characteristic host.
pub const ISSC_SERIAL_SERVICE_UUID: Uuid = Uuid::from_u128(0x49535343_fe7d_4ae5_8fa9_9fafd205e455);

/// # Printer Configuration
///
/// Defines the label geometry and protocol timing for one printer model.
///
/// ## Pacing
///
/// The delays after each characteristic write are part of the protocol
/// contract with the firmware's receive buffer, not a tuning knob: the
/// peripheral drops frames when they arrive faster than it drains them.
/// Control frames tolerate a short gap; image rows need the longer one.
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    /// Printer model name
    pub name: &'static str,

    /// Label width in device dots (across the print head)
    pub label_width: u16,

    /// Label height in device dots (feed direction; one image row each)
    pub label_height: u16,

    /// Resolution in dots per inch
    pub dpi: u16,

    /// Print density (1-5)
    pub density: u8,

    /// Label type (1 = gap label)
    pub label_type: u8,

    /// Delay after each control frame write
    pub control_pacing: Duration,

    /// Delay after each image row frame write
    pub row_pacing: Duration,

    /// Pause between condition renders during a background precache,
    /// yielding the executor to interactive work
    pub precache_pause: Duration,

    /// Advertised-name prefix used when scanning for the printer
    pub name_prefix: &'static str,
}

impl PrinterConfig {
    /// # Niimbot D11 Configuration
    ///
    /// Handheld 203 DPI thermal label printer, 30x15mm gap labels
    /// (240x120 dots pre-rotation, 120x240 in device orientation).
    pub const D11: Self = Self {
        name: "Niimbot D11",
        label_width: 120,
        label_height: 240,
        dpi: 203,
        density: 3,
        label_type: 1,
        control_pacing: Duration::from_millis(5),
        row_pacing: Duration::from_millis(20),
        precache_pause: Duration::from_millis(50),
        name_prefix: "D",
    };

    /// Bitmap bytes per image row (`ceil(label_width / 8)`).
    #[inline]
    pub fn row_bytes(&self) -> usize {
        (self.label_width as usize).div_ceil(8)
    }

    /// Calculate dots per millimeter
    #[inline]
    pub fn dots_per_mm(&self) -> f32 {
        self.dpi as f32 / 25.4
    }

    /// The BLE scan filter for this model: name prefix plus the two
    /// vendor serial services.
    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter {
            name_prefix: Some(self.name_prefix.to_string()),
            services: vec![SPP_SERVICE_UUID, ISSC_SERIAL_SERVICE_UUID],
        }
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::D11
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_d11_dimensions() {
        let config = PrinterConfig::D11;
        assert_eq!(config.label_width, 120);
        assert_eq!(config.label_height, 240);
        assert_eq!(config.row_bytes(), 15);
    }

    #[test]
    fn test_dots_per_mm() {
        // 203 DPI ~= 8 dots/mm; the 30x15mm label is 240x120 dots
        let dpmm = PrinterConfig::D11.dots_per_mm();
        assert!((dpmm - 8.0).abs() < 0.1);
    }

    #[test]
    fn test_row_pacing_is_the_long_delay() {
        let config = PrinterConfig::D11;
        assert!(config.row_pacing >= config.control_pacing);
    }

    #[test]
    fn test_device_filter() {
        let filter = PrinterConfig::D11.device_filter();
        assert_eq!(filter.name_prefix.as_deref(), Some("D"));
        assert_eq!(
            filter.services,
            vec![SPP_SERVICE_UUID, ISSC_SERIAL_SERVICE_UUID]
        );
    }

    #[test]
    fn test_default_is_d11() {
        assert_eq!(PrinterConfig::default().name, PrinterConfig::D11.name);
    }
}
