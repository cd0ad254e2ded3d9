//! # Niimbot Wire Protocol Implementation
//!
//! This module provides low-level frame builders for the binary protocol
//! spoken by Niimbot-style handheld label printers over a Bluetooth LE
//! GATT characteristic.
//!
//! ## Module Structure
//!
//! - [`frame`]: Checksummed frame construction and command constants
//! - [`image`]: Row bitmap packing and image row frames
//!
//! ## Frame Structure
//!
//! Every command travels in one frame:
//!
//! ```text
//! 0x55 0x55 <type:u8> <len:u8> <payload:len bytes> <checksum:u8> 0xAA 0xAA
//! ```
//!
//! with `checksum = type XOR len XOR payload[0] XOR payload[1] XOR ...`,
//! masked to 8 bits.
//!
//! ## Usage Example
//!
//! ```
//! use nimbo::protocol::frame;
//!
//! // Quantity frame: print 3 copies
//! let f = frame::build(frame::SET_QUANTITY, &[0x00, 3]);
//! assert_eq!(f, vec![0x55, 0x55, 0x15, 0x02, 0x00, 0x03, 0x16, 0xAA, 0xAA]);
//! ```
//!
//! ## Protocol Reference
//!
//! There is no public vendor specification; the command set below is the
//! subset exercised by D-series label printers for single-label jobs.

pub mod frame;
pub mod image;
