//! # Error Types
//!
//! This module defines error types used throughout the nimbo library.

use thiserror::Error;

/// Main error type for nimbo operations
#[derive(Debug, Error)]
pub enum NimboError {
    /// The printer is not connected (no characteristic held, or the
    /// peripheral no longer reports an active link)
    #[error("printer is not connected")]
    NotConnected,

    /// A condition label outside the fixed three-value map (CN, FB, B)
    #[error("unsupported condition label: {0:?}")]
    UnsupportedCondition(String),

    /// No GATT characteristic supporting both write-without-response
    /// and notify was found on the peripheral
    #[error("no characteristic supporting write-without-response and notify")]
    CharacteristicNotFound,

    /// Transport-level errors (scan, connect, characteristic write)
    #[error("transport error: {0}")]
    Transport(String),

    /// Label rasterization error (QR encoding, canvas composition)
    #[error("render error: {0}")]
    Render(String),
}
