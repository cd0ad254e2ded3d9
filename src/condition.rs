//! # Inventory Condition Buckets
//!
//! Received stock is graded into three printable condition buckets. Each
//! bucket has a short wire label that is appended to the product code,
//! encoded in the QR glyph and printed on the label's second text line.
//!
//! | Condition | Wire label | Cache key |
//! |-----------|-----------|-----------|
//! | New | `CN` | `new` |
//! | Very good | `FB` | `very-good` |
//! | Good | `B` | `good` |
//!
//! Broken items are never printed, so there is no fourth value.

use serde::{Deserialize, Serialize};

/// One of the three printable condition buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    New,
    VeryGood,
    Good,
}

impl Condition {
    /// All conditions, in precache order.
    pub const ALL: [Condition; 3] = [Condition::New, Condition::VeryGood, Condition::Good];

    /// Parse a wire label (`CN`, `FB`, `B`). Anything else is unsupported.
    pub fn from_wire_label(label: &str) -> Option<Self> {
        match label {
            "CN" => Some(Condition::New),
            "FB" => Some(Condition::VeryGood),
            "B" => Some(Condition::Good),
            _ => None,
        }
    }

    /// The short label appended to the product code on the printed label.
    pub fn wire_label(self) -> &'static str {
        match self {
            Condition::New => "CN",
            Condition::VeryGood => "FB",
            Condition::Good => "B",
        }
    }

    /// The stable cache/storage key.
    pub fn key(self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::VeryGood => "very-good",
            Condition::Good => "good",
        }
    }

    /// Dense index, used by the packet cache's per-condition slots.
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Condition::New => 0,
            Condition::VeryGood => 1,
            Condition::Good => 2,
        }
    }
}
