//! Locale-formatted number parsing for table cells.
//!
//! Cells carry thousands separators, an optional leading minus and sometimes a
//! decimal point. Garbled cells degrade to zero instead of failing the row.

use serde::{Deserialize, Serialize};

/// A parsed cell value. Integers stay integers so volumes never pass through f64.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub const ZERO: Number = Number::Int(0);

    pub fn as_i64(self) -> i64 {
        match self {
            Number::Int(v) => v,
            Number::Float(v) => v.round() as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::ZERO
    }
}

/// Parse a cell's text. Never fails: anything unparseable is zero.
///
/// Every character other than ASCII digits, `-` and `.` is dropped first.
/// If that leaves something unparseable (`"1-2"`, `"1.2.3"`), the raw text
/// with commas removed gets one more try as a float, which picks up
/// scientific notation such as `"1.5e-3"`.
pub fn parse_number(text: &str) -> Number {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return Number::ZERO;
    }

    let parsed = if cleaned.contains('.') {
        cleaned.parse::<f64>().ok().map(Number::Float)
    } else {
        cleaned.parse::<i64>().ok().map(Number::Int)
    };

    parsed
        .or_else(|| {
            text.trim()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .map(Number::Float)
        })
        .filter(|n| n.as_f64().is_finite())
        .unwrap_or(Number::ZERO)
}
