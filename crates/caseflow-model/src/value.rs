//! Typed case values.
//!
//! A value is either a double or a byte string padded with spaces to the
//! declared width of its variable. Numeric "no data" is the system-missing
//! sentinel [`SYSMIS`], which sorts below every other number.

use std::cmp::Ordering;
use std::fmt;

/// System-missing numeric value.
pub const SYSMIS: f64 = -f64::MAX;

/// Width used for numeric variables.
pub const NUMERIC_WIDTH: usize = 0;

/// A single value in a case.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numeric value ([`SYSMIS`] when missing).
    Number(f64),
    /// Fixed-width string, space padded.
    String(Box<[u8]>),
}

impl Value {
    /// System-missing numeric value.
    #[must_use]
    pub const fn sysmis() -> Self {
        Self::Number(SYSMIS)
    }

    /// Numeric value.
    #[must_use]
    pub const fn number(x: f64) -> Self {
        Self::Number(x)
    }

    /// String value padded or truncated to `width` bytes.
    ///
    /// A `width` of zero yields an empty string, not a number; use
    /// [`Value::missing`] when the width may denote a numeric variable.
    #[must_use]
    pub fn string(text: impl AsRef<[u8]>, width: usize) -> Self {
        let text = text.as_ref();
        let mut bytes = vec![b' '; width];
        let n = text.len().min(width);
        bytes[..n].copy_from_slice(&text[..n]);
        Self::String(bytes.into_boxed_slice())
    }

    /// The type-appropriate missing value for a variable of `width`:
    /// system-missing for numerics, all blanks for strings.
    #[must_use]
    pub fn missing(width: usize) -> Self {
        if width == NUMERIC_WIDTH {
            Self::sysmis()
        } else {
            Self::String(vec![b' '; width].into_boxed_slice())
        }
    }

    /// Width of this value (0 for numbers).
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Number(_) => NUMERIC_WIDTH,
            Self::String(bytes) => bytes.len(),
        }
    }

    /// True for the system-missing number.
    #[must_use]
    pub fn is_sysmis(&self) -> bool {
        matches!(self, Self::Number(x) if *x == SYSMIS)
    }

    /// The numeric payload, if this is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(x) => Some(*x),
            Self::String(_) => None,
        }
    }

    /// The string payload, if this is a string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Number(_) => None,
            Self::String(bytes) => Some(bytes),
        }
    }

    /// Compare two values for BY-key and split-file purposes.
    ///
    /// Numbers compare by value (system-missing lowest), strings byte-wise
    /// over their full width. Unordered numbers (NaN) compare equal. A
    /// number always sorts before a string.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Number(_), Self::String(_)) => Ordering::Less,
            (Self::String(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(x) if *x == SYSMIS => write!(f, "."),
            Self::Number(x) => write!(f, "{x}"),
            Self::String(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                write!(f, "{}", text.trim_end())
            }
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Number(x)
    }
}
