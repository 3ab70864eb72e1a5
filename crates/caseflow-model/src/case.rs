//! Cases and case prototypes.

use std::cmp::Ordering;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::value::{NUMERIC_WIDTH, Value};

/// The shape of a case: one width per value, 0 meaning numeric.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseProto {
    widths: Vec<usize>,
}

impl CaseProto {
    /// Create a prototype from value widths.
    #[must_use]
    pub fn new(widths: Vec<usize>) -> Self {
        Self { widths }
    }

    /// Number of values in a case of this shape.
    #[must_use]
    pub fn len(&self) -> usize {
        self.widths.len()
    }

    /// True when the prototype describes zero values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    /// Width of the value at `idx`.
    #[must_use]
    pub fn width(&self, idx: usize) -> Option<usize> {
        self.widths.get(idx).copied()
    }

    /// All widths in order.
    #[must_use]
    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    /// Append a value of `width`.
    pub fn push(&mut self, width: usize) {
        self.widths.push(width);
    }

    /// Number of bytes a case of this shape occupies in fixed-width
    /// binary form: 8 per number, the declared width per string.
    #[must_use]
    pub fn record_len(&self) -> usize {
        self.widths
            .iter()
            .map(|&w| if w == NUMERIC_WIDTH { 8 } else { w })
            .sum()
    }

    /// A case with every value missing.
    #[must_use]
    pub fn blank_case(&self) -> Case {
        Case::new(self.widths.iter().map(|&w| Value::missing(w)).collect())
    }

    /// Verify that `case` has exactly this shape.
    pub fn check(&self, case: &Case) -> Result<()> {
        if case.len() != self.widths.len() {
            return Err(ModelError::SchemaMismatch {
                expected: self.widths.len(),
                actual: case.len(),
            });
        }
        let pairs = case.values().iter().zip(&self.widths);
        for (position, (value, &expected)) in pairs.enumerate() {
            let actual = value.width();
            let kind_ok = matches!(
                (value, expected),
                (Value::Number(_), NUMERIC_WIDTH) | (Value::String(_), 1..)
            );
            if !kind_ok || actual != expected {
                return Err(ModelError::WidthMismatch {
                    position,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// One row of values.
///
/// Cases are plain owned values: keeping a case past the point where it is
/// handed on requires an explicit clone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Case {
    values: Vec<Value>,
}

impl Case {
    /// Create a case from values.
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the case has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All values in order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Numeric value at `idx`, if present and numeric.
    #[must_use]
    pub fn number(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).and_then(Value::as_number)
    }

    /// Replace the value at `idx`.
    ///
    /// The replacement must have the same width as the value it replaces,
    /// so a case never changes shape in place.
    pub fn set(&mut self, idx: usize, value: Value) -> Result<()> {
        let len = self.values.len();
        let slot = self.values.get_mut(idx).ok_or(ModelError::SchemaMismatch {
            expected: idx + 1,
            actual: len,
        })?;
        let same_kind = std::mem::discriminant(slot) == std::mem::discriminant(&value);
        if !same_kind || slot.width() != value.width() {
            return Err(ModelError::WidthMismatch {
                position: idx,
                expected: slot.width(),
                actual: value.width(),
            });
        }
        *slot = value;
        Ok(())
    }

    /// Consume the case, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Values at `positions`, cloned, in the order given.
    #[must_use]
    pub fn project(&self, positions: &[usize]) -> Vec<Value> {
        positions
            .iter()
            .filter_map(|&p| self.values.get(p).cloned())
            .collect()
    }

    /// Lexicographic comparison of the values at `positions`.
    #[must_use]
    pub fn compare_at(&self, other: &Case, positions: &[usize]) -> Ordering {
        compare_keys(
            positions.iter().filter_map(|&p| self.values.get(p)),
            positions.iter().filter_map(|&p| other.values.get(p)),
        )
    }
}

impl Index<usize> for Case {
    type Output = Value;

    fn index(&self, idx: usize) -> &Value {
        &self.values[idx]
    }
}

impl From<Vec<Value>> for Case {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Lexicographic comparison of two key tuples using [`Value::compare`].
pub fn compare_keys<'a>(
    a: impl IntoIterator<Item = &'a Value>,
    b: impl IntoIterator<Item = &'a Value>,
) -> Ordering {
    let mut b = b.into_iter();
    for x in a {
        let Some(y) = b.next() else {
            return Ordering::Greater;
        };
        match x.compare(y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    if b.next().is_some() {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}
