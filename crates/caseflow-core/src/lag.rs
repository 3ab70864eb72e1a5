//! Look-back buffer for LAG.
//!
//! Holds the `n_lag` most recently emitted cases in a ring. The buffer must
//! be consulted before the current case is pushed, so that `get(1)` is the
//! previous case and never the current one.

use caseflow_model::{Case, Value};

/// Fixed-capacity ring of recent cases.
#[derive(Debug, Clone, Default)]
pub struct LagQueue {
    slots: Vec<Case>,
    capacity: usize,
    head: usize,
    count: usize,
}

impl LagQueue {
    /// Create a queue remembering `capacity` cases. A capacity of zero
    /// disables look-back entirely.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            count: 0,
        }
    }

    /// Maximum look-back distance.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cases currently available (never more than capacity).
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True before the first push (or always, for a zero-capacity queue).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Remember `case`, evicting the oldest one when full.
    pub fn push(&mut self, case: Case) {
        if self.capacity == 0 {
            return;
        }
        if self.slots.len() < self.capacity {
            self.slots.push(case);
        } else {
            self.slots[self.head] = case;
        }
        self.head = (self.head + 1) % self.capacity;
        self.count = (self.count + 1).min(self.capacity);
    }

    /// The case pushed `k` pushes ago (`k = 1` is the most recent), or
    /// `None` if `k` is zero or fewer than `k` cases have been pushed.
    #[must_use]
    pub fn get(&self, k: usize) -> Option<&Case> {
        if k == 0 || k > self.count {
            return None;
        }
        let idx = (self.head + self.capacity - k) % self.capacity;
        self.slots.get(idx)
    }

    /// Value of variable `position` in the case `k` pushes ago.
    #[must_use]
    pub fn value(&self, k: usize, position: usize) -> Option<&Value> {
        self.get(k).and_then(|case| case.get(position))
    }

    /// Forget every remembered case.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(x: f64) -> Case {
        Case::new(vec![Value::number(x)])
    }

    #[test]
    fn test_unavailable_before_enough_pushes() {
        let mut lag = LagQueue::new(3);
        assert!(lag.get(1).is_none());
        lag.push(case(1.0));
        assert_eq!(lag.get(1), Some(&case(1.0)));
        assert!(lag.get(2).is_none());
        assert!(lag.get(0).is_none());
    }

    #[test]
    fn test_wraps_and_evicts_oldest() {
        let mut lag = LagQueue::new(2);
        for x in 1..=5 {
            lag.push(case(f64::from(x)));
        }
        assert_eq!(lag.len(), 2);
        assert_eq!(lag.get(1), Some(&case(5.0)));
        assert_eq!(lag.get(2), Some(&case(4.0)));
        assert!(lag.get(3).is_none());
    }

    #[test]
    fn test_zero_capacity_is_inert() {
        let mut lag = LagQueue::new(0);
        lag.push(case(1.0));
        assert!(lag.is_empty());
        assert!(lag.get(1).is_none());
    }

    #[test]
    fn test_value_and_clear() {
        let mut lag = LagQueue::new(1);
        lag.push(case(9.0));
        assert_eq!(lag.value(1, 0), Some(&Value::number(9.0)));
        assert!(lag.value(1, 3).is_none());
        lag.clear();
        assert!(lag.get(1).is_none());
    }
}
