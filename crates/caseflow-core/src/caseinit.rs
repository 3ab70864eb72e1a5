//! Initialization of variables the source does not supply.
//!
//! When the dictionary has grown past the source's layout (variables created
//! by transformations), those values start each case as system-missing or
//! blank. Variables marked LEAVE instead start with the value they had at
//! the end of the previous case, and with zero or blanks on the first case.

use caseflow_model::{Case, CaseMap, Dictionary, Result, Value};

/// Tracks LEAVE values across cases for one run.
#[derive(Debug, Clone, Default)]
pub struct CaseInit {
    left: Vec<(usize, Value)>,
}

impl CaseInit {
    /// Build for cases of `dict` produced through `map`. Only variables that
    /// `map` leaves unfilled are tracked.
    #[must_use]
    pub fn new(dict: &Dictionary, map: &CaseMap) -> Self {
        let left = dict
            .iter()
            .filter(|var| var.leave())
            .filter(|var| map.sources().get(var.position()).is_some_and(Option::is_none))
            .map(|var| {
                let initial = if var.kind().is_numeric() {
                    Value::number(0.0)
                } else {
                    Value::missing(var.width())
                };
                (var.position(), initial)
            })
            .collect();
        Self { left }
    }

    /// Number of LEAVE variables tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// True when there is nothing to carry over.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Fill LEAVE variables of a freshly mapped case.
    ///
    /// Fails if `case` is not laid out for the dictionary this was built
    /// from.
    pub fn init(&self, case: &mut Case) -> Result<()> {
        for (position, value) in &self.left {
            case.set(*position, value.clone())?;
        }
        Ok(())
    }

    /// Remember LEAVE values after the permanent transformations ran.
    pub fn update(&mut self, case: &Case) {
        for (position, value) in &mut self.left {
            if let Some(current) = case.get(*position) {
                value.clone_from(current);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_model::VarKind;

    #[test]
    fn test_leave_carries_previous_value() {
        let src = Dictionary::from_vars([("X", VarKind::Numeric)]).unwrap();
        let mut dict = src.clone();
        dict.add_var("TOTAL", VarKind::Numeric).unwrap();
        dict.add_var("TMP", VarKind::Numeric).unwrap();
        dict.set_leave("TOTAL", true).unwrap();

        let map = CaseMap::between(&src, &dict).unwrap();
        let mut init = CaseInit::new(&dict, &map);
        assert_eq!(init.len(), 1);

        let mut first = map.apply(Case::new(vec![Value::number(5.0)]));
        init.init(&mut first).unwrap();
        assert_eq!(first.number(1), Some(0.0));
        assert!(first[2].is_sysmis());

        first.set(1, Value::number(5.0)).unwrap();
        init.update(&first);

        let mut second = map.apply(Case::new(vec![Value::number(7.0)]));
        init.init(&mut second).unwrap();
        assert_eq!(second.number(1), Some(5.0));
    }

    #[test]
    fn test_supplied_leave_var_not_tracked() {
        let mut dict = Dictionary::from_vars([("X", VarKind::Numeric)]).unwrap();
        dict.set_leave("X", true).unwrap();
        let map = CaseMap::between(&dict, &dict).unwrap();
        assert!(CaseInit::new(&dict, &map).is_empty());
    }

    #[test]
    fn test_init_rejects_case_of_another_layout() {
        let src = Dictionary::from_vars([("X", VarKind::Numeric)]).unwrap();
        let mut dict = src.clone();
        dict.add_var("TOTAL", VarKind::Numeric).unwrap();
        dict.set_leave("TOTAL", true).unwrap();
        let init = CaseInit::new(&dict, &CaseMap::between(&src, &dict).unwrap());

        let mut short = Case::new(vec![Value::number(1.0)]);
        assert!(init.init(&mut short).is_err());
        let mut wrong_kind = Case::new(vec![Value::number(1.0), Value::string("A", 1)]);
        assert!(init.init(&mut wrong_kind).is_err());
    }
}
