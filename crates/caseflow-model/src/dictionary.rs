//! Dictionaries: the ordered variable list that shapes every case.
//!
//! A dictionary is read-only while a pipeline run is active. Between runs
//! it may be edited with [`Dictionary::rename_vars`], [`Dictionary::delete_vars`]
//! and [`Dictionary::keep_vars`]; each variable carries a stable identifier so
//! that cases laid out for an older version of the dictionary can be mapped
//! onto the new one (see [`crate::CaseMap::between`]).

use serde::{Deserialize, Serialize};

use crate::case::{Case, CaseProto};
use crate::error::{ModelError, Result};
use crate::value::NUMERIC_WIDTH;

/// Variable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "width", rename_all = "snake_case")]
pub enum VarKind {
    /// Double-precision number.
    Numeric,
    /// Byte string of the given width (at least 1).
    String(usize),
}

impl VarKind {
    /// Value width (0 for numeric).
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Numeric => NUMERIC_WIDTH,
            Self::String(w) => w,
        }
    }

    /// Kind for a value width.
    #[must_use]
    pub const fn from_width(width: usize) -> Self {
        if width == NUMERIC_WIDTH {
            Self::Numeric
        } else {
            Self::String(width)
        }
    }

    /// True for numeric variables.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Numeric)
    }
}

/// A variable descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    kind: VarKind,
    position: usize,
    #[serde(default)]
    leave: bool,
    #[serde(default)]
    label: Option<String>,
    id: u32,
}

impl Variable {
    /// Variable name as declared.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable type.
    #[must_use]
    pub fn kind(&self) -> VarKind {
        self.kind
    }

    /// Value width (0 for numeric).
    #[must_use]
    pub fn width(&self) -> usize {
        self.kind.width()
    }

    /// Index of this variable's value within a case.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether the variable keeps its value from one case to the next when
    /// it is not supplied by the source.
    #[must_use]
    pub fn leave(&self) -> bool {
        self.leave
    }

    /// Optional descriptive label.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Identifier that survives renames and reordering.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Ordered set of variables describing a case stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    variables: Vec<Variable>,
    #[serde(default)]
    split: Vec<u32>,
    #[serde(default)]
    filter: Option<u32>,
    next_id: u32,
}

impl Dictionary {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dictionary from `(name, kind)` pairs.
    pub fn from_vars<'a>(vars: impl IntoIterator<Item = (&'a str, VarKind)>) -> Result<Self> {
        let mut dict = Self::new();
        for (name, kind) in vars {
            dict.add_var(name, kind)?;
        }
        Ok(dict)
    }

    /// Append a variable, returning its position.
    pub fn add_var(&mut self, name: &str, kind: VarKind) -> Result<usize> {
        validate_name(name)?;
        if let VarKind::String(0) = kind {
            return Err(ModelError::kind_mismatch(name, "at least 1 byte wide"));
        }
        if self.lookup(name).is_some() {
            return Err(ModelError::duplicate_variable(name));
        }
        let position = self.variables.len();
        self.variables.push(Variable {
            name: name.to_string(),
            kind,
            position,
            leave: false,
            label: None,
            id: self.next_id,
        });
        self.next_id += 1;
        Ok(position)
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True if the dictionary has no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterate variables in position order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// Variable at `position`.
    #[must_use]
    pub fn var(&self, position: usize) -> Option<&Variable> {
        self.variables.get(position)
    }

    /// Find a variable by name, ignoring ASCII case.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.variables
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Find a variable by its stable identifier.
    #[must_use]
    pub fn lookup_id(&self, id: u32) -> Option<&Variable> {
        self.variables.iter().find(|v| v.id == id)
    }

    /// Position of the named variable.
    pub fn position_of(&self, name: &str) -> Result<usize> {
        self.lookup(name)
            .map(Variable::position)
            .ok_or_else(|| ModelError::unknown_variable(name))
    }

    /// Positions of the named variables, in the order given.
    pub fn positions_of<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names.iter().map(|n| self.position_of(n.as_ref())).collect()
    }

    /// Set or clear a variable's label.
    pub fn set_label(&mut self, name: &str, label: Option<&str>) -> Result<()> {
        let idx = self.position_of(name)?;
        self.variables[idx].label = label.map(str::to_string);
        Ok(())
    }

    /// Mark a variable as LEAVE (value carried across cases).
    pub fn set_leave(&mut self, name: &str, leave: bool) -> Result<()> {
        let idx = self.position_of(name)?;
        self.variables[idx].leave = leave;
        Ok(())
    }

    /// Rename a single variable.
    pub fn rename_var(&mut self, old: &str, new: &str) -> Result<()> {
        self.rename_vars(&[(old, new)])
    }

    /// Rename several variables at once.
    ///
    /// Renames are simultaneous, so `(A, B), (B, A)` swaps two names. The
    /// dictionary is left untouched when any rename fails.
    pub fn rename_vars(&mut self, pairs: &[(&str, &str)]) -> Result<()> {
        let mut renamed: Vec<(usize, &str)> = Vec::with_capacity(pairs.len());
        for &(old, new) in pairs {
            validate_name(new)?;
            let idx = self.position_of(old)?;
            if renamed.iter().any(|&(i, _)| i == idx) {
                return Err(ModelError::duplicate_variable(old));
            }
            renamed.push((idx, new));
        }

        let finals: Vec<&str> = self
            .variables
            .iter()
            .enumerate()
            .map(|(idx, var)| {
                renamed
                    .iter()
                    .find(|&&(i, _)| i == idx)
                    .map_or(var.name.as_str(), |&(_, n)| n)
            })
            .collect();
        for (a, name) in finals.iter().enumerate() {
            if let Some(clash) = finals[a + 1..].iter().find(|n| n.eq_ignore_ascii_case(name)) {
                return Err(ModelError::duplicate_variable(*clash));
            }
        }

        for (idx, new) in renamed {
            self.variables[idx].name = new.to_string();
        }
        Ok(())
    }

    /// Remove the named variables; remaining variables keep their order.
    pub fn delete_vars<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let doomed = self.positions_of(names)?;
        let ids: Vec<u32> = doomed.iter().map(|&p| self.variables[p].id).collect();
        self.variables.retain(|v| !ids.contains(&v.id));
        self.renumber();
        Ok(())
    }

    /// Keep only the named variables, reordered as listed.
    pub fn keep_vars<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let positions = self.positions_of(names)?;
        let mut kept = Vec::with_capacity(positions.len());
        for p in positions {
            if kept.iter().any(|v: &Variable| v.position == p) {
                return Err(ModelError::duplicate_variable(self.variables[p].name.clone()));
            }
            kept.push(self.variables[p].clone());
        }
        self.variables = kept;
        self.renumber();
        Ok(())
    }

    /// Move the named variables to the front, in the order listed. The rest
    /// follow in their current order.
    pub fn reorder_vars<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let positions = self.positions_of(names)?;
        let mut ordered: Vec<Variable> = Vec::with_capacity(self.variables.len());
        for p in positions {
            if ordered.iter().any(|v| v.position == p) {
                return Err(ModelError::duplicate_variable(self.variables[p].name.clone()));
            }
            ordered.push(self.variables[p].clone());
        }
        let rest: Vec<Variable> = self
            .variables
            .iter()
            .filter(|v| !ordered.iter().any(|o| o.id == v.id))
            .cloned()
            .collect();
        ordered.extend(rest);
        self.variables = ordered;
        self.renumber();
        Ok(())
    }

    /// Case prototype for this dictionary.
    #[must_use]
    pub fn proto(&self) -> CaseProto {
        CaseProto::new(self.variables.iter().map(Variable::width).collect())
    }

    /// A case of this dictionary's shape with all values missing.
    #[must_use]
    pub fn blank_case(&self) -> Case {
        self.proto().blank_case()
    }

    /// Verify that `case` matches this dictionary's shape.
    pub fn check_case(&self, case: &Case) -> Result<()> {
        self.proto().check(case)
    }

    /// Designate the SPLIT FILE variables (empty to turn splitting off).
    pub fn set_split_vars<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let positions = self.positions_of(names)?;
        self.split = positions.iter().map(|&p| self.variables[p].id).collect();
        Ok(())
    }

    /// The SPLIT FILE variables.
    #[must_use]
    pub fn split_vars(&self) -> Vec<&Variable> {
        self.split.iter().filter_map(|&id| self.lookup_id(id)).collect()
    }

    /// Case positions of the SPLIT FILE variables.
    #[must_use]
    pub fn split_positions(&self) -> Vec<usize> {
        self.split_vars().into_iter().map(Variable::position).collect()
    }

    /// Designate (or clear) the numeric FILTER variable.
    pub fn set_filter_var(&mut self, name: Option<&str>) -> Result<()> {
        self.filter = match name {
            None => None,
            Some(name) => {
                let var = self
                    .lookup(name)
                    .ok_or_else(|| ModelError::unknown_variable(name))?;
                if !var.kind.is_numeric() {
                    return Err(ModelError::kind_mismatch(name, "numeric"));
                }
                Some(var.id)
            }
        };
        Ok(())
    }

    /// The FILTER variable, if any.
    #[must_use]
    pub fn filter_var(&self) -> Option<&Variable> {
        self.filter.and_then(|id| self.lookup_id(id))
    }

    fn renumber(&mut self) {
        for (position, var) in self.variables.iter_mut().enumerate() {
            var.position = position;
        }
        let live: Vec<u32> = self.variables.iter().map(|v| v.id).collect();
        self.split.retain(|id| live.contains(id));
        if self.filter.is_some_and(|id| !live.contains(&id)) {
            self.filter = None;
        }
    }
}

/// Variable names must be non-empty, start with a letter or one of `@#$`,
/// and contain no whitespace.
fn validate_name(name: &str) -> Result<()> {
    let Some(first) = name.chars().next() else {
        return Err(ModelError::invalid_name(name, "name is empty"));
    };
    if !(first.is_alphabetic() || matches!(first, '@' | '#' | '$')) {
        return Err(ModelError::invalid_name(
            name,
            "must begin with a letter or @, #, $",
        ));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ModelError::invalid_name(name, "contains whitespace"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dictionary {
        Dictionary::from_vars([
            ("ID", VarKind::Numeric),
            ("NAME", VarKind::String(8)),
            ("SCORE", VarKind::Numeric),
        ])
        .unwrap()
    }

    #[test]
    fn test_add_and_lookup() {
        let dict = sample();
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.position_of("name").unwrap(), 1);
        assert_eq!(dict.lookup("Score").unwrap().kind(), VarKind::Numeric);
        assert!(dict.lookup("missing").is_none());
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        let mut dict = sample();
        assert_eq!(
            dict.add_var("id", VarKind::Numeric),
            Err(ModelError::duplicate_variable("id"))
        );
        assert!(matches!(
            dict.add_var("1X", VarKind::Numeric),
            Err(ModelError::InvalidName { .. })
        ));
        assert!(dict.add_var("", VarKind::Numeric).is_err());
        assert!(dict.add_var("S", VarKind::String(0)).is_err());
    }

    #[test]
    fn test_rename_swap() {
        let mut dict = sample();
        dict.rename_vars(&[("ID", "SCORE"), ("SCORE", "ID")]).unwrap();
        assert_eq!(dict.var(0).unwrap().name(), "SCORE");
        assert_eq!(dict.var(2).unwrap().name(), "ID");
    }

    #[test]
    fn test_rename_collision_leaves_dict_untouched() {
        let mut dict = sample();
        let before = dict.clone();
        assert!(dict.rename_var("ID", "name").is_err());
        assert_eq!(dict, before);
    }

    #[test]
    fn test_delete_renumbers() {
        let mut dict = sample();
        dict.set_split_vars(&["NAME"]).unwrap();
        dict.delete_vars(&["ID", "NAME"]).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.var(0).unwrap().name(), "SCORE");
        assert_eq!(dict.var(0).unwrap().position(), 0);
        assert!(dict.split_vars().is_empty());
    }

    #[test]
    fn test_keep_reorders() {
        let mut dict = sample();
        dict.keep_vars(&["SCORE", "ID"]).unwrap();
        let names: Vec<&str> = dict.iter().map(Variable::name).collect();
        assert_eq!(names, vec!["SCORE", "ID"]);
        assert_eq!(dict.proto(), CaseProto::new(vec![0, 0]));
    }

    #[test]
    fn test_reorder_keeps_everything() {
        let mut dict = sample();
        dict.reorder_vars(&["score"]).unwrap();
        let names: Vec<&str> = dict.iter().map(Variable::name).collect();
        assert_eq!(names, vec!["SCORE", "ID", "NAME"]);
        assert!(dict.reorder_vars(&["ID", "id"]).is_err());
    }

    #[test]
    fn test_split_and_filter() {
        let mut dict = sample();
        dict.set_split_vars(&["SCORE", "ID"]).unwrap();
        assert_eq!(dict.split_positions(), vec![2, 0]);
        assert!(dict.set_filter_var(Some("NAME")).is_err());
        dict.set_filter_var(Some("SCORE")).unwrap();
        assert_eq!(dict.filter_var().unwrap().name(), "SCORE");
        dict.set_filter_var(None).unwrap();
        assert!(dict.filter_var().is_none());
    }
}
