//! One FILE or TABLE input to a merge.

use std::fmt;

use caseflow_core::CaseSource;
use caseflow_model::{Dictionary, ModelError};

/// How an input takes part in a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Drives output: each of its cases is consumed by one output case.
    Master,
    /// Lookup only: a case joins every output case with the same key.
    Table,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => f.write_str("file"),
            Self::Table => f.write_str("table"),
        }
    }
}

/// An input case stream with its dictionary and per-input options.
pub struct MergeInput {
    pub(crate) role: Role,
    pub(crate) label: Option<String>,
    pub(crate) dict: Dictionary,
    pub(crate) source: Box<dyn CaseSource>,
    pub(crate) in_var: Option<String>,
    renames: Vec<(String, String)>,
    drop: Vec<String>,
    keep: Option<Vec<String>>,
}

impl fmt::Debug for MergeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeInput")
            .field("role", &self.role)
            .field("label", &self.label)
            .field("variables", &self.dict.len())
            .field("in_var", &self.in_var)
            .finish_non_exhaustive()
    }
}

impl MergeInput {
    /// A FILE input: cases laid out by `dict`, read from `source`.
    pub fn file(dict: Dictionary, source: impl CaseSource + 'static) -> Self {
        Self::new(Role::Master, dict, Box::new(source))
    }

    /// A TABLE input.
    pub fn table(dict: Dictionary, source: impl CaseSource + 'static) -> Self {
        Self::new(Role::Table, dict, Box::new(source))
    }

    fn new(role: Role, dict: Dictionary, source: Box<dyn CaseSource>) -> Self {
        Self {
            role,
            label: None,
            dict,
            source,
            in_var: None,
            renames: Vec::new(),
            drop: Vec::new(),
            keep: None,
        }
    }

    /// Name used for this input in logs and errors.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a numeric IN variable: 1 when this input contributed to an
    /// output case, 0 otherwise.
    #[must_use]
    pub fn with_in(mut self, name: impl Into<String>) -> Self {
        self.in_var = Some(name.into());
        self
    }

    /// Rename a variable of this input. Renames apply simultaneously and
    /// before DROP and KEEP.
    #[must_use]
    pub fn with_rename(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.renames.push((old.into(), new.into()));
        self
    }

    /// Drop variables of this input (by their renamed names).
    #[must_use]
    pub fn with_drop<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.drop
            .extend(names.iter().map(|name| name.as_ref().to_string()));
        self
    }

    /// Keep only these variables of this input, in this order.
    #[must_use]
    pub fn with_keep<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.keep = Some(names.iter().map(|name| name.as_ref().to_string()).collect());
        self
    }

    /// Role of this input.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The dictionary after RENAME, DROP and KEEP.
    pub(crate) fn effective_dict(&self) -> Result<Dictionary, ModelError> {
        let mut dict = self.dict.clone();
        if !self.renames.is_empty() {
            let pairs: Vec<(&str, &str)> = self
                .renames
                .iter()
                .map(|(old, new)| (old.as_str(), new.as_str()))
                .collect();
            dict.rename_vars(&pairs)?;
        }
        if !self.drop.is_empty() {
            dict.delete_vars(&self.drop)?;
        }
        if let Some(keep) = &self.keep {
            dict.keep_vars(keep)?;
        }
        Ok(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_core::VecSource;
    use caseflow_model::VarKind;

    fn dict() -> Dictionary {
        Dictionary::from_vars([
            ("ID", VarKind::Numeric),
            ("A", VarKind::Numeric),
            ("B", VarKind::String(3)),
        ])
        .unwrap()
    }

    #[test]
    fn test_rename_then_drop_then_keep() {
        let d = dict();
        let input = MergeInput::file(d.clone(), VecSource::from_dict(&d, Vec::new()))
            .with_rename("A", "ALPHA")
            .with_drop(&["B"])
            .with_keep(&["ALPHA", "ID"]);
        let effective = input.effective_dict().unwrap();
        let names: Vec<&str> = effective.iter().map(caseflow_model::Variable::name).collect();
        assert_eq!(names, vec!["ALPHA", "ID"]);
        assert_eq!(input.role(), Role::Master);
    }

    #[test]
    fn test_drop_unknown_variable_fails() {
        let d = dict();
        let input = MergeInput::table(d.clone(), VecSource::from_dict(&d, Vec::new()))
            .with_drop(&["NOPE"]);
        assert!(matches!(
            input.effective_dict(),
            Err(ModelError::UnknownVariable { .. })
        ));
    }
}
