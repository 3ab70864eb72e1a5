//! Mapping cases from one dictionary layout to another.

use crate::case::{Case, CaseProto};
use crate::dictionary::{Dictionary, Variable};
use crate::error::{ModelError, Result};
use crate::value::Value;

/// Rebuilds cases laid out for a source dictionary in the layout of a
/// destination dictionary.
///
/// Destination positions with no source counterpart receive the missing
/// value for their width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseMap {
    dst: CaseProto,
    sources: Vec<Option<usize>>,
}

impl CaseMap {
    /// Map by variable identity. Use this after renaming, dropping, keeping
    /// or adding variables in a clone of the source dictionary.
    pub fn between(src: &Dictionary, dst: &Dictionary) -> Result<Self> {
        Self::build(dst, |var| src.lookup_id(var.id()))
    }

    /// Map by variable name (ignoring case). Use this between dictionaries
    /// that were built independently.
    pub fn by_name(src: &Dictionary, dst: &Dictionary) -> Result<Self> {
        Self::build(dst, |var| src.lookup(var.name()))
    }

    /// Map from explicit `(source, destination)` position pairs.
    #[must_use]
    pub fn from_pairs(dst: CaseProto, pairs: &[(usize, usize)]) -> Self {
        let mut sources = vec![None; dst.len()];
        for &(src, to) in pairs {
            if let Some(slot) = sources.get_mut(to) {
                *slot = Some(src);
            }
        }
        Self { dst, sources }
    }

    fn build<'a>(
        dst: &Dictionary,
        find: impl Fn(&Variable) -> Option<&'a Variable>,
    ) -> Result<Self> {
        let mut sources = Vec::with_capacity(dst.len());
        for var in dst.iter() {
            let src = match find(var) {
                Some(src) if src.width() != var.width() => {
                    return Err(ModelError::WidthMismatch {
                        position: var.position(),
                        expected: var.width(),
                        actual: src.width(),
                    });
                }
                Some(src) => Some(src.position()),
                None => None,
            };
            sources.push(src);
        }
        Ok(Self {
            dst: dst.proto(),
            sources,
        })
    }

    /// Destination prototype.
    #[must_use]
    pub fn proto(&self) -> &CaseProto {
        &self.dst
    }

    /// Source position feeding each destination position.
    #[must_use]
    pub fn sources(&self) -> &[Option<usize>] {
        &self.sources
    }

    /// True when applying the map returns the source case unchanged.
    #[must_use]
    pub fn is_identity(&self, src_len: usize) -> bool {
        src_len == self.sources.len()
            && self
                .sources
                .iter()
                .enumerate()
                .all(|(i, s)| *s == Some(i))
    }

    /// Rebuild `case` in the destination layout, moving values out of it.
    #[must_use]
    pub fn apply(&self, case: Case) -> Case {
        if self.is_identity(case.len()) {
            return case;
        }
        let mut values: Vec<Option<Value>> = case.into_values().into_iter().map(Some).collect();
        let mapped = self
            .sources
            .iter()
            .zip(self.dst.widths())
            .map(|(src, &width)| {
                src.and_then(|p| values.get_mut(p).and_then(Option::take))
                    .unwrap_or_else(|| Value::missing(width))
            })
            .collect();
        Case::new(mapped)
    }

    /// Like [`CaseMap::apply`] but leaves `case` intact.
    #[must_use]
    pub fn apply_ref(&self, case: &Case) -> Case {
        let mapped = self
            .sources
            .iter()
            .zip(self.dst.widths())
            .map(|(src, &width)| {
                src.and_then(|p| case.get(p).cloned())
                    .unwrap_or_else(|| Value::missing(width))
            })
            .collect();
        Case::new(mapped)
    }
}
