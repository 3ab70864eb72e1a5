//! SPLIT FILE break-group detection.
//!
//! Input must already be sorted on the key variables. This is not checked:
//! unsorted input silently produces more, smaller groups.
//!
//! Two interfaces are provided. [`SplitGrouper`] drives begin/process/end
//! callbacks on a [`GroupHandler`] as cases are pushed into it, and
//! [`CaseGroups`] pulls one whole break group at a time from a source.

use caseflow_model::{Case, Value, compare_keys};
use tracing::trace;

use crate::error::Result;
use crate::stream::CaseSource;

/// Callbacks for break groups.
pub trait GroupHandler {
    /// A new group starts; `first` is its first case.
    fn begin(&mut self, first: &Case) -> Result<()>;

    /// Called for every case, including the first of each group.
    fn process(&mut self, case: &Case) -> Result<()>;

    /// The current group ended.
    fn end(&mut self) -> Result<()>;
}

/// Counts reported when grouping finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupStats {
    /// Number of break groups.
    pub groups: u64,
    /// Number of cases processed.
    pub cases: u64,
}

/// Push-driven break-group detector.
#[derive(Debug, Clone)]
pub struct SplitGrouper {
    keys: Vec<usize>,
    prev_keys: Option<Vec<Value>>,
    stats: GroupStats,
}

impl SplitGrouper {
    /// Group on the variables at `keys`. With no keys, every case belongs
    /// to one group.
    #[must_use]
    pub fn new(keys: Vec<usize>) -> Self {
        Self {
            keys,
            prev_keys: None,
            stats: GroupStats::default(),
        }
    }

    /// Key positions.
    #[must_use]
    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    /// Feed the next case.
    pub fn push<H: GroupHandler + ?Sized>(&mut self, case: &Case, handler: &mut H) -> Result<()> {
        let keys = case.project(&self.keys);
        let same = self
            .prev_keys
            .as_ref()
            .is_some_and(|prev| compare_keys(prev, &keys).is_eq());
        if !same {
            if self.prev_keys.is_some() {
                handler.end()?;
            }
            self.stats.groups += 1;
            trace!(group = self.stats.groups, "split group begins");
            handler.begin(case)?;
            self.prev_keys = Some(keys);
        }
        self.stats.cases += 1;
        handler.process(case)
    }

    /// Close the open group, if any, and report counts.
    pub fn finish<H: GroupHandler + ?Sized>(&mut self, handler: &mut H) -> Result<GroupStats> {
        if self.prev_keys.take().is_some() {
            handler.end()?;
        }
        Ok(self.stats)
    }
}

/// Run every case of `source` through a [`SplitGrouper`] on `keys`.
pub fn group_cases<S, H>(source: &mut S, keys: &[usize], handler: &mut H) -> Result<GroupStats>
where
    S: CaseSource + ?Sized,
    H: GroupHandler + ?Sized,
{
    let mut grouper = SplitGrouper::new(keys.to_vec());
    while let Some(case) = source.read()? {
        grouper.push(&case, handler)?;
    }
    grouper.finish(handler)
}

/// Pull-driven break groups over a source.
pub struct CaseGroups<S> {
    source: S,
    keys: Vec<usize>,
    lookahead: Option<Case>,
    exhausted: bool,
}

impl<S: CaseSource> CaseGroups<S> {
    /// Group `source` on the variables at `keys`.
    pub fn new(source: S, keys: Vec<usize>) -> Self {
        Self {
            source,
            keys,
            lookahead: None,
            exhausted: false,
        }
    }

    /// Read the next break group, or `None` when the source is exhausted.
    pub fn next_group(&mut self) -> Result<Option<Vec<Case>>> {
        let first = match self.lookahead.take() {
            Some(case) => case,
            None if self.exhausted => return Ok(None),
            None => match self.source.read()? {
                Some(case) => case,
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
            },
        };

        let mut group = vec![first];
        while let Some(case) = self.source.read()? {
            if case.compare_at(&group[0], &self.keys).is_eq() {
                group.push(case);
            } else {
                self.lookahead = Some(case);
                return Ok(Some(group));
            }
        }
        self.exhausted = true;
        Ok(Some(group))
    }

    /// Consume the grouper, returning the underlying source.
    pub fn into_inner(self) -> S {
        self.source
    }
}
