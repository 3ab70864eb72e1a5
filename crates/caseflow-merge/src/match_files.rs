//! MATCH FILES: N-way merge-join of sorted case streams.
//!
//! Each round takes the smallest BY key among the open FILE inputs. Every
//! FILE whose current key equals it contributes its case and is advanced;
//! every TABLE is advanced past smaller keys and contributes, without being
//! advanced, when its key is equal. Values come from the first contributor
//! declaring a variable, FILE inputs before TABLE inputs, each in
//! declaration order. Variables no contributor declares are missing.
//!
//! Without BY, FILE inputs are matched case by case.
//!
//! Once every FILE input has ended, remaining TABLE cases are read and
//! discarded: tables never drive output on their own.

use std::cmp::Ordering;

use caseflow_core::{CaseSource, PipelineError, PipelineOptions};
use caseflow_model::{Case, CaseProto, Dictionary, Value};
use tracing::{error, info, trace};

use crate::descriptor::FileDescriptor;
use crate::error::{MergeError, Result};
use crate::input::{MergeInput, Role};
use crate::layout::{GroupFlags, build_layout};
use crate::stats::MergeStats;

/// Builder for a MATCH FILES merge.
#[derive(Debug, Default)]
pub struct MatchFiles {
    inputs: Vec<MergeInput>,
    by: Vec<String>,
    first: Option<String>,
    last: Option<String>,
    options: PipelineOptions,
}

impl MatchFiles {
    /// Create an empty merge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a FILE or TABLE input.
    #[must_use]
    pub fn input(mut self, input: MergeInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Match on these variables. Every input must be sorted on them.
    #[must_use]
    pub fn by<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.by = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    /// Add a FIRST variable: 1 on the first output case of each BY group.
    #[must_use]
    pub fn first(mut self, name: impl Into<String>) -> Self {
        self.first = Some(name.into());
        self
    }

    /// Add a LAST variable: 1 on the last output case of each BY group.
    #[must_use]
    pub fn last(mut self, name: impl Into<String>) -> Self {
        self.last = Some(name.into());
        self
    }

    /// Set options; only the unsorted-input policy is used.
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the inputs and build the output dictionary.
    pub fn build(self) -> Result<MatchEngine> {
        if !self.inputs.iter().any(|i| i.role() == Role::Master) {
            return Err(MergeError::NoMasterFile);
        }
        if self.by.is_empty() && self.inputs.iter().any(|i| i.role() == Role::Table) {
            return Err(MergeError::TableWithoutBy);
        }

        let layout = build_layout(
            self.inputs,
            &self.by,
            self.first.as_deref(),
            self.last.as_deref(),
            &self.options,
        )?;
        let (masters, tables): (Vec<usize>, Vec<usize>) = (0..layout.files.len())
            .partition(|&i| layout.files[i].role() == Role::Master);

        Ok(MatchEngine {
            proto: layout.dict.proto(),
            dict: layout.dict,
            files: layout.files,
            masters,
            tables,
            blank: layout.blank,
            group: layout.group,
            state: MergeState::Active,
            primed: false,
            failed: false,
            stats: MergeStats::default(),
        })
    }
}

/// Where a merge is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// At least one FILE input has cases left.
    Active,
    /// Every FILE input ended; held output is flushed and tables drained.
    Draining,
    /// Nothing more to produce.
    Done,
}

/// A running MATCH FILES merge, read as a case source.
pub struct MatchEngine {
    dict: Dictionary,
    proto: CaseProto,
    files: Vec<FileDescriptor>,
    masters: Vec<usize>,
    tables: Vec<usize>,
    blank: Vec<Value>,
    group: GroupFlags,
    state: MergeState,
    primed: bool,
    failed: bool,
    stats: MergeStats,
}

impl std::fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("variables", &self.dict.len())
            .field("masters", &self.masters.len())
            .field("tables", &self.tables.len())
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl MatchEngine {
    /// The output dictionary.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Counts so far.
    #[must_use]
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    fn step(&mut self) -> caseflow_core::Result<Option<Case>> {
        if !self.primed {
            for file in &mut self.files {
                file.advance()?;
            }
            self.primed = true;
        }
        loop {
            match self.state {
                MergeState::Active => match self.round()? {
                    Some((values, key)) => {
                        if let Some(ready) = self.group.push(values, key) {
                            self.stats.output_cases += 1;
                            return Ok(Some(ready));
                        }
                    }
                    None => self.state = MergeState::Draining,
                },
                MergeState::Draining => {
                    if let Some(ready) = self.group.finish() {
                        self.stats.output_cases += 1;
                        return Ok(Some(ready));
                    }
                    for &t in &self.tables {
                        self.stats.table_rows_discarded += self.files[t].discard_rest()?;
                    }
                    self.state = MergeState::Done;
                    self.log_summary();
                }
                MergeState::Done => return Ok(None),
            }
        }
    }

    /// One merge round: the output values for the smallest master key, and
    /// that key. `None` once every master has ended.
    fn round(&mut self) -> caseflow_core::Result<Option<(Vec<Value>, Vec<Value>)>> {
        let min_key = self
            .masters
            .iter()
            .map(|&m| &self.files[m])
            .filter(|file| file.is_open())
            .map(FileDescriptor::key)
            .min_by(|a, b| caseflow_model::compare_keys(*a, *b))
            .map(<[Value]>::to_vec);
        let Some(key) = min_key else {
            return Ok(None);
        };
        self.stats.rounds += 1;

        let matched_masters: Vec<usize> = self
            .masters
            .iter()
            .copied()
            .filter(|&m| self.files[m].cmp_key(&key).is_some_and(Ordering::is_eq))
            .collect();

        let mut matched_tables = Vec::new();
        for &t in &self.tables {
            let table = &mut self.files[t];
            while table.cmp_key(&key).is_some_and(Ordering::is_lt) {
                table.advance()?;
                self.stats.table_rows_skipped += 1;
            }
            if table.cmp_key(&key).is_some_and(Ordering::is_eq) {
                matched_tables.push(t);
            }
        }

        let mut values = self.blank.clone();
        let mut filled = vec![false; values.len()];
        for &i in matched_masters.iter().chain(&matched_tables) {
            self.files[i].contribute(&mut values, &mut filled);
        }
        trace!(
            round = self.stats.rounds,
            masters = matched_masters.len(),
            tables = matched_tables.len(),
            "match round"
        );

        for &m in &matched_masters {
            self.files[m].advance()?;
        }
        Ok(Some((values, key)))
    }

    fn log_summary(&self) {
        for file in &self.files {
            trace!(file = %file.label(), cases = file.cases_read(), "input totals");
        }
        info!(
            rounds = self.stats.rounds,
            output_cases = self.stats.output_cases,
            table_rows_skipped = self.stats.table_rows_skipped,
            table_rows_discarded = self.stats.table_rows_discarded,
            inputs = self.files.len(),
            "match files complete"
        );
    }
}

impl CaseSource for MatchEngine {
    fn proto(&self) -> &CaseProto {
        &self.proto
    }

    fn read(&mut self) -> caseflow_core::Result<Option<Case>> {
        if self.failed {
            return Err(PipelineError::RunAborted);
        }
        let result = self.step();
        if let Err(err) = &result {
            self.failed = true;
            error!(error = %err, "match files aborted");
        }
        result
    }
}
