//! ADD FILES: concatenation or interleaving of case streams.
//!
//! Without BY, inputs are read one after another in declaration order. With
//! BY, the input with the smallest current key supplies the next case; ties
//! go to the input declared first.

use caseflow_core::{CaseSource, PipelineError, PipelineOptions};
use caseflow_model::{Case, CaseProto, Dictionary, Value, compare_keys};
use tracing::{error, info};

use crate::descriptor::FileDescriptor;
use crate::error::{MergeError, Result};
use crate::input::{MergeInput, Role};
use crate::layout::{GroupFlags, build_layout};
use crate::match_files::MergeState;
use crate::stats::MergeStats;

/// Builder for an ADD FILES merge.
#[derive(Debug, Default)]
pub struct AddFiles {
    inputs: Vec<MergeInput>,
    by: Vec<String>,
    first: Option<String>,
    last: Option<String>,
    options: PipelineOptions,
}

impl AddFiles {
    /// Create an empty merge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a FILE input.
    #[must_use]
    pub fn input(mut self, input: MergeInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Interleave on these variables.
    #[must_use]
    pub fn by<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.by = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    /// Add a FIRST variable.
    #[must_use]
    pub fn first(mut self, name: impl Into<String>) -> Self {
        self.first = Some(name.into());
        self
    }

    /// Add a LAST variable.
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
    pub fn build(self) -> Result<AddEngine> {
        if self.inputs.is_empty() {
            return Err(MergeError::NoMasterFile);
        }
        if let Some((index, table)) = self
            .inputs
            .iter()
            .enumerate()
            .find(|(_, input)| input.role() == Role::Table)
        {
            let file = table
                .label
                .clone()
                .unwrap_or_else(|| format!("{} #{}", Role::Table, index + 1));
            return Err(MergeError::TableInAddFiles { file });
        }

        let layout = build_layout(
            self.inputs,
            &self.by,
            self.first.as_deref(),
            self.last.as_deref(),
            &self.options,
        )?;
        Ok(AddEngine {
            proto: layout.dict.proto(),
            dict: layout.dict,
            files: layout.files,
            blank: layout.blank,
            group: layout.group,
            state: MergeState::Active,
            primed: false,
            failed: false,
            stats: MergeStats::default(),
        })
    }
}

/// A running ADD FILES merge, read as a case source.
pub struct AddEngine {
    dict: Dictionary,
    proto: CaseProto,
    files: Vec<FileDescriptor>,
    blank: Vec<Value>,
    group: GroupFlags,
    state: MergeState,
    primed: bool,
    failed: bool,
    stats: MergeStats,
}

impl std::fmt::Debug for AddEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddEngine")
            .field("variables", &self.dict.len())
            .field("inputs", &self.files.len())
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl AddEngine {
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
                MergeState::Active => match self.next_input() {
                    Some(index) => {
                        let file = &mut self.files[index];
                        let mut values = self.blank.clone();
                        let mut filled = vec![false; values.len()];
                        file.contribute(&mut values, &mut filled);
                        let key = file.key().to_vec();
                        file.advance()?;
                        self.stats.rounds += 1;
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
                    self.state = MergeState::Done;
                    info!(
                        inputs = self.files.len(),
                        output_cases = self.stats.output_cases,
                        "add files complete"
                    );
                }
                MergeState::Done => return Ok(None),
            }
        }
    }

    /// The open input with the smallest key, earliest declared on ties.
    fn next_input(&self) -> Option<usize> {
        self.files
            .iter()
            .enumerate()
            .filter(|(_, file)| file.is_open())
            .min_by(|(_, a), (_, b)| compare_keys(a.key(), b.key()))
            .map(|(index, _)| index)
    }
}

impl CaseSource for AddEngine {
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
            error!(error = %err, "add files aborted");
        }
        result
    }
}
