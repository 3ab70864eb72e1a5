//! The active dataset and the procedure run that streams it.
//!
//! A [`Dataset`] owns the dictionary, the active case source and the
//! pending transformations. Opening a procedure borrows the dataset for the
//! duration of one pass: the [`ProcedureRun`] is the case source the
//! procedure reads, and committing it installs the transformed cases as the
//! new active file.
//!
//! Per case, a run:
//!
//! 1. reads the active source (stopping at the case limit),
//! 2. lays the case out for the permanent dictionary, initializing variables
//!    the source does not supply,
//! 3. runs the permanent chain,
//! 4. writes the case to the replacement store and any extra outputs,
//! 5. lays it out for the temporary dictionary and runs the temporary chain,
//! 6. remembers the permanent and temporary cases for LAG, each chain
//!    looking back over cases in its own layout,
//! 7. applies the filter variable,
//!
//! and hands what survives to the procedure.

use caseflow_model::{Case, CaseMap, CaseProto, Dictionary, SYSMIS};
use serde::Serialize;
use tracing::{Span, debug, error, info, info_span, warn};

use crate::caseinit::CaseInit;
use crate::error::{PipelineError, Result};
use crate::lag::LagQueue;
use crate::options::PipelineOptions;
use crate::store::{StoreFactory, StoreSink};
use crate::stream::{CaseSink, CaseSource};
use crate::transform::{TransformChain, TransformContext, TransformSet, Transformation};

struct ActiveFile {
    dict: Dictionary,
    source: Box<dyn CaseSource>,
}

/// Dictionary, active file and pending transformations.
pub struct Dataset {
    dict: Dictionary,
    permanent_dict: Option<Dictionary>,
    active: Option<ActiveFile>,
    transforms: TransformSet,
    options: PipelineOptions,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("variables", &self.dict.len())
            .field("temporary", &self.is_temporary())
            .field("has_active_file", &self.has_active_file())
            .field("transforms", &self.transforms)
            .finish_non_exhaustive()
    }
}

impl Dataset {
    /// Create a dataset reading cases laid out by `dict` from `source`.
    pub fn new(dict: Dictionary, source: impl CaseSource + 'static) -> Self {
        Self {
            active: Some(ActiveFile {
                dict: dict.clone(),
                source: Box::new(source),
            }),
            dict,
            permanent_dict: None,
            transforms: TransformSet::new(),
            options: PipelineOptions::default(),
        }
    }

    /// Set run options.
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run options.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// The dictionary procedures see (the temporary one after TEMPORARY).
    #[must_use]
    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    /// Mutable dictionary, for changes between runs. Variables added here
    /// start each case system-missing (or carried over, if LEAVE).
    pub fn dict_mut(&mut self) -> &mut Dictionary {
        &mut self.dict
    }

    /// The dictionary cases are written back with.
    #[must_use]
    pub fn permanent_dict(&self) -> &Dictionary {
        self.permanent_dict.as_ref().unwrap_or(&self.dict)
    }

    /// Whether there is a source to read.
    #[must_use]
    pub fn has_active_file(&self) -> bool {
        self.active.is_some()
    }

    /// Replace the active file.
    ///
    /// Pending transformations are kept and apply to the new source.
    pub fn set_source(&mut self, dict: Dictionary, source: impl CaseSource + 'static) {
        self.dict = dict.clone();
        self.permanent_dict = None;
        self.transforms.cancel_temporary();
        self.active = Some(ActiveFile {
            dict,
            source: Box::new(source),
        });
    }

    /// Append a transformation, to the temporary chain if TEMPORARY is in
    /// effect.
    pub fn add_transformation(&mut self, step: impl Transformation + 'static) -> Result<()> {
        self.transforms.add(Box::new(step))
    }

    /// Pending transformations.
    #[must_use]
    pub fn transforms(&self) -> &TransformSet {
        &self.transforms
    }

    /// TEMPORARY: later transformations and dictionary changes last for the
    /// next procedure only.
    pub fn start_temporary(&mut self) {
        if !self.is_temporary() {
            self.permanent_dict = Some(self.dict.clone());
            self.transforms.start_temporary();
        }
    }

    /// Whether TEMPORARY is in effect.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.permanent_dict.is_some()
    }

    /// Keep the temporary transformations and dictionary.
    pub fn make_temporary_permanent(&mut self) -> Result<()> {
        self.transforms.make_temporary_permanent()?;
        self.permanent_dict = None;
        Ok(())
    }

    /// Discard the temporary transformations and restore the permanent
    /// dictionary.
    pub fn cancel_temporary(&mut self) {
        self.transforms.cancel_temporary();
        if let Some(dict) = self.permanent_dict.take() {
            self.dict = dict;
        }
    }

    /// Start a pass over the active file.
    pub fn open_procedure(&mut self) -> Result<ProcedureRun<'_>> {
        let active = self.active.take().ok_or(PipelineError::NoActiveFile)?;
        match Layouts::new(self, &active.dict) {
            Ok(layouts) => Ok(ProcedureRun::open(self, active, layouts)),
            Err(err) => {
                self.active = Some(active);
                Err(err)
            }
        }
    }

    /// Run a procedure that collects every case, then commit it.
    pub fn collect_cases(&mut self) -> Result<Vec<Case>> {
        let mut run = self.open_procedure()?;
        let mut cases = Vec::new();
        while let Some(case) = run.read()? {
            cases.push(case);
        }
        run.commit()?;
        Ok(cases)
    }
}

/// Counts from one procedure run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunSummary {
    /// Cases read from the active source.
    pub read: u64,
    /// Cases dropped by a transformation.
    pub dropped: u64,
    /// Cases written to the replacement active file.
    pub written: u64,
    /// Cases excluded by the filter variable.
    pub filtered: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Reading,
    Exhausted,
    Failed,
}

struct TemporaryLayout {
    map: CaseMap,
    init: CaseInit,
}

struct Layouts {
    input_map: CaseMap,
    init: CaseInit,
    temporary: Option<TemporaryLayout>,
    replacement: StoreSink,
}

/// One pass over the active file.
///
/// Dropping a run without committing it behaves like [`ProcedureRun::commit`],
/// logging the error instead of returning it.
pub struct ProcedureRun<'a> {
    dataset: &'a mut Dataset,
    source: Box<dyn CaseSource>,
    source_proto: CaseProto,
    input_map: CaseMap,
    init: CaseInit,
    temporary: Option<TemporaryLayout>,
    proto: CaseProto,
    replacement: Option<StoreSink>,
    outputs: Vec<Box<dyn CaseSink + 'a>>,
    lag: LagQueue,
    temporary_lag: LagQueue,
    filter: Option<usize>,
    limit: Option<u64>,
    state: RunState,
    failure: Option<PipelineError>,
    summary: RunSummary,
    completed: bool,
    span: Span,
}

impl Layouts {
    fn new(dataset: &Dataset, source_dict: &Dictionary) -> Result<Self> {
        let permanent = dataset.permanent_dict();
        let input_map = CaseMap::between(source_dict, permanent)?;
        let init = CaseInit::new(permanent, &input_map);
        let temporary = match &dataset.permanent_dict {
            Some(permanent) => {
                let map = CaseMap::between(permanent, &dataset.dict)?;
                let init = CaseInit::new(&dataset.dict, &map);
                Some(TemporaryLayout { map, init })
            }
            None => None,
        };
        let store = dataset.options.create_store(permanent.proto())?;
        Ok(Self {
            input_map,
            init,
            temporary,
            replacement: StoreSink::new(store),
        })
    }
}

impl<'a> ProcedureRun<'a> {
    fn open(dataset: &'a mut Dataset, active: ActiveFile, layouts: Layouts) -> Self {
        dataset.transforms.finalize();
        let span = info_span!(
            "procedure",
            variables = dataset.dict.len(),
            transforms = dataset.transforms.len()
        );
        let filter = dataset.dict.filter_var().map(|var| var.position());
        let lag = LagQueue::new(dataset.transforms.permanent().max_lag());
        let temporary_lag = LagQueue::new(
            dataset
                .transforms
                .temporary()
                .map_or(0, TransformChain::max_lag),
        );
        span.in_scope(|| {
            debug!(
                temporary = dataset.is_temporary(),
                lag = lag.capacity(),
                temporary_lag = temporary_lag.capacity(),
                filtered = filter.is_some(),
                "procedure opened"
            );
        });

        Self {
            source_proto: active.dict.proto(),
            source: active.source,
            proto: dataset.dict.proto(),
            limit: dataset.options.case_limit,
            input_map: layouts.input_map,
            init: layouts.init,
            temporary: layouts.temporary,
            replacement: Some(layouts.replacement),
            outputs: Vec::new(),
            lag,
            temporary_lag,
            filter,
            state: RunState::Reading,
            failure: None,
            summary: RunSummary::default(),
            completed: false,
            span,
            dataset,
        }
    }

    /// Also write every permanent case to `sink`.
    pub fn add_output(&mut self, sink: impl CaseSink + 'a) {
        self.outputs.push(Box::new(sink));
    }

    /// Dictionary of the cases this run returns.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dataset.dict
    }

    /// Positions of the split variables, for break-group processing.
    #[must_use]
    pub fn split_keys(&self) -> Vec<usize> {
        self.dataset.dict.split_positions()
    }

    /// Counts so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Read the remaining input through the pipeline, finish every output
    /// and install the replacement active file.
    ///
    /// The first error encountered, including one already returned by
    /// [`CaseSource::read`], is returned after the replacement has been
    /// installed with whatever was written before it.
    pub fn commit(mut self) -> Result<RunSummary> {
        let drained = self.drain();
        let completed = self.complete();
        drained?;
        completed
    }

    fn drain(&mut self) -> Result<()> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        while self.read()?.is_some() {}
        Ok(())
    }

    fn complete(&mut self) -> Result<RunSummary> {
        self.completed = true;
        let _entered = self.span.clone().entered();

        let mut first_error = None;
        for output in &mut self.outputs {
            if let Err(err) = output.finish() {
                first_error.get_or_insert(err);
            }
        }

        let dataset = &mut *self.dataset;
        if let Some(replacement) = self.replacement.take() {
            let installed = replacement.into_replay().and_then(|replay| {
                let reader = replay.reader()?;
                Ok(ActiveFile {
                    dict: dataset.permanent_dict().clone(),
                    source: Box::new(reader),
                })
            });
            match installed {
                Ok(active) => dataset.active = Some(active),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        dataset.transforms = TransformSet::new();
        if let Some(dict) = dataset.permanent_dict.take() {
            dataset.dict = dict;
        }

        let summary = self.summary;
        match first_error {
            Some(err) => {
                self.state = RunState::Failed;
                error!(error = %err, "procedure failed");
                Err(err)
            }
            None => {
                info!(
                    read = summary.read,
                    dropped = summary.dropped,
                    written = summary.written,
                    filtered = summary.filtered,
                    "procedure complete"
                );
                Ok(summary)
            }
        }
    }

    fn next_case(&mut self) -> Result<Option<Case>> {
        loop {
            if self.limit.is_some_and(|limit| self.summary.read >= limit) {
                return Ok(None);
            }
            let Some(raw) = self.source.read()? else {
                return Ok(None);
            };
            self.summary.read += 1;
            self.source_proto.check(&raw)?;

            let mut case = self.input_map.apply(raw);
            self.init.init(&mut case)?;

            let case_number = self.summary.written + 1;
            let ctx = TransformContext::new(case_number).with_lag(&self.lag);
            let (permanent, temporary) = self.dataset.transforms.chains_mut();
            let kept = permanent.try_execute(&mut case, &ctx)?;
            self.init.update(&case);
            if !kept {
                self.summary.dropped += 1;
                continue;
            }

            for output in &mut self.outputs {
                output.write(case.clone())?;
            }
            if let Some(replacement) = &mut self.replacement {
                replacement.write(case.clone())?;
            }
            self.summary.written += 1;

            let (out, kept) = match (&mut self.temporary, temporary) {
                (Some(layout), Some(chain)) => {
                    let mut out = layout.map.apply_ref(&case);
                    layout.init.init(&mut out)?;
                    let ctx = TransformContext::new(case_number).with_lag(&self.temporary_lag);
                    let kept = chain.try_execute(&mut out, &ctx)?;
                    layout.init.update(&out);
                    if kept && self.temporary_lag.capacity() > 0 {
                        self.temporary_lag.push(out.clone());
                    }
                    (out, kept)
                }
                _ => (case.clone(), true),
            };
            self.lag.push(case);
            if !kept {
                self.summary.dropped += 1;
                continue;
            }

            if let Some(position) = self.filter {
                let pass = out
                    .number(position)
                    .is_some_and(|x| x != 0.0 && x != SYSMIS);
                if !pass {
                    self.summary.filtered += 1;
                    continue;
                }
            }
            return Ok(Some(out));
        }
    }
}

impl CaseSource for ProcedureRun<'_> {
    fn proto(&self) -> &CaseProto {
        &self.proto
    }

    fn read(&mut self) -> Result<Option<Case>> {
        match self.state {
            RunState::Failed => return Err(PipelineError::RunAborted),
            RunState::Exhausted => return Ok(None),
            RunState::Reading => {}
        }
        match self.next_case() {
            Ok(Some(case)) => Ok(Some(case)),
            Ok(None) => {
                self.state = RunState::Exhausted;
                Ok(None)
            }
            Err(err) => {
                self.state = RunState::Failed;
                self.failure = Some(err.clone());
                self.span.in_scope(|| {
                    error!(error = %err, case = self.summary.read, "procedure aborted");
                });
                Err(err)
            }
        }
    }
}

impl Drop for ProcedureRun<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let drained = self.drain();
        if let Err(err) = drained.and(self.complete().map(|_| ())) {
            warn!(error = %err, "uncommitted procedure finished with errors");
        }
    }
}
