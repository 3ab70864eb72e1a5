//! Case streams: the pull-based source and push-based sink interfaces.
//!
//! Every stage of the pipeline talks to its neighbours through these two
//! traits. A source returns `Ok(None)` exactly once to signal a clean end of
//! stream; an `Err` is fatal to the run that is reading it.

use std::collections::VecDeque;

use caseflow_model::{Case, CaseProto, Dictionary};

use crate::error::Result;

/// Pull interface for reading cases.
pub trait CaseSource {
    /// Shape of the cases this source produces.
    fn proto(&self) -> &CaseProto;

    /// Read the next case, or `None` at end of stream.
    fn read(&mut self) -> Result<Option<Case>>;
}

/// Push interface for writing cases.
pub trait CaseSink {
    /// Write one case. Ownership moves into the sink.
    fn write(&mut self, case: Case) -> Result<()>;

    /// Flush and close the sink.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: CaseSource + ?Sized> CaseSource for Box<S> {
    fn proto(&self) -> &CaseProto {
        (**self).proto()
    }

    fn read(&mut self) -> Result<Option<Case>> {
        (**self).read()
    }
}

impl<S: CaseSource + ?Sized> CaseSource for &mut S {
    fn proto(&self) -> &CaseProto {
        (**self).proto()
    }

    fn read(&mut self) -> Result<Option<Case>> {
        (**self).read()
    }
}

impl<S: CaseSink + ?Sized> CaseSink for Box<S> {
    fn write(&mut self, case: Case) -> Result<()> {
        (**self).write(case)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

impl<S: CaseSink + ?Sized> CaseSink for &mut S {
    fn write(&mut self, case: Case) -> Result<()> {
        (**self).write(case)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Read every remaining case from `source`.
pub fn read_all<S: CaseSource + ?Sized>(source: &mut S) -> Result<Vec<Case>> {
    let mut cases = Vec::new();
    while let Some(case) = source.read()? {
        cases.push(case);
    }
    Ok(cases)
}

/// Copy every remaining case from `source` into `sink`, then finish the
/// sink. Returns the number of cases copied.
pub fn copy_all<S, K>(source: &mut S, sink: &mut K) -> Result<u64>
where
    S: CaseSource + ?Sized,
    K: CaseSink + ?Sized,
{
    let mut n = 0;
    while let Some(case) = source.read()? {
        sink.write(case)?;
        n += 1;
    }
    sink.finish()?;
    Ok(n)
}

/// In-memory source over a list of cases.
#[derive(Debug, Clone)]
pub struct VecSource {
    proto: CaseProto,
    cases: VecDeque<Case>,
}

impl VecSource {
    /// Create a source yielding `cases` in order.
    #[must_use]
    pub fn new(proto: CaseProto, cases: Vec<Case>) -> Self {
        Self {
            proto,
            cases: cases.into(),
        }
    }

    /// Create a source shaped by `dict`.
    #[must_use]
    pub fn from_dict(dict: &Dictionary, cases: Vec<Case>) -> Self {
        Self::new(dict.proto(), cases)
    }

    /// Cases not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cases.len()
    }
}

impl CaseSource for VecSource {
    fn proto(&self) -> &CaseProto {
        &self.proto
    }

    fn read(&mut self) -> Result<Option<Case>> {
        Ok(self.cases.pop_front())
    }
}

/// In-memory sink collecting every case written to it.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    cases: Vec<Case>,
    finished: bool,
}

impl VecSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cases written so far.
    #[must_use]
    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    /// Whether `finish` has been called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume the sink, returning its cases.
    #[must_use]
    pub fn into_cases(self) -> Vec<Case> {
        self.cases
    }
}

impl CaseSink for VecSink {
    fn write(&mut self, case: Case) -> Result<()> {
        self.cases.push(case);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl CaseSink for NullSink {
    fn write(&mut self, _case: Case) -> Result<()> {
        Ok(())
    }
}
