//! Transformation chains.
//!
//! A transformation rewrites one case at a time and reports a [`Verdict`].
//! Transformations are collected into a [`TransformChain`]; a dataset keeps a
//! permanent chain and, after TEMPORARY, a temporary chain (see
//! [`TransformSet`]).
//!
//! # Example
//!
//! ```
//! use caseflow_core::transform::{SelectIf, TransformChain, TransformContext, Verdict};
//! use caseflow_model::{Case, Value};
//!
//! let mut chain = TransformChain::new();
//! chain.add(Box::new(SelectIf::new(|case: &Case| case.number(0) > Some(1.0)))).unwrap();
//!
//! let mut case = Case::new(vec![Value::number(0.5)]);
//! assert_eq!(chain.execute(&mut case, &TransformContext::new(1)), Verdict::Drop);
//! ```

use std::fmt;

use caseflow_model::Case;

use crate::error::{PipelineError, Result};
use crate::lag::LagQueue;

/// Outcome of applying a transformation to a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Go on to the next transformation.
    Continue,
    /// Discard this case; the run goes on.
    Drop,
    /// Fatal: abort the whole run.
    Error,
    /// Continue at the transformation with this index.
    JumpTo(usize),
}

/// Per-case information available to transformations.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    case_number: u64,
    lag: Option<&'a LagQueue>,
}

impl<'a> TransformContext<'a> {
    /// Context for the case with 1-based number `case_number`.
    #[must_use]
    pub fn new(case_number: u64) -> Self {
        Self {
            case_number,
            lag: None,
        }
    }

    /// Attach the look-back buffer.
    #[must_use]
    pub fn with_lag(mut self, lag: &'a LagQueue) -> Self {
        self.lag = Some(lag);
        self
    }

    /// 1-based number of the case being transformed.
    #[must_use]
    pub fn case_number(&self) -> u64 {
        self.case_number
    }

    /// The case `k` cases before this one, if still available.
    #[must_use]
    pub fn lagged(&self, k: usize) -> Option<&'a Case> {
        self.lag.and_then(|lag| lag.get(k))
    }
}

/// A single case-rewriting step.
///
/// Implementations may change values in place but must not change the
/// case's shape.
pub trait Transformation {
    /// Human-readable name for logging and error reports.
    fn name(&self) -> &str;

    /// Apply the step to `case`.
    fn execute(&mut self, case: &mut Case, ctx: &TransformContext<'_>) -> Verdict;

    /// How many previous cases this step looks back at through
    /// [`TransformContext::lagged`].
    fn lag(&self) -> usize {
        0
    }
}

/// Transformation backed by a closure.
pub struct FnTransform<F> {
    name: String,
    lag: usize,
    f: F,
}

impl<F> FnTransform<F>
where
    F: FnMut(&mut Case, &TransformContext<'_>) -> Verdict,
{
    /// Wrap `f` as a transformation called `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            lag: 0,
            f,
        }
    }

    /// Declare the look-back distance `f` needs.
    #[must_use]
    pub fn with_lag(mut self, lag: usize) -> Self {
        self.lag = lag;
        self
    }
}

impl<F> Transformation for FnTransform<F>
where
    F: FnMut(&mut Case, &TransformContext<'_>) -> Verdict,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, case: &mut Case, ctx: &TransformContext<'_>) -> Verdict {
        (self.f)(case, ctx)
    }

    fn lag(&self) -> usize {
        self.lag
    }
}

/// Keeps cases for which the predicate holds and drops the rest.
pub struct SelectIf<P> {
    predicate: P,
}

impl<P: FnMut(&Case) -> bool> SelectIf<P> {
    /// Create a selection step.
    pub fn new(predicate: P) -> Self {
        Self { predicate }
    }
}

impl<P: FnMut(&Case) -> bool> Transformation for SelectIf<P> {
    fn name(&self) -> &str {
        "SELECT IF"
    }

    fn execute(&mut self, case: &mut Case, _ctx: &TransformContext<'_>) -> Verdict {
        if (self.predicate)(case) {
            Verdict::Continue
        } else {
            Verdict::Drop
        }
    }
}

/// Ordered list of transformations.
#[derive(Default)]
pub struct TransformChain {
    steps: Vec<Box<dyn Transformation>>,
    finalized: bool,
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformChain")
            .field("steps", &self.names())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl TransformChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transformation.
    pub fn add(&mut self, step: Box<dyn Transformation>) -> Result<()> {
        if self.finalized {
            return Err(PipelineError::ChainFinalized);
        }
        self.steps.push(step);
        Ok(())
    }

    /// Append every step of `other`, consuming it.
    pub fn append(&mut self, other: TransformChain) -> Result<()> {
        if self.finalized {
            return Err(PipelineError::ChainFinalized);
        }
        self.steps.extend(other.steps);
        Ok(())
    }

    /// Refuse further appends.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    /// Whether the chain has been finalized.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if the chain has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Largest look-back distance any step needs.
    #[must_use]
    pub fn max_lag(&self) -> usize {
        self.steps.iter().map(|s| s.lag()).max().unwrap_or(0)
    }

    /// Apply the chain to `case`, starting at the first step.
    ///
    /// Returns `Continue` when the case ran off the end of the chain,
    /// otherwise the `Drop` or `Error` verdict that stopped it. A jump to an
    /// index at or past the end of the chain ends it with `Continue`. Jumps
    /// are not checked for cycles.
    pub fn execute(&mut self, case: &mut Case, ctx: &TransformContext<'_>) -> Verdict {
        self.run(0, case, ctx).0
    }

    /// Apply the chain to `case` with the cursor starting at step `start`.
    /// A `start` at or past the end runs no steps and yields `Continue`.
    pub fn execute_from(
        &mut self,
        start: usize,
        case: &mut Case,
        ctx: &TransformContext<'_>,
    ) -> Verdict {
        self.run(start, case, ctx).0
    }

    /// Like [`TransformChain::execute`], reporting the `Error` verdict as
    /// [`PipelineError::TransformFailed`]. Returns whether the case is kept.
    pub fn try_execute(&mut self, case: &mut Case, ctx: &TransformContext<'_>) -> Result<bool> {
        match self.run(0, case, ctx) {
            (Verdict::Drop, _) => Ok(false),
            (Verdict::Error, index) => Err(PipelineError::TransformFailed {
                name: self.steps[index].name().to_string(),
                index,
                case_number: ctx.case_number(),
            }),
            _ => Ok(true),
        }
    }

    fn run(
        &mut self,
        start: usize,
        case: &mut Case,
        ctx: &TransformContext<'_>,
    ) -> (Verdict, usize) {
        let mut idx = start;
        while let Some(step) = self.steps.get_mut(idx) {
            match step.execute(case, ctx) {
                Verdict::Continue => idx += 1,
                Verdict::JumpTo(target) => idx = target,
                verdict @ (Verdict::Drop | Verdict::Error) => return (verdict, idx),
            }
        }
        (Verdict::Continue, idx)
    }
}

/// The permanent chain plus the optional temporary chain of a dataset.
#[derive(Debug, Default)]
pub struct TransformSet {
    permanent: TransformChain,
    temporary: Option<TransformChain>,
}

impl TransformSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the temporary chain when TEMPORARY is in effect, otherwise
    /// to the permanent chain.
    pub fn add(&mut self, step: Box<dyn Transformation>) -> Result<()> {
        match &mut self.temporary {
            Some(temp) => temp.add(step),
            None => self.permanent.add(step),
        }
    }

    /// Begin collecting temporary transformations. Has no effect if
    /// TEMPORARY is already in effect.
    pub fn start_temporary(&mut self) {
        if self.temporary.is_none() {
            self.temporary = Some(TransformChain::new());
        }
    }

    /// Whether TEMPORARY is in effect.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.temporary.is_some()
    }

    /// Move the temporary steps onto the end of the permanent chain.
    pub fn make_temporary_permanent(&mut self) -> Result<()> {
        if let Some(temp) = self.temporary.take() {
            self.permanent.append(temp)?;
        }
        Ok(())
    }

    /// Discard the temporary steps as a block.
    pub fn cancel_temporary(&mut self) -> Option<TransformChain> {
        self.temporary.take()
    }

    /// Finalize both chains.
    pub fn finalize(&mut self) {
        self.permanent.finalize();
        if let Some(temp) = &mut self.temporary {
            temp.finalize();
        }
    }

    /// The permanent chain.
    #[must_use]
    pub fn permanent(&self) -> &TransformChain {
        &self.permanent
    }

    /// The temporary chain, if any.
    #[must_use]
    pub fn temporary(&self) -> Option<&TransformChain> {
        self.temporary.as_ref()
    }

    /// Both chains, mutably, for execution.
    pub fn chains_mut(&mut self) -> (&mut TransformChain, Option<&mut TransformChain>) {
        (&mut self.permanent, self.temporary.as_mut())
    }

    /// Total number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.permanent.len() + self.temporary.as_ref().map_or(0, TransformChain::len)
    }

    /// True if neither chain has steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest look-back distance across both chains.
    #[must_use]
    pub fn max_lag(&self) -> usize {
        self.permanent
            .max_lag()
            .max(self.temporary.as_ref().map_or(0, TransformChain::max_lag))
    }
}
