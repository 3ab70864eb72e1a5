//! Per-input cursor state shared by the merge engines.

use std::cmp::Ordering;

use caseflow_core::logging::redact_value;
use caseflow_core::{CaseSource, PipelineError, Result, UnsortedPolicy};
use caseflow_model::{Case, CaseMap, CaseProto, Value, compare_keys};
use tracing::{debug, trace, warn};

use crate::input::Role;

/// Reading position in one input, with the mapping of its variables into
/// the output dictionary.
pub(crate) struct FileDescriptor {
    label: String,
    role: Role,
    source: Box<dyn CaseSource>,
    source_proto: CaseProto,
    map: CaseMap,
    by: Vec<usize>,
    pairs: Vec<(usize, usize)>,
    in_pos: Option<usize>,
    current: Option<Case>,
    key: Vec<Value>,
    read: u64,
    policy: UnsortedPolicy,
    unsorted_warned: bool,
    duplicate_warned: bool,
}

impl FileDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        label: String,
        role: Role,
        source: Box<dyn CaseSource>,
        source_proto: CaseProto,
        map: CaseMap,
        by: Vec<usize>,
        pairs: Vec<(usize, usize)>,
        in_pos: Option<usize>,
        policy: UnsortedPolicy,
    ) -> Self {
        Self {
            label,
            role,
            source,
            source_proto,
            map,
            by,
            pairs,
            in_pos,
            current: None,
            key: Vec::new(),
            read: 0,
            policy,
            unsorted_warned: false,
            duplicate_warned: false,
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn role(&self) -> Role {
        self.role
    }

    /// Whether a current case is available; false once the input ended.
    pub(crate) fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// BY values of the current case.
    pub(crate) fn key(&self) -> &[Value] {
        &self.key
    }

    /// Order of this input's current key relative to `key`, or `None` at
    /// end of input.
    pub(crate) fn cmp_key(&self, key: &[Value]) -> Option<Ordering> {
        self.current
            .as_ref()
            .map(|_| compare_keys(&self.key, key))
    }

    /// Cases read so far.
    pub(crate) fn cases_read(&self) -> u64 {
        self.read
    }

    /// Replace the current case with the next one from the input.
    pub(crate) fn advance(&mut self) -> Result<()> {
        let Some(raw) = self.source.read()? else {
            if self.current.take().is_some() || self.read == 0 {
                debug!(file = %self.label, cases = self.read, "input exhausted");
            }
            return Ok(());
        };
        self.read += 1;
        self.source_proto.check(&raw)?;
        let case = self.map.apply(raw);
        let key = case.project(&self.by);

        if self.read > 1 && !self.by.is_empty() {
            match compare_keys(&key, &self.key) {
                Ordering::Less => self.out_of_order(&key)?,
                Ordering::Equal if self.role == Role::Table && !self.duplicate_warned => {
                    self.duplicate_warned = true;
                    warn!(
                        file = %self.label,
                        case = self.read,
                        "duplicate BY key in table; only the first case is matched"
                    );
                }
                _ => {}
            }
        }
        trace!(file = %self.label, case = self.read, "advanced");
        self.key = key;
        self.current = Some(case);
        Ok(())
    }

    fn out_of_order(&mut self, key: &[Value]) -> Result<()> {
        match self.policy {
            UnsortedPolicy::Ignore => Ok(()),
            UnsortedPolicy::Warn => {
                if !self.unsorted_warned {
                    self.unsorted_warned = true;
                    warn!(
                        file = %self.label,
                        case = self.read,
                        key = %describe_key(key),
                        "input is not sorted on the BY variables"
                    );
                }
                Ok(())
            }
            UnsortedPolicy::Fail => Err(PipelineError::unsorted(self.label.clone(), self.read)),
        }
    }

    /// Copy the current case's values into `values`, skipping positions an
    /// earlier contributor already filled, and set the IN flag.
    pub(crate) fn contribute(&self, values: &mut [Value], filled: &mut [bool]) {
        let Some(case) = &self.current else {
            return;
        };
        for &(src, dst) in &self.pairs {
            if !filled[dst] {
                values[dst].clone_from(&case[src]);
                filled[dst] = true;
            }
        }
        if let Some(pos) = self.in_pos {
            values[pos] = Value::number(1.0);
        }
    }

    /// Read and discard everything left in the input. Returns how many
    /// cases were discarded, including the current one.
    pub(crate) fn discard_rest(&mut self) -> Result<u64> {
        let mut discarded = 0;
        while self.is_open() {
            discarded += 1;
            self.advance()?;
        }
        Ok(discarded)
    }
}

/// BY values for log output, redacted unless data logging is enabled.
fn describe_key(key: &[Value]) -> String {
    let text = key
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    redact_value(&text)
}
