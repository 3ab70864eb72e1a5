//! Output dictionary construction and FIRST/LAST bookkeeping.
//!
//! The output dictionary is the union, by name, of every input's variables
//! in declaration order, followed by the IN variables (in declaration order
//! of their inputs), then FIRST, then LAST. A name shared by several inputs
//! must have the same type and width in all of them.

use caseflow_core::PipelineOptions;
use caseflow_model::{Case, CaseMap, Dictionary, Value, VarKind, Variable, compare_keys};
use tracing::debug;

use crate::descriptor::FileDescriptor;
use crate::error::{MergeError, Result};
use crate::input::MergeInput;

/// Everything a merge engine needs, built once before streaming.
pub(crate) struct Layout {
    pub(crate) dict: Dictionary,
    pub(crate) files: Vec<FileDescriptor>,
    /// Output case with every data variable missing and every flag 0.
    pub(crate) blank: Vec<Value>,
    pub(crate) group: GroupFlags,
}

/// Build the output dictionary and one descriptor per input.
pub(crate) fn build_layout(
    inputs: Vec<MergeInput>,
    by: &[String],
    first: Option<&str>,
    last: Option<&str>,
    options: &PipelineOptions,
) -> Result<Layout> {
    struct Staged {
        input: MergeInput,
        label: String,
        map: CaseMap,
        by: Vec<usize>,
        pairs: Vec<(usize, usize)>,
    }

    let mut dict = Dictionary::new();
    let mut staged = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.into_iter().enumerate() {
        let label = input
            .label
            .clone()
            .unwrap_or_else(|| format!("{} #{}", input.role, index + 1));
        let effective = input.effective_dict()?;
        let map = CaseMap::between(&input.dict, &effective)?;

        let by_positions = by
            .iter()
            .map(|name| {
                effective
                    .lookup(name)
                    .map(Variable::position)
                    .ok_or_else(|| MergeError::missing_by(label.clone(), name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut pairs = Vec::with_capacity(effective.len());
        for var in effective.iter() {
            let dst = match dict.lookup(var.name()) {
                Some(existing) if existing.kind() == var.kind() => existing.position(),
                Some(_) => return Err(MergeError::incompatible(label, var.name())),
                None => {
                    let position = dict.add_var(var.name(), var.kind())?;
                    if let Some(text) = var.label() {
                        dict.set_label(var.name(), Some(text))?;
                    }
                    position
                }
            };
            pairs.push((var.position(), dst));
        }

        staged.push(Staged {
            input,
            label,
            map,
            by: by_positions,
            pairs,
        });
    }

    let mut in_positions = Vec::with_capacity(staged.len());
    for stage in &staged {
        let pos = match &stage.input.in_var {
            Some(name) => Some(add_flag(&mut dict, name)?),
            None => None,
        };
        in_positions.push(pos);
    }
    let first = first.map(|name| add_flag(&mut dict, name)).transpose()?;
    let last = last.map(|name| add_flag(&mut dict, name)).transpose()?;

    let mut blank = dict.blank_case().into_values();
    for pos in in_positions.iter().flatten().chain(&first).chain(&last) {
        blank[*pos] = Value::number(0.0);
    }

    let files = staged
        .into_iter()
        .zip(in_positions)
        .map(|(stage, in_pos)| {
            let source_proto = stage.input.dict.proto();
            debug!(
                file = %stage.label,
                role = %stage.input.role,
                variables = stage.pairs.len(),
                "merge input prepared"
            );
            FileDescriptor::new(
                stage.label,
                stage.input.role,
                stage.input.source,
                source_proto,
                stage.map,
                stage.by,
                stage.pairs,
                in_pos,
                options.unsorted,
            )
        })
        .collect();

    Ok(Layout {
        dict,
        files,
        blank,
        group: GroupFlags::new(first, last),
    })
}

fn add_flag(dict: &mut Dictionary, name: &str) -> Result<usize> {
    if dict.lookup(name).is_some() {
        return Err(MergeError::FlagNameInUse {
            name: name.to_string(),
        });
    }
    Ok(dict.add_var(name, VarKind::Numeric)?)
}

/// Holds output one case behind so LAST can be decided from the next key.
pub(crate) struct GroupFlags {
    first: Option<usize>,
    last: Option<usize>,
    held: Option<(Vec<Value>, Vec<Value>)>,
}

impl GroupFlags {
    pub(crate) fn new(first: Option<usize>, last: Option<usize>) -> Self {
        Self {
            first,
            last,
            held: None,
        }
    }

    /// Accept the values of the next output case and its key. Returns the
    /// case that is now ready to emit, if any.
    pub(crate) fn push(&mut self, mut values: Vec<Value>, key: Vec<Value>) -> Option<Case> {
        if self.first.is_none() && self.last.is_none() {
            return Some(Case::new(values));
        }
        let ready = match self.held.take() {
            None => {
                set_flag(&mut values, self.first, true);
                None
            }
            Some((mut held, held_key)) => {
                let new_group = compare_keys(&held_key, &key).is_ne();
                set_flag(&mut held, self.last, new_group);
                set_flag(&mut values, self.first, new_group);
                Some(Case::new(held))
            }
        };
        self.held = Some((values, key));
        ready
    }

    /// The held case, which is the last of its group, at end of output.
    pub(crate) fn finish(&mut self) -> Option<Case> {
        let (mut values, _) = self.held.take()?;
        set_flag(&mut values, self.last, true);
        Some(Case::new(values))
    }
}

fn set_flag(values: &mut [Value], position: Option<usize>, on: bool) {
    if let Some(slot) = position.and_then(|position| values.get_mut(position)) {
        *slot = Value::number(if on { 1.0 } else { 0.0 });
    }
}
