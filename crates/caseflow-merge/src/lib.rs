//! Merge engines for sorted case streams.
//!
//! [`MatchFiles`] joins FILE inputs case by case (or on BY keys) and looks
//! up TABLE inputs by key. [`AddFiles`] concatenates inputs, or interleaves
//! them on BY keys. Both produce a [`caseflow_core::CaseSource`] over a
//! dictionary that is the union of the inputs' variables.
//!
//! # Example
//!
//! ```
//! use caseflow_core::{VecSource, read_all};
//! use caseflow_merge::{MatchFiles, MergeInput};
//! use caseflow_model::{Case, Dictionary, Value, VarKind};
//!
//! let people = Dictionary::from_vars([("ID", VarKind::Numeric), ("AGE", VarKind::Numeric)])?;
//! let scores = Dictionary::from_vars([("ID", VarKind::Numeric), ("SCORE", VarKind::Numeric)])?;
//! let row = |id: f64, v: f64| Case::new(vec![Value::number(id), Value::number(v)]);
//!
//! let mut merged = MatchFiles::new()
//!     .by(&["ID"])
//!     .input(MergeInput::file(
//!         people.clone(),
//!         VecSource::from_dict(&people, vec![row(1.0, 30.0), row(2.0, 41.0)]),
//!     ))
//!     .input(MergeInput::file(
//!         scores.clone(),
//!         VecSource::from_dict(&scores, vec![row(2.0, 88.0)]),
//!     ))
//!     .build()?;
//!
//! let cases = read_all(&mut merged)?;
//! assert_eq!(cases.len(), 2);
//! assert!(cases[0][2].is_sysmis());
//! assert_eq!(cases[1].number(2), Some(88.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod add_files;
mod descriptor;
pub mod error;
pub mod input;
mod layout;
pub mod match_files;
pub mod stats;

pub use add_files::{AddEngine, AddFiles};
pub use error::{MergeError, Result};
pub use input::{MergeInput, Role};
pub use match_files::{MatchEngine, MatchFiles, MergeState};
pub use stats::MergeStats;
