//! Case and dictionary model for the caseflow pipeline.
//!
//! A [`Dictionary`] describes the shape shared by every [`Case`] flowing
//! through one stage of a pipeline. Cases hold [`Value`]s: doubles, with
//! [`SYSMIS`] as the "no data" sentinel, or space-padded byte strings of the
//! declared width.
//!
//! # Example
//!
//! ```
//! use caseflow_model::{Case, Dictionary, Value, VarKind};
//!
//! let dict = Dictionary::from_vars([
//!     ("ID", VarKind::Numeric),
//!     ("NAME", VarKind::String(8)),
//! ])
//! .unwrap();
//!
//! let case = Case::new(vec![Value::number(1.0), Value::string("ADA", 8)]);
//! assert!(dict.check_case(&case).is_ok());
//! assert_eq!(case[1].to_string(), "ADA");
//! ```

mod case;
mod case_map;
mod dictionary;
mod error;
mod value;

pub use case::{Case, CaseProto, compare_keys};
pub use case_map::CaseMap;
pub use dictionary::{Dictionary, VarKind, Variable};
pub use error::{ModelError, Result};
pub use value::{NUMERIC_WIDTH, SYSMIS, Value};
