//! Case-processing pipeline.
//!
//! Cases stream from a [`CaseSource`] through the transformation chains of a
//! [`Dataset`] to the procedure reading its [`ProcedureRun`], while the
//! permanently transformed cases are written to a replacement active file.
//! Around that core sit the LAG buffer ([`LagQueue`]), SPLIT FILE grouping
//! ([`split`]) and multipass materialization ([`store`]).
//!
//! # Example
//!
//! ```
//! use caseflow_core::{Dataset, SelectIf, VecSource};
//! use caseflow_model::{Case, Dictionary, Value, VarKind};
//!
//! let dict = Dictionary::from_vars([("X", VarKind::Numeric)]).unwrap();
//! let cases = (1..=5).map(|x| Case::new(vec![Value::number(f64::from(x))])).collect();
//! let mut dataset = Dataset::new(dict.clone(), VecSource::from_dict(&dict, cases));
//!
//! dataset
//!     .add_transformation(SelectIf::new(|case: &Case| case.number(0) > Some(2.0)))
//!     .unwrap();
//! assert_eq!(dataset.collect_cases().unwrap().len(), 3);
//! ```

pub mod caseinit;
pub mod dataset;
pub mod error;
pub mod lag;
pub mod logging;
pub mod options;
pub mod split;
pub mod store;
pub mod stream;
pub mod transform;

pub use caseinit::CaseInit;
pub use dataset::{Dataset, ProcedureRun, RunSummary};
pub use error::{PipelineError, Result};
pub use lag::LagQueue;
pub use options::{PipelineOptions, StoreKind, UnsortedPolicy};
pub use split::{CaseGroups, GroupHandler, GroupStats, SplitGrouper, group_cases};
pub use store::{
    AutoPagingStore, CaseStore, DiskStore, MemoryStore, Replay, ReplayReader, StoreFactory,
    StoreSink, materialize,
};
pub use stream::{CaseSink, CaseSource, NullSink, VecSink, VecSource, copy_all, read_all};
pub use transform::{
    FnTransform, SelectIf, TransformChain, TransformContext, TransformSet, Transformation,
    Verdict,
};
