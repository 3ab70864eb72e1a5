//! Configuration options for pipeline runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default in-memory case budget for auto-paging stores.
pub const DEFAULT_WORKSPACE_CASES: usize = 65_536;

/// Backing store used for replacement active files and multipass
/// materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Keep every case in memory.
    Memory,
    /// Write every case to a temporary file.
    Disk,
    /// Keep cases in memory up to the workspace budget, then spill to disk.
    #[default]
    Auto,
}

/// What the merge engines do when an input's BY keys decrease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsortedPolicy {
    /// Do not check; output is unspecified for unsorted input.
    Ignore,
    /// Log a warning and continue.
    #[default]
    Warn,
    /// Abort the merge with an error.
    Fail,
}

/// Options controlling pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Backing store kind.
    pub store: StoreKind,

    /// Cases an auto-paging store keeps in memory before spilling.
    pub workspace_cases: usize,

    /// Directory for spill files (system temp dir when unset).
    pub temp_dir: Option<PathBuf>,

    /// Maximum number of cases read from the active source per run
    /// (N OF CASES).
    pub case_limit: Option<u64>,

    /// Handling of out-of-order BY keys during merges.
    pub unsorted: UnsortedPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            store: StoreKind::Auto,
            workspace_cases: DEFAULT_WORKSPACE_CASES,
            temp_dir: None,
            case_limit: None,
            unsorted: UnsortedPolicy::Warn,
        }
    }
}

impl PipelineOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backing store kind.
    #[must_use]
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    /// Set the in-memory case budget.
    #[must_use]
    pub fn with_workspace_cases(mut self, cases: usize) -> Self {
        self.workspace_cases = cases;
        self
    }

    /// Set the spill directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Limit the cases read per run.
    #[must_use]
    pub fn with_case_limit(mut self, limit: Option<u64>) -> Self {
        self.case_limit = limit;
        self
    }

    /// Set the unsorted-input policy.
    #[must_use]
    pub fn with_unsorted(mut self, policy: UnsortedPolicy) -> Self {
        self.unsorted = policy;
        self
    }
}
