//! Merge counters.

/// Counts reported by a merge engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// Output cases built (one per round for MATCH FILES).
    pub rounds: u64,
    /// Output cases handed to the reader.
    pub output_cases: u64,
    /// TABLE cases read past while catching up to a FILE key.
    pub table_rows_skipped: u64,
    /// TABLE cases left unread when the last FILE input ended.
    pub table_rows_discarded: u64,
}
