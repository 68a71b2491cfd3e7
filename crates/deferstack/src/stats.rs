//! Status snapshots for reporting.

use serde::{Deserialize, Serialize};

/// Externally observable phase of a scheduler.
///
/// Error recovery is not represented: the reset runs to completion before
/// control returns to anyone who could observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SchedulerState {
    /// No window open and nothing owed.
    Idle,
    /// Inside the synchronous portion of the outermost window.
    WindowOpen { depth: usize },
    /// The outermost callback returned; buffered work is being executed.
    Draining { depth: usize, pending: usize },
}

impl SchedulerState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Cumulative counters over a scheduler's lifetime.
///
/// These survive the idle reset between outermost windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferStats {
    /// Outermost windows that drained to completion.
    pub windows_completed: u64,
    /// Outermost windows closed by a failing or panicking callback.
    pub windows_failed: u64,
    /// Callbacks invoked synchronously on the caller's stack.
    pub invoked: u64,
    /// Callbacks redirected to the buffer because the depth bound was hit.
    pub deferred: u64,
    /// Buffered callbacks executed by a drain pass.
    pub drained: u64,
    /// Buffered callbacks thrown away by an error-recovery reset.
    pub discarded: u64,
    /// Deepest nesting level reached by a synchronous invocation.
    pub max_depth: usize,
}
