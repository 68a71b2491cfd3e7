//! Depth-bounded deferred invocation.
//!
//! A [`DeferStack`] runs callbacks synchronously while the nesting depth of
//! re-entrant `schedule` calls stays below its capacity. Once the bound is
//! reached, further callbacks are parked in a buffer and executed by the
//! outermost `schedule` call after its own callback returns, at a shallow
//! stack depth again.
//!
//! Buffered work drains breadth-first by overflow generation: callbacks
//! deferred before a drain pass run in arrival order, and anything they
//! defer in turn runs after all of them.
//!
//! # Failures
//!
//! A callback that returns `Err` (or panics) closes the outermost window.
//! The scheduler is reset to idle, every callback still buffered for that
//! window is dropped without being invoked, and the error is returned from
//! the outermost `schedule` call. Inside a nested synchronous call the error
//! is first handed to the callback that made the call, which normally
//! forwards it with `?`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace, warn};

use crate::config::{ContractChecks, DeferConfig};
use crate::error::{Error, Result};
use crate::stats::{DeferStats, SchedulerState};

/// A unit of work parked in the buffer.
pub type DeferredFunc = Box<dyn FnOnce() -> anyhow::Result<()>>;

/// Scheduler state for one logical thread of execution.
///
/// All methods take `&self` so that a running callback can re-enter the
/// scheduler that invoked it, typically through an `Rc<DeferStack>` or the
/// thread-local default (see [`crate::schedule`]). The type is neither
/// `Send` nor `Sync`.
pub struct DeferStack {
    capacity: usize,
    default_start_level: usize,
    contract_checks: ContractChecks,

    depth: Cell<usize>,
    start_level: Cell<usize>,
    window_open: Cell<bool>,
    draining: Cell<bool>,
    overflowed: Cell<bool>,
    /// Work owed a drain iteration, in execution order.
    pending: RefCell<VecDeque<DeferredFunc>>,
    /// Work deferred since the last merge into `pending`.
    staging: RefCell<Vec<DeferredFunc>>,
    pending_count: Cell<usize>,

    stats: Cell<DeferStats>,
}

impl Default for DeferStack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeferStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferStack")
            .field("capacity", &self.capacity)
            .field("state", &self.state())
            .field("overflowed", &self.overflowed.get())
            .finish()
    }
}

/// Closes the outermost window on every exit path, including unwinding.
struct WindowGuard<'a> {
    stack: &'a DeferStack,
    completed: bool,
}

impl WindowGuard<'_> {
    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for WindowGuard<'_> {
    fn drop(&mut self) {
        self.stack.close_window(self.completed);
    }
}

/// Puts the depth back when a nested call exits, including by a panic its
/// caller catches.
struct DepthGuard<'a> {
    stack: &'a DeferStack,
    depth: usize,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.stack.depth.set(self.depth);
    }
}

impl DeferStack {
    /// Create a scheduler with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_validated(DeferConfig::default())
    }

    /// Create a scheduler from an explicit configuration.
    pub fn with_config(config: DeferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: DeferConfig) -> Self {
        Self {
            capacity: config.capacity,
            default_start_level: config.default_start_level,
            contract_checks: config.contract_checks,
            depth: Cell::new(0),
            start_level: Cell::new(0),
            window_open: Cell::new(false),
            draining: Cell::new(false),
            overflowed: Cell::new(false),
            pending: RefCell::new(VecDeque::new()),
            staging: RefCell::new(Vec::new()),
            pending_count: Cell::new(0),
            stats: Cell::new(DeferStats::default()),
        }
    }

    /// Maximum synchronous nesting depth.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `f` now, or defer it if the nesting bound has been reached.
    ///
    /// Uses the configured default start level when this call opens the
    /// outermost window.
    pub fn schedule<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.schedule_with_start(f, self.default_start_level)
    }

    /// Like [`schedule`](Self::schedule), but an outermost window opened by
    /// this call starts at `start_level` instead of the default. A caller that
    /// is already deep can use this to claim headroom up front; a start level
    /// at or above the capacity makes every nested call defer.
    ///
    /// `start_level` has no effect on a nested call.
    pub fn schedule_with_start<F>(&self, f: F, start_level: usize) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        let start_level = self.check_start_level(start_level)?;
        if self.window_open.get() {
            self.run_nested(f)
        } else {
            self.run_outermost(f, start_level)
        }
    }

    pub fn state(&self) -> SchedulerState {
        if !self.window_open.get() {
            SchedulerState::Idle
        } else if self.draining.get() {
            SchedulerState::Draining {
                depth: self.depth.get(),
                pending: self.pending_count.get(),
            }
        } else {
            SchedulerState::WindowOpen {
                depth: self.depth.get(),
            }
        }
    }

    /// True when no window is open and nothing is owed.
    pub fn is_idle(&self) -> bool {
        !self.window_open.get()
            && self.depth.get() == 0
            && !self.overflowed.get()
            && self.pending_count.get() == 0
            && self.pending.borrow().is_empty()
            && self.staging.borrow().is_empty()
    }

    pub fn is_window_open(&self) -> bool {
        self.window_open.get()
    }

    /// Current nesting depth; 0 when idle.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// True once the current outermost window has deferred anything.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed.get()
    }

    /// Number of deferred callbacks not yet executed.
    pub fn pending_len(&self) -> usize {
        self.pending_count.get()
    }

    pub fn stats(&self) -> DeferStats {
        self.stats.get()
    }

    fn check_start_level(&self, start_level: usize) -> Result<usize> {
        if start_level > 0 {
            return Ok(start_level);
        }
        match self.contract_checks {
            ContractChecks::Off => Ok(self.default_start_level),
            ContractChecks::Warn => {
                warn!(
                    start_level,
                    fallback = self.default_start_level,
                    "schedule called with a non-positive start level"
                );
                Ok(self.default_start_level)
            }
            ContractChecks::Strict => Err(Error::InvalidStartLevel(start_level)),
        }
    }

    fn run_nested<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        let depth = self.depth.get();
        if depth >= self.capacity {
            self.defer(Box::new(f));
            return Ok(());
        }
        let _restore = DepthGuard { stack: self, depth };
        self.enter(depth + 1);
        f().map_err(Error::from_callback)
    }

    fn run_outermost<F>(&self, f: F, start_level: usize) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.start_level.set(start_level);
        self.window_open.set(true);
        let guard = WindowGuard {
            stack: self,
            completed: false,
        };

        self.enter(start_level);
        f().map_err(Error::from_callback)?;
        self.drain()?;

        guard.complete();
        Ok(())
    }

    fn enter(&self, depth: usize) {
        self.depth.set(depth);
        self.update_stats(|stats| {
            stats.invoked += 1;
            stats.max_depth = stats.max_depth.max(depth);
        });
    }

    fn defer(&self, f: DeferredFunc) {
        self.staging.borrow_mut().push(f);
        let owed = self.pending_count.get() + 1;
        self.pending_count.set(owed);
        self.overflowed.set(true);
        self.update_stats(|stats| stats.deferred += 1);
        trace!(
            depth = self.depth.get(),
            pending = owed,
            "nesting bound reached, deferring callback"
        );
    }

    fn drain(&self) -> Result<()> {
        if self.pending_count.get() == 0 {
            return Ok(());
        }
        self.draining.set(true);
        debug!(pending = self.pending_count.get(), "draining deferred callbacks");

        while self.pending_count.get() > 0 {
            self.depth.set(self.start_level.get());
            self.merge_staging();
            debug_assert_eq!(self.pending_count.get(), self.pending.borrow().len());

            let next = self.pending.borrow_mut().pop_front();
            let Some(next) = next else {
                panic!(
                    "deferstack bookkeeping corrupted: {} callbacks owed but none buffered",
                    self.pending_count.get()
                );
            };
            self.pending_count.set(self.pending_count.get() - 1);
            self.update_stats(|stats| stats.drained += 1);

            next().map_err(Error::from_callback)?;
        }
        Ok(())
    }

    fn merge_staging(&self) {
        let mut staging = self.staging.borrow_mut();
        if !staging.is_empty() {
            self.pending.borrow_mut().extend(staging.drain(..));
        }
    }

    fn close_window(&self, completed: bool) {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        let staging = std::mem::take(&mut *self.staging.borrow_mut());
        let discarded = pending.len() + staging.len();
        let owed = self.pending_count.get();

        self.depth.set(0);
        self.start_level.set(0);
        self.window_open.set(false);
        self.draining.set(false);
        self.overflowed.set(false);
        self.pending_count.set(0);

        if completed {
            assert_eq!(
                discarded, 0,
                "deferstack bookkeeping corrupted: window closed with buffered work"
            );
            self.update_stats(|stats| stats.windows_completed += 1);
            debug!("window closed");
        } else {
            self.update_stats(|stats| {
                stats.windows_failed += 1;
                stats.discarded += discarded as u64;
            });
            if std::thread::panicking() {
                warn!(discarded, owed, "callback panicked, scheduler reset to idle");
            } else {
                warn!(discarded, owed, "callback failed, scheduler reset to idle");
            }
        }

        // Captured values may run arbitrary code on drop; the state is
        // already idle by now.
        drop(pending);
        drop(staging);
    }

    fn update_stats(&self, f: impl FnOnce(&mut DeferStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}
