//! Depth-bounded deferred invocation for single-threaded, run-to-completion
//! code.
//!
//! Chains of callbacks that synchronously trigger more callbacks (promise
//! resolution being the usual suspect) grow the native stack without bound.
//! `schedule` runs a callback right away while the chain is shallow and
//! parks it for later once the chain reaches the configured depth, so the
//! stack never holds more than `capacity` scheduler frames.
//!
//! ```
//! fn countdown(n: u32) -> anyhow::Result<()> {
//!     if n > 0 {
//!         deferstack::schedule(move || countdown(n - 1))?;
//!     }
//!     Ok(())
//! }
//!
//! // Would overflow the stack if every link ran on top of the previous one.
//! deferstack::schedule(|| countdown(100_000)).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod stats;

pub use config::{ContractChecks, DeferConfig};
pub use error::{Error, Result};
pub use scheduler::{DeferStack, DeferredFunc};
pub use stats::{DeferStats, SchedulerState};

thread_local! {
    static DEFAULT_STACK: DeferStack = DeferStack::new();
}

/// Run `f` against this thread's default scheduler.
pub fn with_default<R>(f: impl FnOnce(&DeferStack) -> R) -> R {
    DEFAULT_STACK.with(f)
}

/// Schedule `f` on this thread's default scheduler.
///
/// See [`DeferStack::schedule`].
pub fn schedule<F>(f: F) -> Result<()>
where
    F: FnOnce() -> anyhow::Result<()> + 'static,
{
    with_default(|stack| stack.schedule(f))
}

/// Schedule `f` on this thread's default scheduler, opening the outermost
/// window at `start_level`.
///
/// See [`DeferStack::schedule_with_start`].
pub fn schedule_with_start<F>(f: F, start_level: usize) -> Result<()>
where
    F: FnOnce() -> anyhow::Result<()> + 'static,
{
    with_default(|stack| stack.schedule_with_start(f, start_level))
}
