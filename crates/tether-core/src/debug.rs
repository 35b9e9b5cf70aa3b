#![forbid(unsafe_code)]

//! Failure-posture toggles.
//!
//! Two independent thread-local flags control how failures surface:
//!
//! - **break on access failure**: when set, an accessor's underlying get/set
//!   error propagates to the caller; when clear, `pull` degrades to
//!   `Value::Nil` and `push` reports `false`.
//! - **break on bind failure**: when set, a failed binding invocation
//!   returns an error; when clear, it reports `false` and the owning context
//!   prunes it on the next update.
//!
//! Both default to off: a live session degrades a single broken binding
//! instead of crashing, while interactive development can opt into failing
//! loudly.

use std::cell::Cell;

thread_local! {
    static BREAK_ON_ACCESS: Cell<bool> = const { Cell::new(false) };
    static BREAK_ON_BIND: Cell<bool> = const { Cell::new(false) };
}

/// Whether accessor failures propagate instead of degrading to a sentinel.
#[must_use]
pub fn break_on_access_failure() -> bool {
    BREAK_ON_ACCESS.with(Cell::get)
}

/// Set the access-failure posture for the current thread.
pub fn set_break_on_access_failure(on: bool) {
    BREAK_ON_ACCESS.with(|f| f.set(on));
}

/// Whether binding failures propagate instead of reporting `false`.
#[must_use]
pub fn break_on_bind_failure() -> bool {
    BREAK_ON_BIND.with(Cell::get)
}

/// Set the bind-failure posture for the current thread.
pub fn set_break_on_bind_failure(on: bool) {
    BREAK_ON_BIND.with(|f| f.set(on));
}

/// RAII guard that sets both flags and restores the previous posture on
/// drop. Intended for tests and interactive sessions.
#[derive(Debug)]
pub struct StrictGuard {
    prev_access: bool,
    prev_bind: bool,
}

impl StrictGuard {
    /// Enable both break flags until the guard drops.
    #[must_use]
    pub fn new() -> Self {
        let guard = Self {
            prev_access: break_on_access_failure(),
            prev_bind: break_on_bind_failure(),
        };
        set_break_on_access_failure(true);
        set_break_on_bind_failure(true);
        guard
    }
}

impl Default for StrictGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StrictGuard {
    fn drop(&mut self) {
        set_break_on_access_failure(self.prev_access);
        set_break_on_bind_failure(self.prev_bind);
    }
}
