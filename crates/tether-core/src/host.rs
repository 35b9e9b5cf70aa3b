#![forbid(unsafe_code)]

//! Host backend contract.
//!
//! A host is anything that owns externally addressed named properties —
//! typically the command layer of an embedding GUI toolkit, where `address`
//! names a widget and `prop` one of its properties. The engine only needs
//! query/apply/exists; how those map to native calls is the host's business.
//!
//! One backend is installed per thread. String-addressed accessors resolve
//! it at pull/push time, so a backend installed after a binding was built
//! still serves that binding, and an uninstalled backend fails predictably
//! with [`AccessError::NoHost`] rather than crashing a dispatch loop.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::AccessError;
use crate::value::Value;

/// Read/write access to externally addressed named properties.
pub trait HostBackend {
    /// Read property `prop` of the object at `address`.
    fn query(&self, address: &str, prop: &str) -> Result<Value, AccessError>;

    /// Write property `prop` of the object at `address`.
    fn apply(&self, address: &str, prop: &str, value: Value) -> Result<(), AccessError>;

    /// Whether `address` currently names a live host object.
    fn exists(&self, address: &str) -> bool;
}

thread_local! {
    static BACKEND: RefCell<Option<Rc<dyn HostBackend>>> = const { RefCell::new(None) };
}

/// Install `backend` as the current thread's host, replacing any previous one.
pub fn install(backend: Rc<dyn HostBackend>) {
    BACKEND.with(|slot| *slot.borrow_mut() = Some(backend));
}

/// The currently installed backend, if any.
#[must_use]
pub fn current() -> Option<Rc<dyn HostBackend>> {
    BACKEND.with(|slot| slot.borrow().clone())
}

/// Remove the installed backend. Subsequent string-addressed accesses fail
/// with [`AccessError::NoHost`].
pub fn clear() {
    BACKEND.with(|slot| *slot.borrow_mut() = None);
}
