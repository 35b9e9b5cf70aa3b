#![forbid(unsafe_code)]

//! Weak-reference multicast events with metadata merging.
//!
//! An [`Event`] is a named callback slot with set semantics over its
//! handlers. Handlers are held weakly: the subscriber's own `Rc` is the
//! lifetime anchor, so dropping it unsubscribes without any explicit
//! teardown — the Rust rendition of weak bound-method references. Free
//! functions are held by value and compared by function address.
//!
//! # Invariants
//!
//! 1. Subscribing a handler that is already present (same `Rc`, or same
//!    function address) is a no-op; one firing invokes it exactly once.
//! 2. A firing never fails because a handler's referent died: dead slots
//!    are skipped and pruned after the dispatch loop, and dispatch
//!    continues to the remaining handlers.
//! 3. Each invocation receives [`EventArgs`] merging the event's fixed
//!    metadata, the event's own name (the self-reference), and fire-time
//!    arguments — fire-time keys win on collision.
//! 4. Handlers may subscribe or unsubscribe reentrantly during a firing;
//!    the firing dispatches to the snapshot taken when it started.
//!
//! [`DeferredEvent`] keeps the same subscription surface but schedules each
//! handler invocation on an [`IdleQueue`] instead of dispatching inline.
//! Liveness is checked at execution time, not scheduling time.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use std::cell::RefCell;

use tether_core::schedule::IdleQueue;
use tether_core::value::Value;

/// A shared handler closure. The subscriber keeps the `Rc`; the event holds
/// only a `Weak`.
pub type Handler = Rc<dyn Fn(&EventArgs)>;

/// Everything a handler invocation receives.
#[derive(Debug, Clone)]
pub struct EventArgs {
    /// Name of the firing event (the self-reference).
    pub event: String,
    /// Positional fire-time arguments.
    pub positional: Vec<Value>,
    /// Construction metadata merged with fire-time keyword arguments;
    /// fire-time keys win.
    pub data: BTreeMap<String, Value>,
}

impl EventArgs {
    /// Look up a merged data key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

#[derive(Clone)]
enum HandlerSlot {
    /// Weakly held closure; dies with the subscriber's `Rc`.
    Shared(Weak<dyn Fn(&EventArgs)>),
    /// Free function, held by value; never dies.
    Free(fn(&EventArgs)),
}

impl HandlerSlot {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Shared(a), Self::Shared(b)) => Weak::ptr_eq(a, b),
            (Self::Free(a), Self::Free(b)) => std::ptr::fn_addr_eq(*a, *b),
            _ => false,
        }
    }

    fn is_dead(&self) -> bool {
        match self {
            Self::Shared(weak) => weak.strong_count() == 0,
            Self::Free(_) => false,
        }
    }

    /// Invoke if the referent is alive. Returns `false` for a dead slot.
    fn invoke(&self, args: &EventArgs) -> bool {
        match self {
            Self::Shared(weak) => match weak.upgrade() {
                Some(handler) => {
                    handler(args);
                    true
                }
                None => false,
            },
            Self::Free(f) => {
                f(args);
                true
            }
        }
    }
}

struct EventInner {
    name: String,
    metadata: RefCell<BTreeMap<String, Value>>,
    slots: RefCell<Vec<HandlerSlot>>,
}

impl EventInner {
    fn new(name: String) -> Self {
        Self {
            name,
            metadata: RefCell::new(BTreeMap::new()),
            slots: RefCell::new(Vec::new()),
        }
    }

    fn add(&self, slot: HandlerSlot) {
        let mut slots = self.slots.borrow_mut();
        if slots.iter().any(|existing| existing.same(&slot)) {
            return;
        }
        slots.push(slot);
    }

    fn remove(&self, slot: &HandlerSlot) {
        self.slots.borrow_mut().retain(|existing| !existing.same(slot));
    }

    fn snapshot(&self) -> Vec<HandlerSlot> {
        self.slots.borrow().clone()
    }

    fn prune_dead(&self) {
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|slot| !slot.is_dead());
        let dropped = before - slots.len();
        if dropped > 0 {
            tracing::trace!(event = %self.name, dropped, "pruned dead handlers");
        }
    }

    fn merged_args(&self, positional: &[Value], kwargs: &[(&str, Value)]) -> EventArgs {
        let mut data = self.metadata.borrow().clone();
        for (key, value) in kwargs {
            data.insert((*key).to_owned(), value.clone());
        }
        EventArgs {
            event: self.name.clone(),
            positional: positional.to_vec(),
            data,
        }
    }

    fn live_count(&self) -> usize {
        self.slots.borrow().iter().filter(|s| !s.is_dead()).count()
    }
}

/// A synchronous multicast event.
///
/// Cloning yields another handle to the same handler set.
#[derive(Clone)]
pub struct Event {
    inner: Rc<EventInner>,
}

impl Event {
    /// A new event named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(EventInner::new(name.into())),
        }
    }

    /// Builder: attach a metadata entry merged into every firing.
    #[must_use]
    pub fn with_data(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_data(key, value);
        self
    }

    /// Attach or replace a metadata entry.
    pub fn set_data(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .metadata
            .borrow_mut()
            .insert(key.into(), value.into());
    }

    /// The event's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Subscribe a shared handler. Idempotent per `Rc` identity.
    pub fn subscribe(&self, handler: &Handler) {
        self.inner.add(HandlerSlot::Shared(Rc::downgrade(handler)));
    }

    /// Subscribe a free function. Idempotent per function address.
    pub fn subscribe_fn(&self, f: fn(&EventArgs)) {
        self.inner.add(HandlerSlot::Free(f));
    }

    /// Remove a shared handler, if present.
    pub fn unsubscribe(&self, handler: &Handler) {
        self.inner.remove(&HandlerSlot::Shared(Rc::downgrade(handler)));
    }

    /// Remove a free-function handler, if present.
    pub fn unsubscribe_fn(&self, f: fn(&EventArgs)) {
        self.inner.remove(&HandlerSlot::Free(f));
    }

    /// Number of currently live handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.live_count()
    }

    /// Fire the event synchronously.
    ///
    /// Dispatches to the handler set as of this call. Dead handlers are
    /// skipped and pruned; one dead handler never aborts the firing.
    pub fn fire(&self, positional: &[Value], kwargs: &[(&str, Value)]) {
        let args = self.inner.merged_args(positional, kwargs);
        let snapshot = self.inner.snapshot();
        let mut saw_dead = false;
        for slot in &snapshot {
            if !slot.invoke(&args) {
                saw_dead = true;
            }
        }
        if saw_dead {
            self.inner.prune_dead();
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.inner.name)
            .field("handlers", &self.inner.slots.borrow().len())
            .finish()
    }
}

/// A multicast event whose handlers run at the next idle tick.
///
/// `fire` snapshots the handler set and enqueues one task per handler on
/// the idle queue; nothing runs until the queue is pumped. A handler whose
/// referent dies between fire and pump is skipped without error at
/// execution time and pruned then.
#[derive(Clone)]
pub struct DeferredEvent {
    inner: Rc<EventInner>,
    queue: IdleQueue,
}

impl DeferredEvent {
    /// A new deferred event dispatching through `queue`.
    pub fn new(name: impl Into<String>, queue: &IdleQueue) -> Self {
        Self {
            inner: Rc::new(EventInner::new(name.into())),
            queue: queue.clone(),
        }
    }

    /// Attach or replace a metadata entry.
    pub fn set_data(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .metadata
            .borrow_mut()
            .insert(key.into(), value.into());
    }

    /// The event's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Subscribe a shared handler. Idempotent per `Rc` identity.
    pub fn subscribe(&self, handler: &Handler) {
        self.inner.add(HandlerSlot::Shared(Rc::downgrade(handler)));
    }

    /// Subscribe a free function. Idempotent per function address.
    pub fn subscribe_fn(&self, f: fn(&EventArgs)) {
        self.inner.add(HandlerSlot::Free(f));
    }

    /// Remove a shared handler, if present.
    pub fn unsubscribe(&self, handler: &Handler) {
        self.inner.remove(&HandlerSlot::Shared(Rc::downgrade(handler)));
    }

    /// Number of currently live handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.live_count()
    }

    /// Fire: schedule one deferred invocation per currently subscribed
    /// handler, in subscription order.
    pub fn fire(&self, positional: &[Value], kwargs: &[(&str, Value)]) {
        let args = Rc::new(self.inner.merged_args(positional, kwargs));
        for slot in self.inner.snapshot() {
            let inner = Rc::clone(&self.inner);
            let args = Rc::clone(&args);
            self.queue.defer(move || {
                // Liveness is decided here, at execution time.
                if !slot.invoke(&args) {
                    inner.prune_dead();
                }
            });
        }
    }
}

impl fmt::Debug for DeferredEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredEvent")
            .field("name", &self.inner.name)
            .field("handlers", &self.inner.slots.borrow().len())
            .finish()
    }
}
