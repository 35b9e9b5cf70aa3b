#![forbid(unsafe_code)]

//! Tether: a data-binding and event-propagation engine.
//!
//! The engine keeps arbitrary "source" values synchronized with arbitrary
//! "target" values without either endpoint knowing the other's concrete
//! type:
//!
//! - [`accessor`]: a uniform pull/push facade over six backing-store kinds
//!   (attribute objects, mappings, callables, host objects, reified host
//!   properties, bare host addresses).
//! - [`factory`]: ordered first-match-wins resolution from a
//!   `(target, field)` pair to the right accessor; extensible by
//!   prepending rules.
//! - [`event`]: weak-reference multicast events with metadata merging and
//!   an idle-queue deferred variant.
//! - [`binding`]: one-way and two-way synchronization edges with an
//!   optional translator; two-way edges tie-break by change detection with
//!   source precedence on conflicts.
//! - [`context`]: hierarchical scopes that collect bindings created while
//!   active, bulk-update them, and prune the ones that fail.
//! - [`collection`]: observable sequences and predicate-filtered views,
//!   bindable as sources and wired to refresh their context on mutation.
//!
//! # Execution model
//!
//! Single-threaded and cooperative, matching a GUI event loop: everything
//! shares via `Rc`/`RefCell`, weak references make endpoint death
//! observable instead of fatal, and the only concurrency-adjacent notion is
//! the [`tether_core::IdleQueue`] pumped by the host's idle hook.
//!
//! # Failure posture
//!
//! Two thread-local toggles in [`tether_core::debug`] pick between failing
//! loudly (interactive development) and degrading a broken binding to a
//! pruneable `false` (a live session). See [`tether_core::error`] for the
//! taxonomy.

pub mod accessor;
pub mod binding;
pub mod collection;
pub mod context;
pub mod event;
pub mod factory;

pub use accessor::{
    Accessor, AttributeAccessor, Callable, CallableAccessor, ExternalAccessor, Fields, HostHandle,
    HostObjectAccessor, HostProperty, Mapping, MappingAccessor, PropertyAccessor, Record, Target,
};
pub use binding::{
    Binding, Site, Translator, TwoWayBinding, bind_one_way, bind_one_way_with, bind_two_way,
    bind_two_way_with,
};
pub use collection::{ObservableCollection, ViewCollection};
pub use context::{BindingContext, ContextScope};
pub use event::{DeferredEvent, Event, EventArgs, Handler};
pub use factory::{AccessorFactory, AccessorRule};

pub use tether_core::{AccessError, BindError, IdleQueue, Value};
