#![forbid(unsafe_code)]

//! Hierarchical binding contexts.
//!
//! A [`BindingContext`] owns every binding created while it is active and
//! can bulk-update them, pruning the ones that fail. Contexts form a tree:
//! a context constructed while another is active becomes its child, so
//! nesting order determines the hierarchy — not manual registration.
//!
//! The "active context" is a thread-local stack with strict LIFO
//! discipline. [`BindingContext::enter`] pushes and returns a
//! [`ContextScope`] guard; dropping the guard pops, restoring the parent
//! even when unwinding out of a panic. There is no way to leave the stack
//! pointing at an exited scope.
//!
//! # Update and pruning
//!
//! [`BindingContext::update`] invokes every owned binding in insertion
//! order. A binding that reports `false` failed — dead endpoint, rejected
//! push — and is removed: it fails once and is pruned, never retried. This
//! is the lazy garbage collection that lets dropped UI state disappear from
//! the dispatch set without explicit teardown.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tether_core::error::BindError;

use crate::binding::Binding;

struct ContextInner {
    bindings: RefCell<Vec<Binding>>,
    children: RefCell<Vec<BindingContext>>,
    auto_update: bool,
    updating: Cell<bool>,
}

/// A scope that collects bindings and supports bulk update/pruning.
/// Cloning yields another handle to the same scope.
#[derive(Clone)]
pub struct BindingContext {
    inner: Rc<ContextInner>,
}

thread_local! {
    static ACTIVE: RefCell<Vec<BindingContext>> = const { RefCell::new(Vec::new()) };
}

/// Add `binding` to the context currently active on this thread.
///
/// No-op when no context is active: such bindings are untracked and must be
/// invoked manually.
pub fn register(binding: &Binding) {
    if let Some(top) = BindingContext::active() {
        top.inner.bindings.borrow_mut().push(binding.clone());
    }
}

impl BindingContext {
    /// A new context. When another context is active it becomes this one's
    /// parent; otherwise this is a root.
    ///
    /// `auto_update` makes every scope exit run one non-recursive update.
    #[must_use]
    pub fn new(auto_update: bool) -> Self {
        let ctx = Self {
            inner: Rc::new(ContextInner {
                bindings: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                auto_update,
                updating: Cell::new(false),
            }),
        };
        if let Some(parent) = Self::active() {
            parent.inner.children.borrow_mut().push(ctx.clone());
        }
        ctx
    }

    /// The context currently on top of this thread's active stack.
    #[must_use]
    pub fn active() -> Option<Self> {
        ACTIVE.with(|stack| stack.borrow().last().cloned())
    }

    /// Push this context onto the active stack. The returned guard pops it
    /// on drop (LIFO, panic-safe) and, when `auto_update` was set, runs one
    /// non-recursive update on exit.
    #[must_use]
    pub fn enter(&self) -> ContextScope {
        ACTIVE.with(|stack| stack.borrow_mut().push(self.clone()));
        tracing::trace!("binding context entered");
        ContextScope { ctx: self.clone() }
    }

    /// Invoke every owned binding, pruning those that report `false`.
    ///
    /// Returns the number of live bindings, including descendants when
    /// `recursive`. A reentrant call on a context already mid-update is a
    /// no-op returning the current count (this is what keeps a collection
    /// mutation performed by a binding from recursing).
    ///
    /// # Errors
    ///
    /// Only under `break_on_bind_failure`, where the first failing
    /// invocation propagates.
    pub fn update(&self, recursive: bool) -> Result<usize, BindError> {
        if self.inner.updating.get() {
            return Ok(self.binding_count());
        }
        self.inner.updating.set(true);
        let _latch = UpdateLatch(&self.inner.updating);

        let snapshot: Vec<Binding> = self.inner.bindings.borrow().clone();
        let mut failed: Vec<Binding> = Vec::new();
        for binding in &snapshot {
            if !binding.invoke()? {
                failed.push(binding.clone());
            }
        }
        if !failed.is_empty() {
            tracing::debug!(pruned = failed.len(), "pruning failed bindings");
            self.inner
                .bindings
                .borrow_mut()
                .retain(|b| !failed.iter().any(|f| Binding::ptr_eq(f, b)));
        }

        let mut live = self.inner.bindings.borrow().len();
        if recursive {
            let children: Vec<BindingContext> = self.inner.children.borrow().clone();
            for child in children {
                live += child.update(true)?;
            }
        }
        Ok(live)
    }

    /// Number of owned bindings (this context only).
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    /// Number of direct child contexts.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Whether this context owns no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.bindings.borrow().is_empty()
    }

    /// Identity comparison for handles to the same scope.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("bindings", &self.binding_count())
            .field("children", &self.child_count())
            .field("auto_update", &self.inner.auto_update)
            .finish()
    }
}

/// Clears the updating latch even if a binding invocation panics.
struct UpdateLatch<'a>(&'a Cell<bool>);

impl Drop for UpdateLatch<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// RAII guard for an entered context. Dropping restores the previously
/// active context.
#[must_use = "dropping the scope immediately exits the context"]
pub struct ContextScope {
    ctx: BindingContext,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let popped = ACTIVE.with(|stack| stack.borrow_mut().pop());
        debug_assert!(
            popped
                .as_ref()
                .is_some_and(|top| BindingContext::ptr_eq(top, &self.ctx)),
            "context scopes must exit in LIFO order"
        );
        tracing::trace!("binding context exited");
        if self.ctx.inner.auto_update {
            if let Err(e) = self.ctx.update(false) {
                // Reachable only under break_on_bind_failure; a Drop has
                // nowhere to propagate it.
                tracing::warn!(error = %e, "auto-update on context exit failed");
            }
        }
    }
}

impl fmt::Debug for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope").finish()
    }
}
