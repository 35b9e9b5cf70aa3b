#![forbid(unsafe_code)]

//! One-way and two-way bindings between accessors.
//!
//! A [`Binding`] is a directed edge: pull from the getter, run the value
//! through the translator, push into the setter. A [`TwoWayBinding`]
//! remembers the last observed value on both ends and decides direction per
//! invocation.
//!
//! # States
//!
//! A binding is **valid** while both accessors are present and live, and
//! **invalid** once either dies or [`Binding::invalidate`] runs — terminal,
//! there is no way back. Invoking an invalid binding reports `false` with
//! no side effect and no error, in any posture.
//!
//! # Failure posture
//!
//! [`Binding::invoke`] returns `Ok(false)` on any pull/push failure; the
//! error variant is reachable only under `break_on_bind_failure`, so
//! production callers treat `Ok(false)` as "prune me" and debug callers get
//! `?` propagation.
//!
//! # Two-way tie-break
//!
//! On each invocation both ends are pulled and compared, by value equality,
//! against the caches:
//!
//! | source changed | target changed | action |
//! |---|---|---|
//! | yes | no  | push source→target |
//! | no  | yes | push target→source |
//! | no  | no  | push target→source |
//! | yes | yes | push source→target (source wins the conflict) |
//!
//! Source precedence on the both-changed row is deliberate and preserved.
//! The no-change row also pushes target→source, matching the written
//! behavior of the system this engine reimplements (its prose claimed
//! "getter wins" there; the code did not — we keep the code's behavior).
//! After a successful push both caches take the winning value. The
//! translator is applied on source→target crossings only; target→source
//! pushes the raw value, so two-way translators should be identity or an
//! involution.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tether_core::debug;
use tether_core::error::BindError;
use tether_core::value::Value;

use crate::accessor::{Accessor, Target};
use crate::context;
use crate::factory;

/// Pure value transform applied while a value crosses a binding.
pub type Translator = Rc<dyn Fn(Value) -> Value>;

enum Kind {
    OneWay,
    TwoWay {
        last_source: Value,
        last_target: Value,
    },
}

struct BindingInner {
    getter: Option<Box<dyn Accessor>>,
    setter: Option<Box<dyn Accessor>>,
    translator: Option<Translator>,
    kind: Kind,
}

impl BindingInner {
    fn is_valid(&self) -> bool {
        match (&self.getter, &self.setter) {
            (Some(getter), Some(setter)) => getter.is_live() && setter.is_live(),
            _ => false,
        }
    }

    fn step(&mut self) -> Result<bool, BindError> {
        if !self.is_valid() {
            return Ok(false);
        }
        // is_valid checked both slots.
        let getter = self.getter.as_ref().ok_or(BindError::Invalid)?;
        let setter = self.setter.as_ref().ok_or(BindError::Invalid)?;

        match &mut self.kind {
            Kind::OneWay => {
                let value = getter.pull()?;
                let ok = setter.push(self.translator.as_ref().map_or_else(
                    || value.clone(),
                    |t| t(value.clone()),
                ))?;
                Ok(ok)
            }
            Kind::TwoWay {
                last_source,
                last_target,
            } => {
                let source = getter.pull()?;
                let target = setter.pull()?;
                let source_changed = source != *last_source;
                let target_changed = target != *last_target;

                if source_changed {
                    // Source changed, alone or in conflict: source wins.
                    let pushed = match &self.translator {
                        Some(t) => t(source.clone()),
                        None => source.clone(),
                    };
                    let ok = setter.push(pushed.clone())?;
                    if ok {
                        *last_source = source;
                        *last_target = pushed;
                    }
                    Ok(ok)
                } else {
                    // Target changed, or nothing did: target re-syncs the
                    // source, raw value.
                    let ok = getter.push(target.clone())?;
                    if ok {
                        *last_source = target.clone();
                        *last_target = target;
                    }
                    Ok(ok)
                }
            }
        }
    }
}

/// A synchronization edge between two accessors. Cloning yields another
/// handle to the same edge; the owning context holds one.
#[derive(Clone)]
pub struct Binding {
    inner: Rc<RefCell<BindingInner>>,
}

impl Binding {
    /// A one-way binding, registered into the active context.
    #[must_use]
    pub fn new(getter: Box<dyn Accessor>, setter: Box<dyn Accessor>) -> Self {
        Self::construct(getter, setter, None, false)
    }

    /// A one-way binding with a translator.
    #[must_use]
    pub fn with_translator(
        getter: Box<dyn Accessor>,
        setter: Box<dyn Accessor>,
        translator: impl Fn(Value) -> Value + 'static,
    ) -> Self {
        Self::construct(getter, setter, Some(Rc::new(translator)), false)
    }

    fn construct(
        getter: Box<dyn Accessor>,
        setter: Box<dyn Accessor>,
        translator: Option<Translator>,
        two_way: bool,
    ) -> Self {
        let kind = if two_way {
            // Seed caches with one raw read per side; a side that cannot be
            // read seeds as Nil. Construction is not an invocation, so the
            // failure posture does not apply here.
            Kind::TwoWay {
                last_source: getter.read().unwrap_or(Value::Nil),
                last_target: setter.read().unwrap_or(Value::Nil),
            }
        } else {
            Kind::OneWay
        };
        let binding = Self {
            inner: Rc::new(RefCell::new(BindingInner {
                getter: Some(getter),
                setter: Some(setter),
                translator,
                kind,
            })),
        };
        context::register(&binding);
        binding
    }

    /// Whether both accessors are present and live.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.borrow().is_valid()
    }

    /// Drop both accessors. Terminal: the binding reports `false` forever.
    pub fn invalidate(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.getter = None;
        inner.setter = None;
    }

    /// Pull, translate, push.
    ///
    /// Returns `Ok(true)` on success and `Ok(false)` when the binding is
    /// invalid or a step failed.
    ///
    /// # Errors
    ///
    /// Only under `break_on_bind_failure`; production posture never sees
    /// `Err`.
    pub fn invoke(&self) -> Result<bool, BindError> {
        let outcome = self.inner.borrow_mut().step();
        match outcome {
            Ok(ok) => Ok(ok),
            Err(e) if debug::break_on_bind_failure() => Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "binding invocation failed");
                Ok(false)
            }
        }
    }

    /// Identity comparison for handles to the same edge.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// A binding that synchronizes in both directions, with change-detection
/// tie-breaking (see the module docs for the table).
#[derive(Clone)]
pub struct TwoWayBinding {
    edge: Binding,
}

impl TwoWayBinding {
    /// A two-way binding between `a` (source side) and `b` (target side),
    /// caching one value per side at construction.
    #[must_use]
    pub fn new(a: Box<dyn Accessor>, b: Box<dyn Accessor>) -> Self {
        Self {
            edge: Binding::construct(a, b, None, true),
        }
    }

    /// A two-way binding with a translator applied on source→target
    /// crossings.
    #[must_use]
    pub fn with_translator(
        a: Box<dyn Accessor>,
        b: Box<dyn Accessor>,
        translator: impl Fn(Value) -> Value + 'static,
    ) -> Self {
        Self {
            edge: Binding::construct(a, b, Some(Rc::new(translator)), true),
        }
    }

    /// Whether both accessors are present and live.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.edge.is_valid()
    }

    /// Drop both accessors. Terminal.
    pub fn invalidate(&self) {
        self.edge.invalidate();
    }

    /// Run one tie-break round. Same contract as [`Binding::invoke`].
    ///
    /// # Errors
    ///
    /// Only under `break_on_bind_failure`.
    pub fn invoke(&self) -> Result<bool, BindError> {
        self.edge.invoke()
    }

    /// The underlying edge handle (what the owning context stores).
    #[must_use]
    pub fn handle(&self) -> Binding {
        self.edge.clone()
    }
}

impl fmt::Debug for TwoWayBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoWayBinding")
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// One bindable endpoint for the builder functions: a target plus a field
/// name resolvable through the shared accessor factory.
#[derive(Debug, Clone)]
pub struct Site {
    /// The value being bound.
    pub target: Target,
    /// The named location on it.
    pub field: String,
}

impl Site {
    /// A site addressing `field` on `target`.
    pub fn new(target: Target, field: impl Into<String>) -> Self {
        Self {
            target,
            field: field.into(),
        }
    }
}

fn resolve(site: &Site) -> Result<Box<dyn Accessor>, BindError> {
    factory::with_shared(|f| f.resolve(&site.target, &site.field))
}

/// Build a one-way binding from `source` to `target`.
///
/// # Errors
///
/// [`BindError::NoAccessor`] when either site fails resolution.
pub fn bind_one_way(source: &Site, target: &Site) -> Result<Binding, BindError> {
    Ok(Binding::new(resolve(source)?, resolve(target)?))
}

/// Build a one-way binding with a translator.
///
/// # Errors
///
/// [`BindError::NoAccessor`] when either site fails resolution.
pub fn bind_one_way_with(
    source: &Site,
    target: &Site,
    translator: impl Fn(Value) -> Value + 'static,
) -> Result<Binding, BindError> {
    Ok(Binding::with_translator(
        resolve(source)?,
        resolve(target)?,
        translator,
    ))
}

/// Build a two-way binding between `a` and `b`.
///
/// # Errors
///
/// [`BindError::NoAccessor`] when either site fails resolution.
pub fn bind_two_way(a: &Site, b: &Site) -> Result<TwoWayBinding, BindError> {
    Ok(TwoWayBinding::new(resolve(a)?, resolve(b)?))
}

/// Build a two-way binding with a translator (source→target crossings
/// only).
///
/// # Errors
///
/// [`BindError::NoAccessor`] when either site fails resolution.
pub fn bind_two_way_with(
    a: &Site,
    b: &Site,
    translator: impl Fn(Value) -> Value + 'static,
) -> Result<TwoWayBinding, BindError> {
    Ok(TwoWayBinding::with_translator(
        resolve(a)?,
        resolve(b)?,
        translator,
    ))
}
