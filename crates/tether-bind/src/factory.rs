#![forbid(unsafe_code)]

//! Ordered-rule accessor resolution.
//!
//! The factory holds a list of [`AccessorRule`]s and resolves a
//! `(target, field)` pair to the first rule whose predicate matches —
//! list order is the contract, most specific first. Custom rules are
//! prepended ahead of the defaults so new backing-store kinds can be
//! supported without touching the core.
//!
//! Resolution failure is always an error ([`BindError::NoAccessor`]);
//! silently no-op-ing would hide a programming mistake rather than a
//! transient runtime condition.

use std::cell::RefCell;

use tether_core::error::BindError;

use crate::accessor::{
    Accessor, AttributeAccessor, CallableAccessor, ExternalAccessor, HostObjectAccessor,
    MappingAccessor, PropertyAccessor, Target,
};

/// One resolution rule: a named, side-effect-free predicate plus a
/// constructor.
#[derive(Clone, Copy)]
pub struct AccessorRule {
    /// Rule name, for diagnostics.
    pub name: &'static str,
    /// Whether this rule can access `field` on `target`. Must be
    /// side-effect free and must not require a mapping key to exist.
    pub matches: fn(&Target, &str) -> bool,
    /// Build the accessor. Returning `None` declines the pair after all,
    /// and resolution moves on to the next rule.
    pub build: fn(&Target, &str) -> Option<Box<dyn Accessor>>,
}

impl std::fmt::Debug for AccessorRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorRule").field("name", &self.name).finish()
    }
}

fn property_rule() -> AccessorRule {
    AccessorRule {
        name: "property",
        matches: |target, _| matches!(target, Target::Property(_)),
        build: |target, _| match target {
            Target::Property(p) => Some(Box::new(PropertyAccessor::new(p.clone()))),
            _ => None,
        },
    }
}

fn host_object_rule() -> AccessorRule {
    AccessorRule {
        name: "host-object",
        matches: |target, _| matches!(target, Target::HostObject(_)),
        build: |target, field| match target {
            Target::HostObject(h) => Some(Box::new(HostObjectAccessor::new(h.clone(), field))),
            _ => None,
        },
    }
}

fn attribute_rule() -> AccessorRule {
    AccessorRule {
        name: "attribute",
        matches: |target, field| match target {
            Target::Object(obj) => obj.has_field(field),
            _ => false,
        },
        build: |target, field| match target {
            Target::Object(obj) => Some(Box::new(AttributeAccessor::new(obj, field))),
            _ => None,
        },
    }
}

fn callable_rule() -> AccessorRule {
    AccessorRule {
        name: "callable",
        matches: |target, _| matches!(target, Target::Callable(_)),
        build: |target, field| match target {
            Target::Callable(c) => Some(Box::new(CallableAccessor::new(c, field))),
            _ => None,
        },
    }
}

fn mapping_rule() -> AccessorRule {
    AccessorRule {
        name: "mapping",
        // Any key matches: the first push creates it.
        matches: |target, _| matches!(target, Target::Mapping(_)),
        build: |target, field| match target {
            Target::Mapping(m) => Some(Box::new(MappingAccessor::new(m.clone(), field))),
            _ => None,
        },
    }
}

fn external_rule() -> AccessorRule {
    AccessorRule {
        name: "external",
        matches: |target, _| matches!(target, Target::External(_)),
        build: |target, field| match target {
            Target::External(addr) => Some(Box::new(ExternalAccessor::new(addr.clone(), field))),
            _ => None,
        },
    }
}

/// Ordered accessor resolution: first matching rule wins.
#[derive(Debug)]
pub struct AccessorFactory {
    rules: Vec<AccessorRule>,
}

impl AccessorFactory {
    /// A factory with no rules. Every resolution fails until rules are
    /// added.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The six default rules, most specific first: property → host-object →
    /// attribute → callable → mapping → external.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            rules: vec![
                property_rule(),
                host_object_rule(),
                attribute_rule(),
                callable_rule(),
                mapping_rule(),
                external_rule(),
            ],
        }
    }

    /// Insert `rule` ahead of every existing rule.
    pub fn prepend(&mut self, rule: AccessorRule) {
        self.rules.insert(0, rule);
    }

    /// Append `rule` after every existing rule.
    pub fn append(&mut self, rule: AccessorRule) {
        self.rules.push(rule);
    }

    /// Number of installed rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Resolve `(target, field)` to an accessor via the first matching rule.
    ///
    /// # Errors
    ///
    /// [`BindError::NoAccessor`] when no rule matches.
    pub fn resolve(&self, target: &Target, field: &str) -> Result<Box<dyn Accessor>, BindError> {
        for rule in &self.rules {
            if (rule.matches)(target, field) {
                if let Some(accessor) = (rule.build)(target, field) {
                    tracing::trace!(rule = rule.name, field, "accessor resolved");
                    return Ok(accessor);
                }
            }
        }
        tracing::debug!(kind = target.kind_name(), field, "no accessor rule matched");
        Err(BindError::NoAccessor {
            field: field.to_owned(),
            target_kind: target.kind_name(),
        })
    }
}

impl Default for AccessorFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

thread_local! {
    static SHARED: RefCell<AccessorFactory> = RefCell::new(AccessorFactory::with_defaults());
}

/// Run `f` against the thread's shared factory, which the binding builders
/// resolve through. Prepending rules here extends expression-level binding
/// construction.
pub fn with_shared<R>(f: impl FnOnce(&mut AccessorFactory) -> R) -> R {
    SHARED.with(|factory| f(&mut factory.borrow_mut()))
}

/// Restore the shared factory to the default rule set.
pub fn reset_shared() {
    SHARED.with(|factory| *factory.borrow_mut() = AccessorFactory::with_defaults());
}
