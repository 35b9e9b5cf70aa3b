#![forbid(unsafe_code)]

//! The accessor family: a uniform get/set facade over heterogeneous
//! backing stores.
//!
//! An [`Accessor`] reads and writes one named location on one [`Target`].
//! Targets come in six kinds, each with its own reference discipline:
//!
//! | kind | backing store | held |
//! |------|---------------|------|
//! | [`Target::Property`] | externally addressed named-property object | strong |
//! | [`Target::HostObject`] | host object with named properties | by value |
//! | [`Target::Object`] | attribute-style object ([`Fields`]) | weak |
//! | [`Target::Callable`] | bound-method-style endpoint | weak |
//! | [`Target::Mapping`] | string-keyed map | strong |
//! | [`Target::External`] | bare host address string | plain string |
//!
//! Weakly held targets make an accessor's liveness observable: a dead
//! target turns `is_live` false and every access into
//! [`AccessError::DeadTarget`], which the binding layer converts into a
//! clean `false` instead of a crash inside a dispatch loop.
//!
//! # Failure posture
//!
//! The provided [`Accessor::pull`] / [`Accessor::push`] wrap the required
//! `read` / `write` with the process posture from [`tether_core::debug`]:
//! in production posture a failed pull degrades to [`Value::Nil`] and a
//! failed push reports `false`; under `break_on_access_failure` the
//! underlying error propagates.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tether_core::debug;
use tether_core::error::AccessError;
use tether_core::host::{self, HostBackend};
use tether_core::value::Value;

/// Attribute-style access to named fields on an object.
///
/// Host widget wrappers implement this to become bindable; [`Record`] is a
/// ready-made implementation for ad-hoc objects.
pub trait Fields {
    /// Read the named field.
    fn get_field(&self, field: &str) -> Result<Value, AccessError>;
    /// Write the named field.
    fn set_field(&self, field: &str, value: Value) -> Result<(), AccessError>;
    /// Whether the field currently exists. Must be side-effect free.
    fn has_field(&self, field: &str) -> bool;
}

/// A bound-method-style endpoint: pull calls with no argument, push calls
/// with the pushed value.
pub trait Callable {
    /// Invoke the callable. `None` means "read", `Some(v)` means "write v".
    fn call(&self, arg: Option<Value>) -> Result<Value, AccessError>;
}

/// An externally addressed named property, reified as an object.
///
/// Held strongly by its accessor: the property object is a standalone
/// handle, unreachable from anywhere else once the accessor exists.
pub struct HostProperty {
    backend: Rc<dyn HostBackend>,
    address: String,
    prop: String,
}

impl HostProperty {
    /// A property handle for `address.prop` served by `backend`.
    pub fn new(
        backend: Rc<dyn HostBackend>,
        address: impl Into<String>,
        prop: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            address: address.into(),
            prop: prop.into(),
        }
    }

    /// The host address this property belongs to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The property name.
    #[must_use]
    pub fn prop(&self) -> &str {
        &self.prop
    }
}

impl fmt::Debug for HostProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostProperty({}.{})", self.address, self.prop)
    }
}

/// A handle to a host object whose named properties are read and written
/// through its backend.
#[derive(Clone)]
pub struct HostHandle {
    backend: Rc<dyn HostBackend>,
    address: String,
}

impl HostHandle {
    /// A handle to the host object at `address`.
    pub fn new(backend: Rc<dyn HostBackend>, address: impl Into<String>) -> Self {
        Self {
            backend,
            address: address.into(),
        }
    }

    /// The host address of this object.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostHandle({})", self.address)
    }
}

/// A string-keyed mapping target.
pub type Mapping = Rc<RefCell<BTreeMap<String, Value>>>;

/// One bindable endpoint, tagged by backing-store kind.
#[derive(Clone)]
pub enum Target {
    /// Externally addressed named-property object.
    Property(Rc<HostProperty>),
    /// Host object with named properties.
    HostObject(HostHandle),
    /// Generic attribute-style object.
    Object(Rc<dyn Fields>),
    /// Callable/method endpoint.
    Callable(Rc<dyn Callable>),
    /// String-keyed mapping.
    Mapping(Mapping),
    /// Bare host address; the backend is looked up at access time.
    External(String),
}

impl Target {
    /// Kind name for diagnostics and resolution errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Property(_) => "property",
            Self::HostObject(_) => "host-object",
            Self::Object(_) => "object",
            Self::Callable(_) => "callable",
            Self::Mapping(_) => "mapping",
            Self::External(_) => "external",
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(p) => p.fmt(f),
            Self::HostObject(h) => h.fmt(f),
            Self::Object(_) => write!(f, "Object"),
            Self::Callable(_) => write!(f, "Callable"),
            Self::Mapping(m) => write!(f, "Mapping(len={})", m.borrow().len()),
            Self::External(addr) => write!(f, "External({addr})"),
        }
    }
}

/// Uniform get/set over one named location.
///
/// Implementations provide the raw `read`/`write`; callers use `pull`/`push`
/// which apply the process failure posture.
pub trait Accessor {
    /// Raw read of the location.
    fn read(&self) -> Result<Value, AccessError>;

    /// Raw write of the location.
    fn write(&self, value: Value) -> Result<(), AccessError>;

    /// Whether the target is still alive. Pull/push on a dead target fail
    /// predictably rather than crash the caller's dispatch loop.
    fn is_live(&self) -> bool;

    /// The field/key this accessor addresses.
    fn field(&self) -> &str;

    /// Posture-aware read: degrades to `Ok(Value::Nil)` unless
    /// `break_on_access_failure` is set.
    fn pull(&self) -> Result<Value, AccessError> {
        match self.read() {
            Ok(v) => Ok(v),
            Err(e) if debug::break_on_access_failure() => Err(e),
            Err(e) => {
                tracing::trace!(field = self.field(), error = %e, "pull degraded to nil");
                Ok(Value::Nil)
            }
        }
    }

    /// Posture-aware write: degrades to `Ok(false)` unless
    /// `break_on_access_failure` is set.
    fn push(&self, value: Value) -> Result<bool, AccessError> {
        match self.write(value) {
            Ok(()) => Ok(true),
            Err(e) if debug::break_on_access_failure() => Err(e),
            Err(e) => {
                tracing::trace!(field = self.field(), error = %e, "push failed");
                Ok(false)
            }
        }
    }
}

impl fmt::Debug for dyn Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Accessor({}, live={})", self.field(), self.is_live())
    }
}

/// Accessor over a reified external property. Strong reference.
pub struct PropertyAccessor {
    target: Rc<HostProperty>,
}

impl PropertyAccessor {
    /// Access the given property object.
    #[must_use]
    pub fn new(target: Rc<HostProperty>) -> Self {
        Self { target }
    }
}

impl Accessor for PropertyAccessor {
    fn read(&self) -> Result<Value, AccessError> {
        self.target.backend.query(&self.target.address, &self.target.prop)
    }

    fn write(&self, value: Value) -> Result<(), AccessError> {
        self.target
            .backend
            .apply(&self.target.address, &self.target.prop, value)
    }

    fn is_live(&self) -> bool {
        self.target.backend.exists(&self.target.address)
    }

    fn field(&self) -> &str {
        &self.target.prop
    }
}

/// Accessor over a named property of a host object.
pub struct HostObjectAccessor {
    target: HostHandle,
    field: String,
}

impl HostObjectAccessor {
    /// Access `field` on the host object behind `target`.
    pub fn new(target: HostHandle, field: impl Into<String>) -> Self {
        Self {
            target,
            field: field.into(),
        }
    }
}

impl Accessor for HostObjectAccessor {
    fn read(&self) -> Result<Value, AccessError> {
        self.target.backend.query(&self.target.address, &self.field)
    }

    fn write(&self, value: Value) -> Result<(), AccessError> {
        self.target.backend.apply(&self.target.address, &self.field, value)
    }

    fn is_live(&self) -> bool {
        self.target.backend.exists(&self.target.address)
    }

    fn field(&self) -> &str {
        &self.field
    }
}

/// Accessor over a generic attribute object. Weak reference: the accessor
/// never keeps its target alive.
pub struct AttributeAccessor {
    target: Weak<dyn Fields>,
    field: String,
}

impl AttributeAccessor {
    /// Access `field` on `target`, holding it weakly.
    pub fn new(target: &Rc<dyn Fields>, field: impl Into<String>) -> Self {
        Self {
            target: Rc::downgrade(target),
            field: field.into(),
        }
    }

    fn live_target(&self) -> Result<Rc<dyn Fields>, AccessError> {
        self.target.upgrade().ok_or(AccessError::DeadTarget)
    }
}

impl Accessor for AttributeAccessor {
    fn read(&self) -> Result<Value, AccessError> {
        self.live_target()?.get_field(&self.field)
    }

    fn write(&self, value: Value) -> Result<(), AccessError> {
        self.live_target()?.set_field(&self.field, value)
    }

    fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn field(&self) -> &str {
        &self.field
    }
}

/// Accessor over a callable endpoint. Weak reference; pull invokes with no
/// argument, push forwards the value.
pub struct CallableAccessor {
    target: Weak<dyn Callable>,
    field: String,
}

impl CallableAccessor {
    /// Access the callable, holding it weakly. `field` is diagnostic only.
    pub fn new(target: &Rc<dyn Callable>, field: impl Into<String>) -> Self {
        Self {
            target: Rc::downgrade(target),
            field: field.into(),
        }
    }
}

impl Accessor for CallableAccessor {
    fn read(&self) -> Result<Value, AccessError> {
        let target = self.target.upgrade().ok_or(AccessError::DeadTarget)?;
        target.call(None)
    }

    fn write(&self, value: Value) -> Result<(), AccessError> {
        let target = self.target.upgrade().ok_or(AccessError::DeadTarget)?;
        target.call(Some(value)).map(|_| ())
    }

    fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn field(&self) -> &str {
        &self.field
    }
}

/// Accessor over a mapping key. Strong reference: most mapping values are
/// shared containers with no independent owner to defer to.
pub struct MappingAccessor {
    target: Mapping,
    key: String,
}

impl MappingAccessor {
    /// Access `key` in `target`. The key need not exist yet; the first push
    /// creates it.
    pub fn new(target: Mapping, key: impl Into<String>) -> Self {
        Self {
            target,
            key: key.into(),
        }
    }
}

impl Accessor for MappingAccessor {
    fn read(&self) -> Result<Value, AccessError> {
        self.target
            .borrow()
            .get(&self.key)
            .cloned()
            .ok_or_else(|| AccessError::MissingKey {
                key: self.key.clone(),
            })
    }

    fn write(&self, value: Value) -> Result<(), AccessError> {
        self.target.borrow_mut().insert(self.key.clone(), value);
        Ok(())
    }

    fn is_live(&self) -> bool {
        true
    }

    fn field(&self) -> &str {
        &self.key
    }
}

/// Accessor over a bare host address. The target is a plain string, not a
/// reference: the "object" is an external named resource. The backend is
/// resolved at access time through [`tether_core::host::current`].
pub struct ExternalAccessor {
    address: String,
    field: String,
}

impl ExternalAccessor {
    /// Access `field` of the host object named `address`.
    pub fn new(address: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            field: field.into(),
        }
    }

    fn backend() -> Result<Rc<dyn HostBackend>, AccessError> {
        host::current().ok_or(AccessError::NoHost)
    }
}

impl Accessor for ExternalAccessor {
    fn read(&self) -> Result<Value, AccessError> {
        Self::backend()?.query(&self.address, &self.field)
    }

    fn write(&self, value: Value) -> Result<(), AccessError> {
        Self::backend()?.apply(&self.address, &self.field, value)
    }

    fn is_live(&self) -> bool {
        host::current().is_some_and(|backend| backend.exists(&self.address))
    }

    fn field(&self) -> &str {
        &self.field
    }
}

/// Ad-hoc attribute object: a fixed set of named fields over an interior
/// map.
///
/// Unlike a mapping target, a `Record` field must exist before it can be
/// read *or written*; the set of fields is fixed at construction. That is
/// what makes it attribute-like rather than dictionary-like.
#[derive(Default)]
pub struct Record {
    fields: RefCell<BTreeMap<String, Value>>,
}

impl Record {
    /// An empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: declare `field` with an initial value.
    #[must_use]
    pub fn with_field(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.borrow_mut().insert(field.into(), value.into());
        self
    }

    /// Finish building as an `Rc<dyn Fields>`, ready for [`Target::Object`].
    #[must_use]
    pub fn build(self) -> Rc<dyn Fields> {
        Rc::new(self)
    }
}

impl Fields for Record {
    fn get_field(&self, field: &str) -> Result<Value, AccessError> {
        self.fields
            .borrow()
            .get(field)
            .cloned()
            .ok_or_else(|| AccessError::MissingField {
                field: field.to_owned(),
            })
    }

    fn set_field(&self, field: &str, value: Value) -> Result<(), AccessError> {
        let mut fields = self.fields.borrow_mut();
        match fields.get_mut(field) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(AccessError::MissingField {
                field: field.to_owned(),
            }),
        }
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.borrow().contains_key(field)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("fields", &self.fields.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn record() -> Rc<dyn Fields> {
        Record::new().with_field("label", "hi").build()
    }

    #[test]
    fn attribute_round_trip() {
        let obj = record();
        let acc = AttributeAccessor::new(&obj, "label");
        assert!(acc.is_live());
        assert!(acc.push(Value::from("there")).expect("push should succeed"));
        assert_eq!(acc.pull().expect("pull should succeed"), Value::from("there"));
    }

    #[test]
    fn attribute_target_death_degrades() {
        let obj = record();
        let acc = AttributeAccessor::new(&obj, "label");
        drop(obj);

        assert!(!acc.is_live());
        assert_eq!(acc.pull().expect("lenient pull"), Value::Nil);
        assert!(!acc.push(Value::from(1)).expect("lenient push"));
    }

    #[test]
    fn attribute_target_death_raises_in_strict_posture() {
        let obj = record();
        let acc = AttributeAccessor::new(&obj, "label");
        drop(obj);

        let _strict = debug::StrictGuard::new();
        assert_eq!(acc.pull(), Err(AccessError::DeadTarget));
        assert_eq!(acc.push(Value::Nil), Err(AccessError::DeadTarget));
    }

    #[test]
    fn record_rejects_unknown_fields() {
        let obj = record();
        assert!(!obj.has_field("missing"));
        assert_eq!(
            obj.set_field("missing", Value::from(1)),
            Err(AccessError::MissingField {
                field: "missing".into()
            })
        );
    }

    #[test]
    fn mapping_key_created_on_first_push() {
        let map: Mapping = Rc::new(RefCell::new(BTreeMap::new()));
        let acc = MappingAccessor::new(Rc::clone(&map), "fresh");

        assert_eq!(acc.pull().expect("lenient pull of absent key"), Value::Nil);
        assert!(acc.push(Value::from(7)).expect("push creates key"));
        assert_eq!(acc.pull().expect("pull"), Value::from(7));
        assert_eq!(map.borrow().get("fresh"), Some(&Value::from(7)));
    }

    mod round_trip {
        use super::*;
        use proptest::prelude::*;

        fn arb_value() -> impl Strategy<Value = Value> {
            prop_oneof![
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::Int),
                "[ -~]{0,12}".prop_map(Value::from),
            ]
        }

        proptest! {
            #[test]
            fn mapping_push_then_pull(v in arb_value()) {
                let map: Mapping = Rc::new(RefCell::new(BTreeMap::new()));
                let acc = MappingAccessor::new(Rc::clone(&map), "k");
                prop_assert!(acc.push(v.clone()).expect("push"));
                prop_assert_eq!(acc.pull().expect("pull"), v);
            }

            #[test]
            fn attribute_push_then_pull(v in arb_value()) {
                let obj = Record::new().with_field("k", Value::Nil).build();
                let acc = AttributeAccessor::new(&obj, "k");
                prop_assert!(acc.push(v.clone()).expect("push"));
                prop_assert_eq!(acc.pull().expect("pull"), v);
            }
        }
    }

    struct Counter {
        value: Cell<i64>,
    }

    impl Callable for Counter {
        fn call(&self, arg: Option<Value>) -> Result<Value, AccessError> {
            if let Some(v) = arg {
                self.value.set(v.as_int().unwrap_or(0));
            }
            Ok(Value::from(self.value.get()))
        }
    }

    #[test]
    fn callable_pull_reads_and_push_forwards() {
        let counter: Rc<dyn Callable> = Rc::new(Counter { value: Cell::new(3) });
        let acc = CallableAccessor::new(&counter, "value");

        assert_eq!(acc.pull().expect("pull"), Value::from(3));
        assert!(acc.push(Value::from(9)).expect("push"));
        assert_eq!(acc.pull().expect("pull"), Value::from(9));

        drop(counter);
        assert!(!acc.is_live());
    }

    mod hosted {
        use super::*;
        use std::collections::BTreeMap;

        #[derive(Default)]
        pub struct FakeHost {
            pub props: RefCell<BTreeMap<(String, String), Value>>,
        }

        impl HostBackend for FakeHost {
            fn query(&self, address: &str, prop: &str) -> Result<Value, AccessError> {
                self.props
                    .borrow()
                    .get(&(address.to_owned(), prop.to_owned()))
                    .cloned()
                    .ok_or_else(|| AccessError::Host(format!("{address}.{prop} unknown")))
            }

            fn apply(&self, address: &str, prop: &str, value: Value) -> Result<(), AccessError> {
                self.props
                    .borrow_mut()
                    .insert((address.to_owned(), prop.to_owned()), value);
                Ok(())
            }

            fn exists(&self, address: &str) -> bool {
                self.props.borrow().keys().any(|(a, _)| a == address)
            }
        }

        #[test]
        fn property_accessor_round_trip() {
            let backend = Rc::new(FakeHost::default());
            backend
                .apply("slider1", "value", Value::from(0))
                .expect("seed");
            let prop = Rc::new(HostProperty::new(backend, "slider1", "value"));
            let acc = PropertyAccessor::new(prop);

            assert!(acc.is_live());
            assert!(acc.push(Value::from(42)).expect("push"));
            assert_eq!(acc.pull().expect("pull"), Value::from(42));
            assert_eq!(acc.field(), "value");
        }

        #[test]
        fn host_object_accessor_round_trip() {
            let backend = Rc::new(FakeHost::default());
            backend.apply("win", "title", Value::from("a")).expect("seed");
            let acc = HostObjectAccessor::new(HostHandle::new(backend, "win"), "title");

            assert!(acc.push(Value::from("b")).expect("push"));
            assert_eq!(acc.pull().expect("pull"), Value::from("b"));
        }

        #[test]
        fn external_accessor_uses_installed_backend() {
            let backend = Rc::new(FakeHost::default());
            backend.apply("field1", "text", Value::from("x")).expect("seed");
            host::install(backend);

            let acc = ExternalAccessor::new("field1", "text");
            assert!(acc.is_live());
            assert!(acc.push(Value::from("y")).expect("push"));
            assert_eq!(acc.pull().expect("pull"), Value::from("y"));

            host::clear();
            assert!(!acc.is_live());
            assert_eq!(acc.pull().expect("lenient pull"), Value::Nil);

            let _strict = debug::StrictGuard::new();
            assert_eq!(acc.pull(), Err(AccessError::NoHost));
        }
    }
}
