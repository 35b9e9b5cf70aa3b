#![forbid(unsafe_code)]

//! Dynamic value model.
//!
//! Accessors pull and push [`Value`]s so that the two endpoints of a binding
//! never need to agree on a concrete Rust type. The model is deliberately
//! small: the scalar kinds a host property can take, plus a list kind for
//! collection contents.
//!
//! # Invariants
//!
//! 1. `Value::Nil` is the sentinel "empty" pull result in production
//!    posture; it is falsy and equal only to itself.
//! 2. Equality is value equality (`PartialEq`), which is what two-way
//!    bindings compare caches with.
//! 3. [`Value::total_cmp`] is a total order over all values, including
//!    cross-kind comparisons, so collection sorting never panics.

use std::cmp::Ordering;
use std::fmt;

/// A dynamically typed value crossing a binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent / empty. The production-posture sentinel for a failed pull.
    #[default]
    Nil,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String.
    Str(String),
    /// Ordered list, duplicates allowed.
    List(Vec<Value>),
}

impl Value {
    /// Whether this is [`Value::Nil`].
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Truthiness: `Nil`, `false`, `0`, `0.0`, `""` and `[]` are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
        }
    }

    /// The integer payload, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The string payload, if this is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The list payload, if this is a `List`.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Kind name for diagnostics and error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Self::Nil => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Str(_) => 3,
            Self::List(_) => 4,
        }
    }

    /// Total order over values: nil < bool < numeric < str < list.
    ///
    /// `Int` and `Float` compare numerically against each other, exactly:
    /// the integer is never rounded through `f64`, so transitivity holds at
    /// the extremes of the `i64` range. Same-kind floats use
    /// [`f64::total_cmp`], so `NaN` and `-0.0` have defined positions
    /// instead of poisoning a sort.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        let rank = self.kind_rank().cmp(&other.kind_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Self::Nil, Self::Nil) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Int(a), Self::Float(b)) => cmp_int_float(*a, *b),
            (Self::Float(a), Self::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            // Ranks matched above, so only same-kind (or numeric) pairs remain.
            _ => unreachable!("kind ranks matched but payloads did not"),
        }
    }
}

/// Exact comparison of an `i64` against an `f64`.
///
/// Casting the integer to `f64` rounds above 2^53 and makes distinct
/// integers compare equal to the same float, which breaks transitivity.
/// Instead the float is split into whole and fractional parts and the whole
/// part is compared as an integer. `NaN` sorts to the extremes matching
/// [`f64::total_cmp`] (negative `NaN` below everything, positive above),
/// and `-0.0` sorts just below integer zero for the same reason.
fn cmp_int_float(a: i64, b: f64) -> Ordering {
    if b.is_nan() {
        return if b.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    // 2^63 is exactly representable; every i64 is strictly below it and
    // i64::MIN is exactly -2^63.
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if b >= TWO_POW_63 {
        return Ordering::Less;
    }
    if b < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let trunc = b.trunc();
    // Integer-valued and within [-2^63, 2^63), so the cast is exact.
    let whole = trunc as i64;
    match a.cmp(&whole) {
        Ordering::Equal => {
            let frac = b - trunc;
            if frac > 0.0 {
                Ordering::Less
            } else if frac < 0.0 {
                Ordering::Greater
            } else if a == 0 && b.is_sign_negative() {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        ord => ord,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}
