#![forbid(unsafe_code)]

//! Failure taxonomy.
//!
//! Three tiers, matching how failures propagate:
//!
//! - [`AccessError`]: an accessor's underlying get/set failed (missing
//!   field, dead target, absent host). Converted to a sentinel/no-op in
//!   production posture, raised under `break_on_access_failure`.
//! - [`BindError::Access`] and friends: a binding's pull/push step failed.
//!   Always caught at the binding; surfaced only under
//!   `break_on_bind_failure`.
//! - [`BindError::NoAccessor`]: resolution failure. Always an error —
//!   silently no-op-ing here would hide a programming mistake rather than a
//!   transient runtime condition.

use thiserror::Error;

/// Failure of an accessor's underlying read or write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The weakly held target has been dropped.
    #[error("target is no longer alive")]
    DeadTarget,

    /// An attribute-style target has no such field.
    #[error("no field `{field}` on target")]
    MissingField {
        /// The requested field name.
        field: String,
    },

    /// A mapping target has no such key (pull only; push creates the key).
    #[error("no key `{key}` in mapping")]
    MissingKey {
        /// The requested key.
        key: String,
    },

    /// The location can be read but not written.
    #[error("field `{field}` is not writable")]
    NotWritable {
        /// The field that rejected the write.
        field: String,
    },

    /// A string-addressed accessor was used with no host backend installed.
    #[error("no host backend installed")]
    NoHost,

    /// The host backend rejected the operation.
    #[error("host error: {0}")]
    Host(String),
}

/// Failure at the binding layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// An accessor failed while the binding was pulling or pushing.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The binding was invoked after invalidation.
    #[error("binding is invalid")]
    Invalid,

    /// No accessor rule matched the (target, field) pair.
    #[error("no accessor for field `{field}` on {target_kind} target")]
    NoAccessor {
        /// The field that could not be resolved.
        field: String,
        /// The kind of target presented to the factory.
        target_kind: &'static str,
    },

    /// The translator rejected a value.
    #[error("translation failed: {0}")]
    Translate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_error_converts_into_bind_error() {
        let e: BindError = AccessError::DeadTarget.into();
        assert_eq!(e, BindError::Access(AccessError::DeadTarget));
    }

    #[test]
    fn messages_name_the_field() {
        let e = AccessError::MissingField {
            field: "visible".into(),
        };
        assert_eq!(e.to_string(), "no field `visible` on target");

        let e = BindError::NoAccessor {
            field: "value".into(),
            target_kind: "external",
        };
        assert!(e.to_string().contains("`value`"));
        assert!(e.to_string().contains("external"));
    }
}
