#![forbid(unsafe_code)]

//! Core types for the Tether binding engine.
//!
//! This crate holds the leaf layer everything else builds on:
//!
//! - [`Value`]: the dynamic value model carried across bindings.
//! - [`AccessError`] / [`BindError`]: the failure taxonomy.
//! - [`host`]: the contract an embedding host implements so that
//!   string-addressed external properties become bindable.
//! - [`debug`]: the two process-posture toggles (break on access failure,
//!   break on bind failure).
//! - [`IdleQueue`]: the deferred-execution substrate used by deferred events.
//!
//! Nothing in this crate knows about accessors, bindings, or collections;
//! those live in `tether-bind`.

pub mod debug;
pub mod error;
pub mod host;
pub mod schedule;
pub mod value;

pub use error::{AccessError, BindError};
pub use host::HostBackend;
pub use schedule::IdleQueue;
pub use value::Value;
