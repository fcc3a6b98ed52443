//! Core artkit functionality.
//!
//! This crate knows nothing about a particular runtime. It provides the
//! machinery for working with an opaque binary image whose internals are not
//! part of any stable interface:
//!
//! - [`SymbolBinder`] resolves mangled names, with alias probing and API level
//!   gating.
//! - [`Function`], [`MemberFunction`] and [`DataCell`] are typed, lazily bound
//!   handles to resolved symbols.
//! - [`OffsetProbe`] discovers the offset of a field by observing the side
//!   effect of a foreign setter on a scratch region.

mod api;
mod binder;
mod core;
pub mod entry;
mod error;
pub mod offset;
mod symbol;

pub use self::{
    api::ApiLevel,
    binder::{DlBinder, SymbolBinder},
    core::{Hex, Va},
    entry::{DataCell, FnPtr, Function, MemberFunction, Resolve, resolve_any},
    error::ArtError,
    offset::OffsetProbe,
    symbol::Symbol,
};
