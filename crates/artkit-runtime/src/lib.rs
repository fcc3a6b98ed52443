//! Android Runtime specific operations.
//!
//! Locates and drives a handful of unexported `libart.so` internals:
//!
//! - [`Runtime`] reads the `art::Runtime` singleton and changes its
//!   debuggable state, falling back to a discovered field offset when no
//!   setter is callable.
//! - [`ScopedSuspendAll`] suspends every other runtime thread for a scope.
//! - [`DebuggableGuard`] keeps the runtime debuggable while any number of
//!   overlapping scopes need it.
//! - [`Thread`] returns the runtime thread of the caller.
//!
//! [`ArtContext`] binds all of them at once.

mod config;
mod context;
mod debuggable;
mod runtime;
mod suspend;
mod thread;

#[cfg(test)]
mod testing;

pub use self::{
    config::{ArtConfig, NullInstancePolicy},
    context::ArtContext,
    debuggable::{DebuggableGuard, DebuggableState, Phase},
    runtime::{
        RUNTIME_INSTANCE, Runtime, RuntimeDebugState, SET_JAVA_DEBUGGABLE,
        SET_RUNTIME_DEBUG_STATE,
    },
    suspend::{
        DBG_RESUME_VM, DBG_SUSPEND_VM, PauseStrategy, SCOPED_SUSPEND_ALL_CTOR,
        SCOPED_SUSPEND_ALL_DTOR, SUSPEND_STORAGE_SIZE, ScopedSuspendAll, SuspendAll,
        SuspendStorage,
    },
    thread::{THREAD_CURRENT_FROM_GDB, Thread},
};
