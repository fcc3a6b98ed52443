use std::{ffi::c_void, ptr::NonNull};

use artkit_core::{ArtError, Function, SymbolBinder, symbols};
use once_cell::sync::OnceCell;

symbols! {
    /// `art::Thread::CurrentFromGdb()`
    pub THREAD_CURRENT_FROM_GDB = "_ZN3art6Thread14CurrentFromGdbEv";
}

type CurrentFromGdbFn = unsafe extern "C" fn() -> *mut c_void;

/// Handle to `art::Thread`.
#[derive(Debug)]
pub struct Thread {
    current_from_gdb: Function<CurrentFromGdbFn>,
    initialized: OnceCell<bool>,
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

impl Thread {
    /// Creates an unbound handle.
    pub const fn new() -> Self {
        Self {
            current_from_gdb: Function::new(THREAD_CURRENT_FROM_GDB),
            initialized: OnceCell::new(),
        }
    }

    /// Binds `Thread::CurrentFromGdb`. Repeated calls return the first
    /// outcome.
    pub fn init(&self, binder: &dyn SymbolBinder) -> Result<(), ArtError> {
        let bound = *self.initialized.get_or_init(|| {
            let bound = self.current_from_gdb.resolve(binder);
            if !bound {
                tracing::error!(
                    symbol = THREAD_CURRENT_FROM_GDB.name,
                    "failed to resolve Thread::CurrentFromGdb"
                );
            }
            bound
        });

        if !bound {
            return Err(ArtError::SymbolNotFound(THREAD_CURRENT_FROM_GDB.name));
        }

        Ok(())
    }

    /// Returns the runtime thread object of the calling thread.
    ///
    /// Returns `None` if the handle is not bound or the calling thread is not
    /// attached to the runtime.
    pub fn current(&self) -> Option<NonNull<c_void>> {
        // SAFETY: Takes no arguments and only reads thread-local state.
        match unsafe { self.current_from_gdb.invoke() } {
            Some(thread) => NonNull::new(thread),
            None => {
                tracing::error!("Thread::CurrentFromGdb is not bound");
                None
            }
        }
    }
}
