//! Reference-counted debuggable state.
//!
//! Any number of scopes may request the runtime to be debuggable at the same
//! time. The runtime is switched into the debuggable state when the first
//! request starts and switched back when the last one ends, and each switch
//! runs exactly once per edge.
//!
//! A single counter carries both the holder count and an exclusive lock over
//! the switch itself:
//!
//! | Value | Phase                                    |
//! |-------|------------------------------------------|
//! | 0     | [`Phase::Idle`]                          |
//! | 1     | [`Phase::Transition`], a switch is running |
//! | n ≥ 2 | [`Phase::Active`] with n - 1 holders     |
//!
//! Joining or leaving an already active state is a single compare-and-swap.
//! Threads that observe a running switch sleep until it completes.

use std::sync::atomic::{AtomicUsize, Ordering};

use artkit_core::ArtError;
use parking_lot::{Condvar, Mutex};

use crate::{Runtime, RuntimeDebugState};

const IDLE: usize = 0;
const TRANSITION: usize = 1;
const FIRST_HOLDER: usize = 2;

/// Observable phase of a [`DebuggableState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nobody holds the state.
    Idle,

    /// A thread is switching the runtime in or out of the debuggable state.
    Transition,

    /// The given number of holders share the debuggable state.
    Active(usize),
}

/// The shared counter behind [`DebuggableGuard`].
#[derive(Debug)]
pub struct DebuggableState {
    count: AtomicUsize,
    lock: Mutex<()>,
    changed: Condvar,
}

impl Default for DebuggableState {
    fn default() -> Self {
        Self::new()
    }
}

impl DebuggableState {
    /// Creates an idle state.
    pub const fn new() -> Self {
        Self {
            count: AtomicUsize::new(IDLE),
            lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        match self.count.load(Ordering::Acquire) {
            IDLE => Phase::Idle,
            TRANSITION => Phase::Transition,
            count => Phase::Active(count - 1),
        }
    }

    /// Registers a holder, running `enter` if it is the first one.
    ///
    /// If `enter` fails or panics the state returns to idle and the error is
    /// passed through; the caller is then not a holder.
    pub fn enter<E>(&self, enter: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        let mut enter = Some(enter);

        loop {
            match self
                .count
                .compare_exchange(IDLE, TRANSITION, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let mut switch = Switch::new(self);
                    let result = match enter.take() {
                        Some(enter) => enter(),
                        None => Ok(()),
                    };

                    if result.is_ok() {
                        switch.next = FIRST_HOLDER;
                    }

                    return result;
                }
                Err(TRANSITION) => self.wait(),
                Err(count) => {
                    if self
                        .count
                        .compare_exchange(count, count + 1, Ordering::AcqRel, Ordering::Relaxed)
                        .is_ok()
                    {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Unregisters a holder, running `leave` if it is the last one.
    ///
    /// The holder is gone even if `leave` fails or panics.
    pub fn leave<E>(&self, leave: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        let mut leave = Some(leave);

        loop {
            match self.count.compare_exchange(
                FIRST_HOLDER,
                TRANSITION,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let _switch = Switch::new(self);
                    return match leave.take() {
                        Some(leave) => leave(),
                        None => Ok(()),
                    };
                }
                Err(TRANSITION) => self.wait(),
                Err(IDLE) => {
                    tracing::error!("debuggable state released without holders");
                    return Ok(());
                }
                Err(count) => {
                    if self
                        .count
                        .compare_exchange(count, count - 1, Ordering::AcqRel, Ordering::Relaxed)
                        .is_ok()
                    {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Blocks while a transition is running.
    fn wait(&self) {
        let mut guard = self.lock.lock();
        while self.count.load(Ordering::Acquire) == TRANSITION {
            self.changed.wait(&mut guard);
        }
    }

    fn notify(&self) {
        let _guard = self.lock.lock();
        self.changed.notify_all();
    }
}

/// Ends a running transition, also when the switch closure unwinds.
///
/// Stores `next` (idle unless changed) and wakes the waiters.
struct Switch<'a> {
    state: &'a DebuggableState,
    next: usize,
}

impl<'a> Switch<'a> {
    fn new(state: &'a DebuggableState) -> Self {
        Self { state, next: IDLE }
    }
}

impl Drop for Switch<'_> {
    fn drop(&mut self) {
        self.state.count.store(self.next, Ordering::Release);
        self.state.notify();
    }
}

/// A scope during which the runtime is debuggable.
///
/// The first guard switches the runtime to
/// [`RuntimeDebugState::JavaDebuggableAtInit`], and dropping the last one
/// restores [`RuntimeDebugState::NonJavaDebuggable`]. Guards that overlap with
/// an active one only adjust the holder count.
///
/// Acquisition blocks while another thread is switching. A guard that is
/// never dropped blocks the restore forever.
pub struct DebuggableGuard<'a> {
    state: &'a DebuggableState,
    runtime: &'a Runtime,
}

impl<'a> DebuggableGuard<'a> {
    /// Acquires the debuggable state.
    pub fn acquire(state: &'a DebuggableState, runtime: &'a Runtime) -> Result<Self, ArtError> {
        state.enter(|| runtime.set_java_debuggable(RuntimeDebugState::JavaDebuggableAtInit))?;
        Ok(Self { state, runtime })
    }
}

impl Drop for DebuggableGuard<'_> {
    fn drop(&mut self) {
        let runtime = self.runtime;
        if let Err(err) = self
            .state
            .leave(|| runtime.set_java_debuggable(RuntimeDebugState::NonJavaDebuggable))
        {
            tracing::error!(%err, "failed to restore the debuggable state");
        }
    }
}

#[cfg(test)]
#[path = "debuggable_tests.rs"]
mod tests;
