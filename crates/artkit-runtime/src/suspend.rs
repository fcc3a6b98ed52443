//! Global thread suspension.
//!
//! The preferred way to stop every other thread in the runtime is to
//! construct an `art::ScopedSuspendAll` and destroy it when done. Its layout
//! is owned by the runtime, so the object lives in an opaque, generously
//! sized [`SuspendStorage`] that is only ever touched by the foreign
//! constructor and destructor. Builds that lack the constructor/destructor
//! pair fall back to `art::Dbg::SuspendVM` and `art::Dbg::ResumeVM`.

use std::{
    ffi::{CStr, c_char, c_void},
    mem::MaybeUninit,
};

use artkit_core::{ArtError, Function, MemberFunction, SymbolBinder, Va, symbols};
use once_cell::sync::OnceCell;

symbols! {
    /// `art::ScopedSuspendAll::ScopedSuspendAll(char const*, bool)`
    pub SCOPED_SUSPEND_ALL_CTOR = "_ZN3art16ScopedSuspendAllC2EPKcb";

    /// `art::ScopedSuspendAll::~ScopedSuspendAll()`
    pub SCOPED_SUSPEND_ALL_DTOR = "_ZN3art16ScopedSuspendAllD2Ev";

    /// `art::Dbg::SuspendVM()`
    pub DBG_SUSPEND_VM = "_ZN3art3Dbg9SuspendVMEv";

    /// `art::Dbg::ResumeVM()`
    pub DBG_RESUME_VM = "_ZN3art3Dbg8ResumeVMEv";
}

type ConstructorFn = unsafe extern "C" fn(*mut c_void, *const c_char, bool);
type DestructorFn = unsafe extern "C" fn(*mut c_void);
type SuspendVmFn = unsafe extern "C" fn();
type ResumeVmFn = unsafe extern "C" fn();

/// How the global pause is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseStrategy {
    /// Construct and destroy an `art::ScopedSuspendAll`.
    Scoped,

    /// Call `art::Dbg::SuspendVM` and `art::Dbg::ResumeVM`.
    SuspendVm,

    /// Nothing is available; pausing is a no-op.
    Unavailable,
}

/// Size of the storage reserved for a foreign `art::ScopedSuspendAll`.
pub const SUSPEND_STORAGE_SIZE: usize = 64;

/// Opaque storage for a foreign object of unknown layout.
#[repr(C, align(16))]
pub struct SuspendStorage([MaybeUninit<u8>; SUSPEND_STORAGE_SIZE]);

impl SuspendStorage {
    fn new() -> Box<Self> {
        Box::new(Self([MaybeUninit::zeroed(); SUSPEND_STORAGE_SIZE]))
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        self.0.as_mut_ptr().cast()
    }
}

/// Entry points for suspending all runtime threads.
#[derive(Debug)]
pub struct SuspendAll {
    constructor: MemberFunction<ConstructorFn>,
    destructor: MemberFunction<DestructorFn>,
    suspend_vm: Function<SuspendVmFn>,
    resume_vm: Function<ResumeVmFn>,
    initialized: OnceCell<bool>,
}

impl Default for SuspendAll {
    fn default() -> Self {
        Self::new()
    }
}

impl SuspendAll {
    /// Creates unbound entry points.
    pub const fn new() -> Self {
        Self {
            constructor: MemberFunction::new(SCOPED_SUSPEND_ALL_CTOR),
            destructor: MemberFunction::new(SCOPED_SUSPEND_ALL_DTOR),
            suspend_vm: Function::new(DBG_SUSPEND_VM),
            resume_vm: Function::new(DBG_RESUME_VM),
            initialized: OnceCell::new(),
        }
    }

    /// Binds the entry points.
    ///
    /// Fails with [`ArtError::PauseUnavailable`] if neither a complete
    /// constructor/destructor pair nor a complete suspend/resume pair is
    /// available. Repeated calls return the first outcome.
    pub fn init(&self, binder: &dyn SymbolBinder) -> Result<(), ArtError> {
        let available = *self.initialized.get_or_init(|| {
            self.constructor.resolve(binder);
            self.destructor.resolve(binder);
            self.suspend_vm.resolve(binder);
            self.resume_vm.resolve(binder);

            let strategy = self.strategy();
            match strategy {
                PauseStrategy::Scoped => tracing::debug!(?strategy, "global pause available"),
                PauseStrategy::SuspendVm => tracing::warn!(?strategy, "using fallback pause"),
                PauseStrategy::Unavailable => {
                    tracing::error!("failed to resolve ScopedSuspendAll or Dbg::SuspendVM")
                }
            }

            strategy != PauseStrategy::Unavailable
        });

        if !available {
            return Err(ArtError::PauseUnavailable);
        }

        Ok(())
    }

    /// Returns the strategy a new pause would use.
    ///
    /// A strategy is only chosen if both of its entry points are bound, so
    /// acquisition and release always go through the same pair.
    pub fn strategy(&self) -> PauseStrategy {
        if self.constructor.is_bound() && self.destructor.is_bound() {
            PauseStrategy::Scoped
        } else if self.suspend_vm.is_bound() && self.resume_vm.is_bound() {
            PauseStrategy::SuspendVm
        } else {
            PauseStrategy::Unavailable
        }
    }

    /// Suspends all runtime threads until the returned guard is dropped.
    pub fn suspend<'a>(&'a self, cause: &'a CStr, long_suspend: bool) -> ScopedSuspendAll<'a> {
        ScopedSuspendAll::new(self, cause, long_suspend)
    }
}

/// A scope during which all other runtime threads are suspended.
///
/// Dropping the guard resumes them through the same strategy that suspended
/// them. If no strategy is available both ends are logged no-ops, so callers
/// must treat the pause as best-effort.
pub struct ScopedSuspendAll<'a> {
    api: &'a SuspendAll,
    strategy: PauseStrategy,
    storage: Box<SuspendStorage>,
    _cause: &'a CStr,
}

impl<'a> ScopedSuspendAll<'a> {
    /// Suspends all runtime threads.
    ///
    /// `cause` is handed to the runtime for its logs and must outlive the
    /// guard.
    pub fn new(api: &'a SuspendAll, cause: &'a CStr, long_suspend: bool) -> Self {
        let strategy = api.strategy();
        let mut storage = SuspendStorage::new();

        match strategy {
            PauseStrategy::Scoped => {
                let this = storage.as_mut_ptr();
                tracing::trace!(?cause, long_suspend, this = %Va::from_ptr(this), "ScopedSuspendAll");
                // SAFETY: The storage is larger than `art::ScopedSuspendAll`
                //         and stays at the same address until dropped.
                unsafe { api.constructor.invoke(this, cause.as_ptr(), long_suspend) };
            }
            PauseStrategy::SuspendVm => {
                tracing::warn!(?cause, "falling back to Dbg::SuspendVM");
                // SAFETY: Takes no arguments.
                unsafe { api.suspend_vm.invoke() };
            }
            PauseStrategy::Unavailable => {
                tracing::error!(?cause, "no method available to suspend all threads");
            }
        }

        Self {
            api,
            strategy,
            storage,
            _cause: cause,
        }
    }

    /// Returns the strategy used by this pause.
    pub fn strategy(&self) -> PauseStrategy {
        self.strategy
    }
}

impl Drop for ScopedSuspendAll<'_> {
    fn drop(&mut self) {
        match self.strategy {
            PauseStrategy::Scoped => {
                // SAFETY: The storage holds the object built by the matching
                //         constructor.
                unsafe { self.api.destructor.invoke(self.storage.as_mut_ptr()) };
            }
            PauseStrategy::SuspendVm => {
                tracing::warn!("falling back to Dbg::ResumeVM");
                // SAFETY: Takes no arguments.
                unsafe { self.api.resume_vm.invoke() };
            }
            PauseStrategy::Unavailable => {
                tracing::error!("no method available to resume all threads");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use artkit_core::ApiLevel;
    use parking_lot::Mutex;

    use super::*;
    use crate::testing::{MockBinder, init_tracing};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Construct(usize, String, bool),
        Destruct(usize),
        Suspend,
        Resume,
    }

    #[test]
    fn scoped_pair_uses_stable_storage() {
        static CALLS: Mutex<Vec<Call>> = Mutex::new(Vec::new());

        unsafe extern "C" fn construct(this: *mut c_void, cause: *const c_char, long: bool) {
            let cause = unsafe { CStr::from_ptr(cause) }.to_string_lossy().into_owned();
            CALLS.lock().push(Call::Construct(this as usize, cause, long));
        }

        unsafe extern "C" fn destruct(this: *mut c_void) {
            CALLS.lock().push(Call::Destruct(this as usize));
        }

        unsafe extern "C" fn suspend() {
            CALLS.lock().push(Call::Suspend);
        }

        unsafe extern "C" fn resume() {
            CALLS.lock().push(Call::Resume);
        }

        init_tracing();
        let binder = MockBinder::new(ApiLevel::U)
            .with(SCOPED_SUSPEND_ALL_CTOR, construct as usize)
            .with(SCOPED_SUSPEND_ALL_DTOR, destruct as usize)
            .with(DBG_SUSPEND_VM, suspend as usize)
            .with(DBG_RESUME_VM, resume as usize);

        let api = SuspendAll::new();
        api.init(&binder).unwrap();
        assert_eq!(api.strategy(), PauseStrategy::Scoped);

        let guard = api.suspend(c"hook", false);
        assert_eq!(guard.strategy(), PauseStrategy::Scoped);

        // Moving the guard must not move the foreign object.
        let moved = Some(guard);
        drop(moved);

        let calls = CALLS.lock().clone();
        let [Call::Construct(constructed, cause, long), Call::Destruct(destructed)] = &calls[..]
        else {
            panic!("unexpected calls: {calls:?}");
        };

        assert_eq!(constructed, destructed);
        assert_eq!(cause, "hook");
        assert!(!long);
        assert_eq!(constructed % 16, 0);
    }

    #[test]
    fn suspend_vm_fallback_runs_once_each_in_order() {
        static CALLS: Mutex<Vec<Call>> = Mutex::new(Vec::new());

        unsafe extern "C" fn suspend() {
            CALLS.lock().push(Call::Suspend);
        }

        unsafe extern "C" fn resume() {
            CALLS.lock().push(Call::Resume);
        }

        init_tracing();
        let binder = MockBinder::new(ApiLevel::U)
            .with(DBG_SUSPEND_VM, suspend as usize)
            .with(DBG_RESUME_VM, resume as usize);

        let api = SuspendAll::new();
        api.init(&binder).unwrap();

        {
            let guard = api.suspend(c"fallback", true);
            assert_eq!(guard.strategy(), PauseStrategy::SuspendVm);
            assert_eq!(*CALLS.lock(), [Call::Suspend]);
        }

        assert_eq!(*CALLS.lock(), [Call::Suspend, Call::Resume]);
    }

    #[test]
    fn incomplete_pairs_are_not_used() {
        static CALLS: Mutex<Vec<Call>> = Mutex::new(Vec::new());

        unsafe extern "C" fn construct(this: *mut c_void, _: *const c_char, long: bool) {
            CALLS.lock().push(Call::Construct(this as usize, String::new(), long));
        }

        unsafe extern "C" fn resume() {
            CALLS.lock().push(Call::Resume);
        }

        init_tracing();
        let binder = MockBinder::new(ApiLevel::U)
            .with(SCOPED_SUSPEND_ALL_CTOR, construct as usize)
            .with(DBG_RESUME_VM, resume as usize);

        let api = SuspendAll::new();
        assert!(matches!(api.init(&binder), Err(ArtError::PauseUnavailable)));
        assert_eq!(api.strategy(), PauseStrategy::Unavailable);

        drop(api.suspend(c"nothing", false));
        assert!(CALLS.lock().is_empty());
    }

    #[test]
    fn init_is_idempotent() {
        unsafe extern "C" fn noop() {}

        let api = SuspendAll::new();
        assert!(api.init(&MockBinder::new(ApiLevel::U)).is_err());

        // The first outcome sticks.
        let binder = MockBinder::new(ApiLevel::U)
            .with(DBG_SUSPEND_VM, noop as usize)
            .with(DBG_RESUME_VM, noop as usize);
        assert!(api.init(&binder).is_err());
        assert_eq!(api.strategy(), PauseStrategy::Unavailable);
    }
}
