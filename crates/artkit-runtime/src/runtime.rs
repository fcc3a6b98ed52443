use std::{ffi::c_void, ptr::NonNull};

use artkit_core::{
    ApiLevel, ArtError, DataCell, MemberFunction, OffsetProbe, SymbolBinder, Va,
    offset::DEFAULT_SCRATCH_SIZE, resolve_any, symbols,
};
use zerocopy::{Immutable, IntoBytes};

use crate::{ArtConfig, NullInstancePolicy};

symbols! {
    /// `art::Runtime::instance_`
    pub RUNTIME_INSTANCE = "_ZN3art7Runtime9instance_E";

    /// `art::Runtime::SetJavaDebuggable(bool)`
    pub SET_JAVA_DEBUGGABLE = "_ZN3art7Runtime17SetJavaDebuggableEb", since = ApiLevel::O;

    /// `art::Runtime::SetRuntimeDebugState(art::Runtime::RuntimeDebugState)`
    pub SET_RUNTIME_DEBUG_STATE =
        "_ZN3art7Runtime20SetRuntimeDebugStateENS0_17RuntimeDebugStateE", since = ApiLevel::O;
}

/// Debuggability of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoBytes, Immutable)]
#[repr(u32)]
pub enum RuntimeDebugState {
    /// No debug features or method tracing. The usual state.
    NonJavaDebuggable = 0,

    /// Method tracing and a restricted set of debug features. Entered while
    /// tracing or a debugger agent is active.
    JavaDebuggable = 1,

    /// The extended set of debug features, normally only set when the runtime
    /// starts as debuggable.
    JavaDebuggableAtInit = 2,
}

impl RuntimeDebugState {
    /// Checks whether the state enables any debug features.
    pub fn is_debuggable(self) -> bool {
        self != Self::NonJavaDebuggable
    }
}

type SetJavaDebuggableFn = unsafe extern "C" fn(*mut c_void, bool);
type SetRuntimeDebugStateFn = unsafe extern "C" fn(*mut c_void, RuntimeDebugState);

/// Handle to the `art::Runtime` singleton.
///
/// Changing the debuggable state goes through the first available of:
///
/// 1. `SetRuntimeDebugState` on the live instance, if
///    [`ArtConfig::direct_debug_state`] is set.
/// 2. `SetJavaDebuggable`, which only knows a boolean.
/// 3. A direct write of the state field, whose offset is discovered once by
///    running `SetRuntimeDebugState` against a scratch region.
///
/// If none of them is available the change is a logged no-op.
pub struct Runtime {
    instance: DataCell<*mut c_void>,
    set_java_debuggable: MemberFunction<SetJavaDebuggableFn>,
    set_runtime_debug_state: MemberFunction<SetRuntimeDebugStateFn>,
    debug_state: OffsetProbe,

    null_instance: NullInstancePolicy,
    scratch_size: usize,
    direct_debug_state: bool,
}

impl Runtime {
    /// Creates an unbound handle.
    ///
    /// A configured scratch size below [`DEFAULT_SCRATCH_SIZE`] is raised to
    /// it, since the discovery setter writes into the region as if it were a
    /// complete `art::Runtime`.
    pub fn new(config: &ArtConfig) -> Self {
        if config.scratch_size < DEFAULT_SCRATCH_SIZE {
            tracing::warn!(
                scratch_size = config.scratch_size,
                minimum = DEFAULT_SCRATCH_SIZE,
                "scratch size raised to minimum"
            );
        }

        Self {
            instance: DataCell::new(RUNTIME_INSTANCE),
            set_java_debuggable: MemberFunction::new(SET_JAVA_DEBUGGABLE),
            set_runtime_debug_state: MemberFunction::new(SET_RUNTIME_DEBUG_STATE),
            debug_state: OffsetProbe::new("Runtime::debug_state"),
            null_instance: config.null_instance,
            scratch_size: config.scratch_size.max(DEFAULT_SCRATCH_SIZE),
            direct_debug_state: config.direct_debug_state,
        }
    }

    /// Binds the runtime symbols.
    ///
    /// The singleton pointer is mandatory and must be non-NULL. The state
    /// setters are optional and only looked up on API levels that have them;
    /// without them, the debuggable state cannot be changed.
    pub fn init(&self, binder: &dyn SymbolBinder) -> Result<(), ArtError> {
        if !self.instance.resolve(binder) {
            tracing::error!(symbol = RUNTIME_INSTANCE.name, "failed to find Runtime::instance_");
            return Err(ArtError::SymbolNotFound(RUNTIME_INSTANCE.name));
        }

        let Some(instance) = self.current() else {
            tracing::error!("Runtime::instance_ is NULL");
            return Err(ArtError::NullInstance);
        };

        tracing::debug!(instance = %Va::from_ptr(instance.as_ptr()), "runtime instance");

        if binder.api_level() >= ApiLevel::O {
            let bound = resolve_any(
                binder,
                &[&self.set_java_debuggable, &self.set_runtime_debug_state],
            );

            if !bound {
                tracing::warn!("no debug state setter available");
            }
        }

        Ok(())
    }

    /// Returns the runtime singleton.
    ///
    /// Returns `None` if the handle is not bound or the singleton is NULL.
    pub fn current(&self) -> Option<NonNull<c_void>> {
        // SAFETY: `Runtime::instance_` is a plain pointer that the runtime
        //         sets once during startup.
        let instance = unsafe { self.instance.read() }?;
        NonNull::new(instance)
    }

    /// Returns the offset of the debug state field, discovering it on first
    /// use.
    pub fn debug_state_offset(&self) -> Option<usize> {
        self.debug_state.discover(
            self.scratch_size,
            RuntimeDebugState::JavaDebuggable,
            |this, value| {
                // SAFETY: The scratch region is larger than `art::Runtime`.
                unsafe { self.set_runtime_debug_state.invoke(this, value) }.is_some()
            },
        )
    }

    /// Returns whether offset discovery was attempted.
    pub fn is_debug_state_probed(&self) -> bool {
        self.debug_state.is_attempted()
    }

    /// Changes the debuggable state of the runtime.
    ///
    /// Unavailable setters are not an error; see the type documentation for
    /// the fallback order. The only error is a NULL singleton under
    /// [`NullInstancePolicy::Fail`].
    pub fn set_java_debuggable(&self, state: RuntimeDebugState) -> Result<(), ArtError> {
        let Some(instance) = self.current() else {
            return match self.null_instance {
                NullInstancePolicy::Skip => {
                    tracing::warn!(?state, "runtime instance is NULL, skipping");
                    Ok(())
                }
                NullInstancePolicy::Fail => {
                    tracing::error!(?state, "runtime instance is NULL");
                    Err(ArtError::NullInstance)
                }
            };
        };

        let this = instance.as_ptr();

        if self.direct_debug_state && self.set_runtime_debug_state.is_bound() {
            tracing::trace!(?state, "SetRuntimeDebugState");
            // SAFETY: `this` is the live runtime instance.
            unsafe { self.set_runtime_debug_state.invoke(this, state) };
            return Ok(());
        }

        if self.set_java_debuggable.is_bound() {
            tracing::trace!(?state, "SetJavaDebuggable");
            // SAFETY: `this` is the live runtime instance.
            unsafe { self.set_java_debuggable.invoke(this, state.is_debuggable()) };
            return Ok(());
        }

        match self.debug_state_offset() {
            Some(offset) => {
                tracing::trace!(?state, offset, "writing debug state");
                // SAFETY: The offset was discovered from the layout of
                //         `art::Runtime` and lies within the instance.
                unsafe {
                    this.cast::<u8>()
                        .add(offset)
                        .cast::<RuntimeDebugState>()
                        .write_unaligned(state)
                };
            }
            None => tracing::trace!(?state, "debug state offset unknown, skipping"),
        }

        Ok(())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("instance", &self.instance)
            .field("set_java_debuggable", &self.set_java_debuggable)
            .field("set_runtime_debug_state", &self.set_runtime_debug_state)
            .field("debug_state", &self.debug_state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::testing::{FakeRuntime, MockBinder, init_tracing};

    const STATE_OFFSET: usize = 128;

    #[test]
    fn missing_instance_is_fatal() {
        init_tracing();
        let runtime = Runtime::new(&ArtConfig::default());
        let result = runtime.init(&MockBinder::new(ApiLevel::U));

        assert!(matches!(result, Err(ArtError::SymbolNotFound(name)) if name == RUNTIME_INSTANCE.name));
        assert!(runtime.current().is_none());
    }

    #[test]
    fn null_instance_is_fatal() {
        let fake = FakeRuntime::null();
        let runtime = Runtime::new(&ArtConfig::default());
        let result = runtime.init(&MockBinder::new(ApiLevel::U).with_runtime(&fake));

        assert!(matches!(result, Err(ArtError::NullInstance)));
    }

    #[test]
    fn boolean_setter_is_preferred() {
        static CALLS: Mutex<Vec<(usize, bool)>> = Mutex::new(Vec::new());

        unsafe extern "C" fn set_java_debuggable(this: *mut c_void, value: bool) {
            CALLS.lock().push((this as usize, value));
        }

        unsafe extern "C" fn set_runtime_debug_state(_: *mut c_void, _: RuntimeDebugState) {
            panic!("offset discovery must not run");
        }

        init_tracing();
        let fake = FakeRuntime::new();
        let binder = MockBinder::new(ApiLevel::U)
            .with_runtime(&fake)
            .with(SET_JAVA_DEBUGGABLE, set_java_debuggable as usize)
            .with(SET_RUNTIME_DEBUG_STATE, set_runtime_debug_state as usize);

        let runtime = Runtime::new(&ArtConfig::default());
        runtime.init(&binder).unwrap();

        runtime
            .set_java_debuggable(RuntimeDebugState::JavaDebuggableAtInit)
            .unwrap();
        runtime
            .set_java_debuggable(RuntimeDebugState::JavaDebuggable)
            .unwrap();
        runtime
            .set_java_debuggable(RuntimeDebugState::NonJavaDebuggable)
            .unwrap();

        let object = fake.object as usize;
        assert_eq!(
            *CALLS.lock(),
            [(object, true), (object, true), (object, false)]
        );
        assert!(!runtime.is_debug_state_probed());
    }

    #[test]
    fn discovered_offset_is_used_for_writes() {
        static PROBES: AtomicUsize = AtomicUsize::new(0);

        unsafe extern "C" fn set_runtime_debug_state(this: *mut c_void, value: RuntimeDebugState) {
            PROBES.fetch_add(1, Ordering::SeqCst);
            unsafe {
                this.cast::<u8>()
                    .add(STATE_OFFSET)
                    .cast::<RuntimeDebugState>()
                    .write(value)
            };
        }

        init_tracing();
        let fake = FakeRuntime::new();
        let binder = MockBinder::new(ApiLevel::U)
            .with_runtime(&fake)
            .with(SET_RUNTIME_DEBUG_STATE, set_runtime_debug_state as usize);

        let runtime = Runtime::new(&ArtConfig::default());
        runtime.init(&binder).unwrap();
        assert!(!runtime.is_debug_state_probed());

        runtime
            .set_java_debuggable(RuntimeDebugState::JavaDebuggableAtInit)
            .unwrap();
        assert_eq!(runtime.debug_state_offset(), Some(STATE_OFFSET));
        assert_eq!(fake.read_u32(STATE_OFFSET), 2);

        runtime
            .set_java_debuggable(RuntimeDebugState::NonJavaDebuggable)
            .unwrap();
        assert_eq!(fake.read_u32(STATE_OFFSET), 0);

        // The setter only ever ran against the scratch region.
        assert_eq!(PROBES.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn small_scratch_size_is_raised() {
        unsafe extern "C" fn set_runtime_debug_state(this: *mut c_void, value: RuntimeDebugState) {
            unsafe {
                this.cast::<u8>()
                    .add(STATE_OFFSET)
                    .cast::<RuntimeDebugState>()
                    .write(value)
            };
        }

        init_tracing();
        let fake = FakeRuntime::new();
        let binder = MockBinder::new(ApiLevel::U)
            .with_runtime(&fake)
            .with(SET_RUNTIME_DEBUG_STATE, set_runtime_debug_state as usize);

        for scratch_size in [0, 8, STATE_OFFSET] {
            let runtime = Runtime::new(&ArtConfig::default().with_scratch_size(scratch_size));
            runtime.init(&binder).unwrap();
            assert_eq!(runtime.debug_state_offset(), Some(STATE_OFFSET));
        }
    }

    #[test]
    fn direct_setter_passes_full_state() {
        static CALLS: Mutex<Vec<(usize, RuntimeDebugState)>> = Mutex::new(Vec::new());

        unsafe extern "C" fn set_runtime_debug_state(this: *mut c_void, value: RuntimeDebugState) {
            CALLS.lock().push((this as usize, value));
        }

        let fake = FakeRuntime::new();
        let binder = MockBinder::new(ApiLevel::U)
            .with_runtime(&fake)
            .with(SET_RUNTIME_DEBUG_STATE, set_runtime_debug_state as usize);

        let runtime = Runtime::new(&ArtConfig::default().with_direct_debug_state(true));
        runtime.init(&binder).unwrap();

        runtime
            .set_java_debuggable(RuntimeDebugState::JavaDebuggableAtInit)
            .unwrap();
        runtime
            .set_java_debuggable(RuntimeDebugState::NonJavaDebuggable)
            .unwrap();

        let object = fake.object as usize;
        assert_eq!(
            *CALLS.lock(),
            [
                (object, RuntimeDebugState::JavaDebuggableAtInit),
                (object, RuntimeDebugState::NonJavaDebuggable)
            ]
        );
        assert!(!runtime.is_debug_state_probed());
    }

    #[test]
    fn setters_are_gated_by_api_level() {
        unsafe extern "C" fn set_java_debuggable(_: *mut c_void, _: bool) {
            panic!("gated setter must not be bound");
        }

        init_tracing();
        let fake = FakeRuntime::new();
        let binder = MockBinder::new(ApiLevel::N)
            .with_runtime(&fake)
            .with(SET_JAVA_DEBUGGABLE, set_java_debuggable as usize);

        let runtime = Runtime::new(&ArtConfig::default());
        runtime.init(&binder).unwrap();

        // Nothing to call and nothing to probe with: a silent no-op.
        runtime
            .set_java_debuggable(RuntimeDebugState::JavaDebuggableAtInit)
            .unwrap();
        assert!(runtime.is_debug_state_probed());
        assert_eq!(runtime.debug_state_offset(), None);
        assert!((0..FakeRuntime::SIZE).step_by(4).all(|offset| fake.read_u32(offset) == 0));
    }

    #[test]
    fn null_instance_policy() {
        let skip = Runtime::new(&ArtConfig::default());
        assert!(
            skip.set_java_debuggable(RuntimeDebugState::JavaDebuggableAtInit)
                .is_ok()
        );

        let fail =
            Runtime::new(&ArtConfig::default().with_null_instance(NullInstancePolicy::Fail));
        assert!(matches!(
            fail.set_java_debuggable(RuntimeDebugState::JavaDebuggableAtInit),
            Err(ArtError::NullInstance)
        ));
        assert!(!fail.is_debug_state_probed());
    }
}
