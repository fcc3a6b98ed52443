use std::ffi::CStr;

use artkit_core::{ApiLevel, ArtError, SymbolBinder, Va};

use crate::{
    ArtConfig, DebuggableGuard, DebuggableState, Runtime, ScopedSuspendAll, SuspendAll, Thread,
};

/// A [`SymbolBinder`] that reports an overridden API level.
struct ApiLevelOverride<'a> {
    inner: &'a dyn SymbolBinder,
    api_level: ApiLevel,
}

impl SymbolBinder for ApiLevelOverride<'_> {
    fn lookup(&self, name: &str) -> Option<Va> {
        self.inner.lookup(name)
    }

    fn api_level(&self) -> ApiLevel {
        self.api_level
    }
}

/// Process-scoped handles into the Android Runtime.
///
/// Holds every resolved entry point, the discovered debug state offset and
/// the debuggable holder count. A hooking engine creates one context when it
/// attaches to the process and keeps it for the lifetime of the process.
#[derive(Debug)]
pub struct ArtContext {
    config: ArtConfig,
    api_level: ApiLevel,
    runtime: Runtime,
    suspend: SuspendAll,
    thread: Thread,
    debuggable: DebuggableState,
}

impl ArtContext {
    /// Binds all runtime internals.
    ///
    /// Components are initialized in dependency order. Only the runtime
    /// singleton is mandatory; a missing global pause or thread accessor
    /// leaves the corresponding capability degraded.
    pub fn new(binder: &dyn SymbolBinder, config: ArtConfig) -> Result<Self, ArtError> {
        let api_level = config.api_level.unwrap_or_else(|| binder.api_level());
        let binder = ApiLevelOverride {
            inner: binder,
            api_level,
        };

        tracing::debug!(%api_level, "initializing runtime context");

        let runtime = Runtime::new(&config);
        runtime.init(&binder)?;

        let suspend = SuspendAll::new();
        if let Err(err) = suspend.init(&binder) {
            tracing::warn!(%err, "global pause is degraded");
        }

        let thread = Thread::new();
        if let Err(err) = thread.init(&binder) {
            tracing::warn!(%err, "current thread lookup is unavailable");
        }

        Ok(Self {
            config,
            api_level,
            runtime,
            suspend,
            thread,
            debuggable: DebuggableState::new(),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ArtConfig {
        &self.config
    }

    /// Returns the effective API level.
    pub fn api_level(&self) -> ApiLevel {
        self.api_level
    }

    /// Returns the runtime handle.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Returns the thread handle.
    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    /// Returns the global pause entry points.
    pub fn suspend(&self) -> &SuspendAll {
        &self.suspend
    }

    /// Returns the debuggable holder count.
    pub fn debuggable_state(&self) -> &DebuggableState {
        &self.debuggable
    }

    /// Suspends all runtime threads until the returned guard is dropped.
    pub fn suspend_all<'a>(&'a self, cause: &'a CStr, long_suspend: bool) -> ScopedSuspendAll<'a> {
        self.suspend.suspend(cause, long_suspend)
    }

    /// Keeps the runtime debuggable until the returned guard is dropped.
    pub fn debuggable(&self) -> Result<DebuggableGuard<'_>, ArtError> {
        DebuggableGuard::acquire(&self.debuggable, &self.runtime)
    }
}
