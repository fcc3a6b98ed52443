use std::{collections::HashMap, ffi::c_void};

use artkit_core::{ApiLevel, Symbol, SymbolBinder, Va};

///////////////////////////////////////////////////////////////////////////////
// Mock Binder
///////////////////////////////////////////////////////////////////////////////

pub(crate) struct MockBinder {
    symbols: HashMap<&'static str, Va>,
    api_level: ApiLevel,
}

impl MockBinder {
    pub(crate) fn new(api_level: ApiLevel) -> Self {
        Self {
            symbols: HashMap::new(),
            api_level,
        }
    }

    pub(crate) fn with(mut self, symbol: Symbol, address: usize) -> Self {
        self.symbols.insert(symbol.name, Va(address));
        self
    }

    pub(crate) fn with_runtime(self, runtime: &FakeRuntime) -> Self {
        self.with(crate::runtime::RUNTIME_INSTANCE, runtime.cell as usize)
    }
}

impl SymbolBinder for MockBinder {
    fn lookup(&self, name: &str) -> Option<Va> {
        self.symbols.get(name).copied()
    }

    fn api_level(&self) -> ApiLevel {
        self.api_level
    }
}

///////////////////////////////////////////////////////////////////////////////
// Fake Runtime
///////////////////////////////////////////////////////////////////////////////

/// A zeroed, leaked stand-in for `art::Runtime` and the `instance_` cell
/// pointing at it.
pub(crate) struct FakeRuntime {
    pub(crate) object: *mut u8,
    pub(crate) cell: *mut *mut c_void,
}

// SAFETY: Both allocations are leaked and only accessed through raw pointers.
unsafe impl Send for FakeRuntime {}
unsafe impl Sync for FakeRuntime {}

impl FakeRuntime {
    pub(crate) const SIZE: usize = 1024;

    pub(crate) fn new() -> Self {
        let object = Box::leak(vec![0u64; Self::SIZE / 8].into_boxed_slice())
            .as_mut_ptr()
            .cast::<u8>();

        Self {
            object,
            cell: Box::into_raw(Box::new(object.cast::<c_void>())),
        }
    }

    /// An `instance_` cell that holds NULL.
    pub(crate) fn null() -> Self {
        Self {
            object: std::ptr::null_mut(),
            cell: Box::into_raw(Box::new(std::ptr::null_mut())),
        }
    }

    pub(crate) fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= Self::SIZE);
        unsafe { self.object.add(offset).cast::<u32>().read_unaligned() }
    }
}

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}
