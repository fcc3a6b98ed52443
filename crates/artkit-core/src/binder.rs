//! Symbol lookup.
//!
//! The [`SymbolBinder`] trait is the seam between this crate and whatever
//! mechanism locates symbols inside the target runtime image. A binder only
//! has to answer "where is this mangled name"; alias probing and API level
//! gating are implemented once, on top of [`lookup`].
//!
//! [`lookup`]: SymbolBinder::lookup

use std::ffi::c_void;

use libloading::os::unix::{Library, RTLD_NOW};

use crate::{ApiLevel, ArtError, Symbol, Va};

/// A trait for resolving mangled symbol names to addresses.
pub trait SymbolBinder: Send + Sync {
    /// Looks up a single mangled name.
    ///
    /// Returns `None` if the name is unknown to the binder.
    fn lookup(&self, name: &str) -> Option<Va>;

    /// Returns the API level of the platform the runtime belongs to.
    fn api_level(&self) -> ApiLevel;

    /// Resolves a symbol, honouring its API gate and aliases.
    ///
    /// Candidates are tried in priority order and the first non-NULL address
    /// wins.
    fn find(&self, symbol: &Symbol) -> Option<Va> {
        let api_level = self.api_level();
        if !symbol.is_available(api_level) {
            tracing::trace!(
                symbol = symbol.name,
                %api_level,
                "symbol gated by API level"
            );
            return None;
        }

        symbol.candidates().find_map(|name| {
            let va = self.lookup(name)?;
            if va.is_null() {
                return None;
            }

            if name != symbol.name {
                tracing::debug!(symbol = symbol.name, alias = name, "resolved through alias");
            }

            Some(va)
        })
    }
}

impl<T> SymbolBinder for &T
where
    T: SymbolBinder + ?Sized,
{
    fn lookup(&self, name: &str) -> Option<Va> {
        (**self).lookup(name)
    }

    fn api_level(&self) -> ApiLevel {
        (**self).api_level()
    }
}

/// A [`SymbolBinder`] backed by the dynamic linker.
///
/// Opens an already loaded library with `RTLD_NOLOAD` and resolves names with
/// `dlsym`. Only symbols present in the dynamic symbol table can be found.
pub struct DlBinder {
    library: Library,
    api_level: ApiLevel,
}

impl DlBinder {
    /// The library that hosts the Android Runtime.
    pub const LIBART: &'static str = "libart.so";

    /// Opens an already loaded library.
    ///
    /// Fails with [`ArtError::LibraryNotLoaded`] if the library is not mapped
    /// into the current process.
    pub fn open(library: &str, api_level: ApiLevel) -> Result<Self, ArtError> {
        // SAFETY: `RTLD_NOLOAD` never maps a new image, so no initializers run.
        let result = unsafe { Library::open(Some(library), RTLD_NOW | libc::RTLD_NOLOAD) };

        match result {
            Ok(handle) => {
                tracing::debug!(library, %api_level, "library opened");
                Ok(Self {
                    library: handle,
                    api_level,
                })
            }
            Err(err) => {
                tracing::error!(library, %err, "failed to open library");
                Err(ArtError::LibraryNotLoaded {
                    library: library.to_owned(),
                    source: err,
                })
            }
        }
    }

    /// Opens `libart.so`.
    pub fn libart(api_level: ApiLevel) -> Result<Self, ArtError> {
        Self::open(Self::LIBART, api_level)
    }
}

impl SymbolBinder for DlBinder {
    fn lookup(&self, name: &str) -> Option<Va> {
        // SAFETY: The address is only read as an opaque pointer value.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) };

        match symbol {
            Ok(symbol) => Some(Va::from_ptr(*symbol)).filter(|va| !va.is_null()),
            Err(err) => {
                tracing::trace!(symbol = name, %err, "dlsym failed");
                None
            }
        }
    }

    fn api_level(&self) -> ApiLevel {
        self.api_level
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::symbols;

    struct MapBinder {
        symbols: HashMap<&'static str, Va>,
        api_level: ApiLevel,
    }

    impl SymbolBinder for MapBinder {
        fn lookup(&self, name: &str) -> Option<Va> {
            self.symbols.get(name).copied()
        }

        fn api_level(&self) -> ApiLevel {
            self.api_level
        }
    }

    symbols! {
        RENAMED = "_ZN3art3NewEv" | "_ZN3art3OldEv" | "_ZN3art5OlderEv";
        GATED = "_ZN3art5GatedEv", since = ApiLevel::O;
        NULL = "_ZN3art4NullEv" | "_ZN3art7NonNullEv";
    }

    fn binder(api_level: ApiLevel, symbols: &[(&'static str, usize)]) -> MapBinder {
        MapBinder {
            symbols: symbols.iter().map(|&(name, va)| (name, Va(va))).collect(),
            api_level,
        }
    }

    #[test]
    fn first_resolving_alias_wins() {
        let binder = binder(
            ApiLevel::U,
            &[("_ZN3art3OldEv", 0x2000), ("_ZN3art5OlderEv", 0x3000)],
        );
        assert_eq!(binder.find(&RENAMED), Some(Va(0x2000)));
    }

    #[test]
    fn primary_name_preferred() {
        let binder = binder(
            ApiLevel::U,
            &[("_ZN3art3NewEv", 0x1000), ("_ZN3art3OldEv", 0x2000)],
        );
        assert_eq!(binder.find(&RENAMED), Some(Va(0x1000)));
    }

    #[test]
    fn api_gate_hides_symbol() {
        let symbols = [("_ZN3art5GatedEv", 0x1000)];
        assert_eq!(binder(ApiLevel::N, &symbols).find(&GATED), None);
        assert_eq!(binder(ApiLevel::O, &symbols).find(&GATED), Some(Va(0x1000)));
    }

    #[test]
    fn null_address_counts_as_unresolved() {
        let binder = binder(
            ApiLevel::U,
            &[("_ZN3art4NullEv", 0), ("_ZN3art7NonNullEv", 0x4000)],
        );
        assert_eq!(binder.find(&NULL), Some(Va(0x4000)));
    }

    #[test]
    fn missing_library_is_reported() {
        let result = DlBinder::open("libdefinitely-not-loaded-artkit.so", ApiLevel::U);
        assert!(matches!(result, Err(ArtError::LibraryNotLoaded { .. })));
    }

    #[test]
    fn interior_nul_is_reported_as_not_loaded() {
        let result = DlBinder::open("libart\0.so", ApiLevel::U);
        assert!(matches!(result, Err(ArtError::LibraryNotLoaded { .. })));
    }
}
