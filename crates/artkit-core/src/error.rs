/// An error that can occur when binding or invoking runtime internals.
#[derive(thiserror::Error, Debug)]
pub enum ArtError {
    /// A mandatory symbol could not be resolved.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(&'static str),

    /// The library that should provide the symbols is not loaded.
    #[error("Library not loaded: {library}")]
    LibraryNotLoaded {
        /// Name the library was looked up by.
        library: String,

        /// Dynamic linker failure.
        #[source]
        source: libloading::Error,
    },

    /// The runtime singleton instance is NULL.
    #[error("Runtime instance is NULL")]
    NullInstance,

    /// Neither the scoped pause nor the suspend/resume pair is available.
    #[error("Global pause is unavailable")]
    PauseUnavailable,
}
