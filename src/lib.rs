//! Resolve and invoke unexported Android Runtime internals.
//!
//! artkit is meant for native code that runs inside an Android process and
//! needs to change runtime behavior no public API exposes, such as switching
//! the runtime into a debuggable state or suspending every managed thread
//! while code is being patched.
//!
//! The functionality is split across crates:
//!
//! - [`artkit_core`] provides symbol binding, typed entry-point handles and
//!   offset discovery, independent of any particular runtime.
//! - [`artkit_runtime`] (feature `runtime`) holds the knowledge about ART
//!   itself.
//!
//! # Examples
//!
//! ```no_run
//! use artkit::{ApiLevel, ArtError, DlBinder, runtime::{ArtConfig, ArtContext}};
//!
//! # fn example() -> Result<(), ArtError> {
//! let binder = DlBinder::libart(ApiLevel::U)?;
//! let context = ArtContext::new(&binder, ArtConfig::default())?;
//!
//! {
//!     let _pause = context.suspend_all(c"patch", false);
//!     let _debuggable = context.debuggable()?;
//!
//!     // Patch managed methods here.
//! }
//! # Ok(())
//! # }
//! ```

pub use artkit_core::*;
#[cfg(feature = "runtime")]
pub use artkit_runtime as runtime;
