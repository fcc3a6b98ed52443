//! Field offset discovery.
//!
//! Some runtime fields can only be located by observing a side effect: an
//! unexported setter writes a known value into its receiver, so calling that
//! setter on a zero-filled scratch region and scanning the region for the
//! value reveals the offset of the field. The same offset is then used for
//! direct writes into the live instance.
//!
//! The scratch region must be large enough to contain the real object, since
//! the foreign setter is free to touch any of its fields.

use std::ffi::c_void;

use memchr::memmem;
use once_cell::sync::OnceCell;
use zerocopy::{Immutable, IntoBytes};

use crate::Hex;

/// Default size of the scratch region.
pub const DEFAULT_SCRATCH_SIZE: usize = 4096;

/// Finds the first occurrence of `needle` in `haystack` at an offset that is
/// a multiple of `stride`.
///
/// Returns `None` for an empty needle or a zero stride.
///
/// # Examples
///
/// ```
/// # use artkit_core::offset::scan_for;
/// let haystack = [0, 1, 0, 0, 1, 0, 0, 0];
/// assert_eq!(scan_for(&haystack, &[1, 0, 0, 0], 1), Some(1));
/// assert_eq!(scan_for(&haystack, &[1, 0, 0, 0], 4), Some(4));
/// assert_eq!(scan_for(&haystack, &[2], 1), None);
/// ```
pub fn scan_for(haystack: &[u8], needle: &[u8], stride: usize) -> Option<usize> {
    if needle.is_empty() || stride == 0 {
        return None;
    }

    // Occurrences may overlap, so a misaligned hit only advances the search
    // by one byte.
    let finder = memmem::Finder::new(needle);
    let mut start = 0;
    while let Some(found) = finder.find(&haystack[start..]) {
        let offset = start + found;
        if offset % stride == 0 {
            return Some(offset);
        }

        start = offset + 1;
    }

    None
}

/// A field offset discovered at most once.
///
/// The first caller of [`discover`] runs the probe; concurrent callers block
/// until it finishes and all callers observe the same outcome. A failed
/// discovery is permanent.
///
/// [`discover`]: Self::discover
pub struct OffsetProbe {
    field: &'static str,
    offset: OnceCell<Option<usize>>,
}

impl OffsetProbe {
    /// Creates a probe for the named field.
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            offset: OnceCell::new(),
        }
    }

    /// Returns the discovered offset, without attempting discovery.
    pub fn offset(&self) -> Option<usize> {
        self.offset.get().copied().flatten()
    }

    /// Checks whether discovery was attempted.
    pub fn is_attempted(&self) -> bool {
        self.offset.get().is_some()
    }

    /// Discovers the offset of the field, or returns the cached outcome.
    ///
    /// On the first call, allocates a zero-filled scratch region of
    /// `scratch_size` bytes (aligned to 8 bytes) and calls `probe` with its
    /// address and `value`. The probe returns `false` if it could not run at
    /// all (for example, because the setter is not bound). The region is then
    /// scanned for the bytes of `value` at the natural alignment of `T`.
    ///
    /// `value` must not be all zero bytes, otherwise it is indistinguishable
    /// from the untouched scratch region. A region too small to hold `value`
    /// is never passed to `probe`.
    pub fn discover<T, F>(&self, scratch_size: usize, value: T, probe: F) -> Option<usize>
    where
        T: IntoBytes + Immutable + Copy,
        F: FnOnce(*mut c_void, T) -> bool,
    {
        *self
            .offset
            .get_or_init(|| self.run(scratch_size, value, probe))
    }

    fn run<T, F>(&self, scratch_size: usize, value: T, probe: F) -> Option<usize>
    where
        T: IntoBytes + Immutable + Copy,
        F: FnOnce(*mut c_void, T) -> bool,
    {
        let pattern = value.as_bytes();
        if pattern.iter().all(|&byte| byte == 0) {
            tracing::error!(field = self.field, "probe value is indistinguishable from zero");
            return None;
        }

        if scratch_size < pattern.len() {
            tracing::error!(field = self.field, scratch_size, "scratch region is too small");
            return None;
        }

        let mut scratch = vec![0u64; scratch_size.div_ceil(size_of::<u64>())];
        let receiver = scratch.as_mut_bytes().as_mut_ptr().cast::<c_void>();

        if !probe(receiver, value) {
            tracing::warn!(field = self.field, "probe unavailable, cannot discover offset");
            return None;
        }

        let scratch = &scratch.as_bytes()[..scratch_size];
        match scan_for(scratch, pattern, align_of::<T>()) {
            Some(offset) => {
                tracing::debug!(field = self.field, offset = %Hex(offset), "offset discovered");
                Some(offset)
            }
            None => {
                tracing::error!(field = self.field, scratch_size, "failed to discover offset");
                None
            }
        }
    }
}

impl std::fmt::Debug for OffsetProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffsetProbe")
            .field("field", &self.field)
            .field("offset", &self.offset.get())
            .finish()
    }
}
