use std::{ffi::c_void, ptr::NonNull};

use super::macros::impl_ops;

impl_ops!(Va, usize, "Virtual address inside the current process");

impl Va {
    /// Checks if the virtual address is NULL.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Creates a virtual address from a raw pointer.
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// Returns the address as a raw pointer.
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Returns the address as a non-null pointer, or `None` if it is NULL.
    pub fn as_non_null(self) -> Option<NonNull<c_void>> {
        NonNull::new(self.as_ptr())
    }
}
