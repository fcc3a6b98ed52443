//! Typed handles to resolved runtime symbols.
//!
//! Each handle is declared up front with its [`Symbol`] and the signature it
//! is expected to have, and bound at most once through a [`SymbolBinder`].
//! Once resolution succeeded or definitively failed, the outcome is cached
//! for the lifetime of the handle.
//!
//! - [`Function`] is a free function (or a static member function).
//! - [`MemberFunction`] is a non-virtual member function. The receiver object
//!   is passed as the first argument, which is where the Itanium C++ ABI puts
//!   the implicit `this`.
//! - [`DataCell`] is a mutable global variable.

use std::{ffi::c_void, marker::PhantomData};

use once_cell::sync::OnceCell;

use crate::{Symbol, SymbolBinder, Va};

/// A function pointer type that can be produced from a raw address.
///
/// # Safety
///
/// Implementors must be pointer-sized function pointer types.
pub unsafe trait FnPtr: Copy + Send + Sync + 'static {
    /// Reinterprets an address as this function pointer type.
    ///
    /// # Safety
    ///
    /// The address must point to code with a matching signature and calling
    /// convention.
    unsafe fn from_va(va: Va) -> Self;
}

macro_rules! impl_fn_ptr {
    ($($arg:ident),*) => {
        // SAFETY: Function pointers are pointer-sized.
        unsafe impl<R, $($arg),*> FnPtr for unsafe extern "C" fn($($arg),*) -> R
        where
            R: 'static,
            $($arg: 'static,)*
        {
            unsafe fn from_va(va: Va) -> Self {
                // SAFETY: Upheld by the caller.
                unsafe { std::mem::transmute_copy::<usize, Self>(&va.0) }
            }
        }
    };
}

impl_fn_ptr!();
impl_fn_ptr!(A0);
impl_fn_ptr!(A0, A1);
impl_fn_ptr!(A0, A1, A2);
impl_fn_ptr!(A0, A1, A2, A3);

/// Common operations of all handles.
pub trait Resolve {
    /// Returns the symbol the handle binds to.
    fn symbol(&self) -> &Symbol;

    /// Binds the handle, returning whether it is bound afterwards.
    ///
    /// Only the first call consults the binder.
    fn resolve(&self, binder: &dyn SymbolBinder) -> bool;

    /// Checks whether the handle is bound.
    fn is_bound(&self) -> bool;
}

/// Binds all given handles and reports whether at least one of them is bound.
///
/// Used for capabilities that have several alternative entry points.
pub fn resolve_any(binder: &dyn SymbolBinder, handles: &[&dyn Resolve]) -> bool {
    handles
        .iter()
        .fold(false, |bound, handle| handle.resolve(binder) | bound)
}

/// One-shot resolution state shared by all handle kinds.
///
/// Empty means unresolved, `Some(None)` means resolution failed.
struct Slot {
    symbol: Symbol,
    address: OnceCell<Option<Va>>,
}

impl Slot {
    const fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            address: OnceCell::new(),
        }
    }

    fn resolve(&self, binder: &dyn SymbolBinder) -> bool {
        self.address
            .get_or_init(|| {
                let address = binder.find(&self.symbol);
                match address {
                    Some(address) => {
                        tracing::debug!(symbol = self.symbol.name, %address, "symbol resolved")
                    }
                    None => tracing::debug!(symbol = self.symbol.name, "symbol unresolved"),
                }
                address
            })
            .is_some()
    }

    fn address(&self) -> Option<Va> {
        self.address.get().copied().flatten()
    }
}

macro_rules! impl_handle {
    ($name:ident) => {
        impl<T> $name<T> {
            /// Creates an unresolved handle.
            pub const fn new(symbol: Symbol) -> Self {
                Self {
                    slot: Slot::new(symbol),
                    _marker: PhantomData,
                }
            }

            /// Binds the handle, returning whether it is bound afterwards.
            pub fn resolve(&self, binder: &dyn SymbolBinder) -> bool {
                self.slot.resolve(binder)
            }

            /// Checks whether the handle is bound.
            pub fn is_bound(&self) -> bool {
                self.slot.address().is_some()
            }

            /// Checks whether resolution was attempted, successfully or not.
            pub fn is_resolved(&self) -> bool {
                self.slot.address.get().is_some()
            }

            /// Returns the bound address.
            pub fn address(&self) -> Option<Va> {
                self.slot.address()
            }

            /// Returns the symbol the handle binds to.
            pub fn symbol(&self) -> &Symbol {
                &self.slot.symbol
            }
        }

        impl<T> Resolve for $name<T> {
            fn symbol(&self) -> &Symbol {
                &self.slot.symbol
            }

            fn resolve(&self, binder: &dyn SymbolBinder) -> bool {
                self.slot.resolve(binder)
            }

            fn is_bound(&self) -> bool {
                self.slot.address().is_some()
            }
        }

        impl<T> std::fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("symbol", &self.slot.symbol.name)
                    .field("address", &self.slot.address.get())
                    .finish()
            }
        }
    };
}

/// A handle to a free function.
pub struct Function<F> {
    slot: Slot,
    _marker: PhantomData<F>,
}

/// A handle to a non-virtual member function.
///
/// `F` includes the receiver as its first parameter.
pub struct MemberFunction<F> {
    slot: Slot,
    _marker: PhantomData<F>,
}

/// A handle to a mutable global variable of type `T`.
pub struct DataCell<T> {
    slot: Slot,
    _marker: PhantomData<fn() -> T>,
}

impl_handle!(Function);
impl_handle!(MemberFunction);
impl_handle!(DataCell);

impl<F> Function<F>
where
    F: FnPtr,
{
    /// Returns the bound function pointer.
    pub fn get(&self) -> Option<F> {
        // SAFETY: The handle was declared with the signature of the symbol.
        self.address().map(|va| unsafe { F::from_va(va) })
    }
}

impl<F> MemberFunction<F>
where
    F: FnPtr,
{
    /// Returns the bound function pointer.
    pub fn get(&self) -> Option<F> {
        // SAFETY: The handle was declared with the signature of the symbol.
        self.address().map(|va| unsafe { F::from_va(va) })
    }
}

macro_rules! impl_invoke {
    ($($arg:ident: $ty:ident),*) => {
        impl<R, $($ty),*> Function<unsafe extern "C" fn($($ty),*) -> R>
        where
            R: 'static,
            $($ty: 'static,)*
        {
            /// Calls the bound function.
            ///
            /// Returns `None` without calling anything if the handle is not
            /// bound.
            ///
            /// # Safety
            ///
            /// The arguments must satisfy the preconditions of the foreign
            /// function.
            pub unsafe fn invoke(&self, $($arg: $ty),*) -> Option<R> {
                let function = self.get()?;
                // SAFETY: Upheld by the caller.
                Some(unsafe { function($($arg),*) })
            }
        }

        impl<R, $($ty),*> MemberFunction<unsafe extern "C" fn(*mut c_void, $($ty),*) -> R>
        where
            R: 'static,
            $($ty: 'static,)*
        {
            /// Calls the bound member function on `this`.
            ///
            /// Returns `None` without calling anything if the handle is not
            /// bound.
            ///
            /// # Safety
            ///
            /// `this` must point to storage the foreign function may treat as
            /// an instance of its class, and the arguments must satisfy the
            /// preconditions of the foreign function.
            pub unsafe fn invoke(&self, this: *mut c_void, $($arg: $ty),*) -> Option<R> {
                let function = self.get()?;
                // SAFETY: Upheld by the caller.
                Some(unsafe { function(this, $($arg),*) })
            }
        }
    };
}

impl_invoke!();
impl_invoke!(a0: A0);
impl_invoke!(a0: A0, a1: A1);
impl_invoke!(a0: A0, a1: A1, a2: A2);

impl<T> DataCell<T> {
    /// Returns a pointer to the bound variable.
    pub fn as_ptr(&self) -> Option<*mut T> {
        self.address().map(Va::as_ptr)
    }

    /// Reads the bound variable.
    ///
    /// # Safety
    ///
    /// The variable must hold a valid `T` and must not be written
    /// concurrently.
    pub unsafe fn read(&self) -> Option<T>
    where
        T: Copy,
    {
        let ptr = self.as_ptr()?;
        // SAFETY: Upheld by the caller.
        Some(unsafe { ptr.read() })
    }

    /// Overwrites the bound variable, returning whether it was bound.
    ///
    /// # Safety
    ///
    /// The variable must not be accessed concurrently.
    pub unsafe fn write(&self, value: T) -> bool {
        let Some(ptr) = self.as_ptr() else {
            return false;
        };

        // SAFETY: Upheld by the caller.
        unsafe { ptr.write(value) };
        true
    }
}
