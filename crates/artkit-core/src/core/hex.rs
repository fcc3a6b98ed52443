/// A hexadecimal representation of a value.
///
/// This type is used to display addresses and offsets in log records.
///
/// # Examples
///
/// ```
/// # use artkit_core::Hex;
/// assert_eq!(format!("{}", Hex(42u16)), "0x002a");
/// assert_eq!(format!("{:?}", Hex(0xcafe_babeu32)), "0xcafebabe");
/// ```
pub struct Hex<T>(pub T);

macro_rules! impl_hex {
    ($($type:ty),*) => {
        $(
            impl ::std::fmt::Debug for Hex<$type> {
                fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                    fmt_hex(f, self.0)
                }
            }

            impl ::std::fmt::Display for Hex<$type> {
                fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                    fmt_hex(f, self.0)
                }
            }
        )*
    };
}

fn fmt_hex<T>(f: &mut ::std::fmt::Formatter, data: T) -> ::std::fmt::Result
where
    T: Copy + ::std::fmt::LowerHex,
{
    match size_of::<T>() {
        1 => write!(f, "0x{:02x}", data),
        2 => write!(f, "0x{:04x}", data),
        4 => write!(f, "0x{:08x}", data),
        8 => write!(f, "0x{:016x}", data),
        _ => write!(f, "0x{:x}", data),
    }
}

impl_hex!(u8, u16, u32, u64, usize);
