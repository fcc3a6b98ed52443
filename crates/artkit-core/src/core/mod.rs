mod address;
mod hex;
pub(crate) mod macros;

pub use self::{address::Va, hex::Hex};
