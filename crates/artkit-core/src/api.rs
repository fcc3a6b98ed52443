use serde::{Deserialize, Serialize};

/// Android platform API level.
///
/// Used as a gate for symbols that only exist on newer runtime builds.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ApiLevel(pub u32);

impl ApiLevel {
    /// Android 7.0.
    pub const N: Self = Self(24);
    /// Android 8.0.
    pub const O: Self = Self(26);
    /// Android 9.
    pub const P: Self = Self(28);
    /// Android 10.
    pub const Q: Self = Self(29);
    /// Android 11.
    pub const R: Self = Self(30);
    /// Android 12.
    pub const S: Self = Self(31);
    /// Android 13.
    pub const T: Self = Self(33);
    /// Android 14.
    pub const U: Self = Self(34);
    /// Android 15.
    pub const V: Self = Self(35);
}

impl From<u32> for ApiLevel {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ApiLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
