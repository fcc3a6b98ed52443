use crate::ApiLevel;

/// A mangled symbol inside the target runtime image.
///
/// A symbol has a primary name and an ordered list of aliases that are tried
/// when the primary name does not resolve (symbols get renamed between runtime
/// releases). It may also carry a minimum API level below which it is never
/// looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    /// The primary mangled name.
    pub name: &'static str,

    /// Alternative names, in priority order.
    pub aliases: &'static [&'static str],

    /// The lowest API level on which the symbol exists.
    pub min_api: Option<ApiLevel>,
}

impl Symbol {
    /// Creates a symbol with no aliases and no API gate.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            min_api: None,
        }
    }

    /// Returns a copy of the symbol with the given aliases.
    pub const fn with_aliases(self, aliases: &'static [&'static str]) -> Self {
        Self { aliases, ..self }
    }

    /// Returns a copy of the symbol gated on the given API level.
    pub const fn since(self, api_level: ApiLevel) -> Self {
        Self {
            min_api: Some(api_level),
            ..self
        }
    }

    /// Checks whether the symbol may exist on the given API level.
    pub fn is_available(&self, api_level: ApiLevel) -> bool {
        self.min_api.is_none_or(|min_api| api_level >= min_api)
    }

    /// Returns the primary name followed by the aliases.
    pub fn candidates(&self) -> impl Iterator<Item = &'static str> + use<> {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Declares [`Symbol`] constants.
///
/// Each entry is `NAME = "primary" [| "alias"]* [, since = API_LEVEL];`.
///
/// # Examples
///
/// ```
/// use artkit_core::{ApiLevel, symbols};
///
/// symbols! {
///     /// `art::Runtime::instance_`
///     pub RUNTIME_INSTANCE = "_ZN3art7Runtime9instance_E";
///
///     pub SUSPEND_VM = "_ZN3art3Dbg9SuspendVMEv" | "_ZN3art3Dbg9SuspendVMEb";
///
///     pub SET_JAVA_DEBUGGABLE = "_ZN3art7Runtime17SetJavaDebuggableEb", since = ApiLevel::O;
/// }
///
/// assert_eq!(SUSPEND_VM.candidates().count(), 2);
/// assert_eq!(SET_JAVA_DEBUGGABLE.min_api, Some(ApiLevel::O));
/// assert!(RUNTIME_INSTANCE.aliases.is_empty());
/// ```
#[macro_export]
macro_rules! symbols {
    (
        $(
            $(#[$meta:meta])*
            $vis:vis $ident:ident = $name:literal $( | $alias:literal )* $( , since = $api:expr )? ;
        )*
    ) => {
        $(
            $(#[$meta])*
            $vis const $ident: $crate::Symbol = $crate::Symbol {
                name: $name,
                aliases: &[$($alias),*],
                min_api: {
                    #[allow(unused_variables)]
                    let min_api: ::std::option::Option<$crate::ApiLevel> = None;
                    $( let min_api = Some($api); )?
                    min_api
                },
            };
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    symbols! {
        PLAIN = "plain";
        ALIASED = "first" | "second" | "third";
        GATED = "gated", since = ApiLevel::T;
    }

    #[test]
    fn candidates_preserve_priority_order() {
        assert_eq!(PLAIN.candidates().collect::<Vec<_>>(), ["plain"]);
        assert_eq!(
            ALIASED.candidates().collect::<Vec<_>>(),
            ["first", "second", "third"]
        );
    }

    #[test]
    fn api_gate() {
        assert!(PLAIN.is_available(ApiLevel(1)));
        assert!(!GATED.is_available(ApiLevel::S));
        assert!(GATED.is_available(ApiLevel::T));
        assert!(GATED.is_available(ApiLevel::U));
    }
}
