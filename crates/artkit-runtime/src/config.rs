use artkit_core::{ApiLevel, offset::DEFAULT_SCRATCH_SIZE};
use serde::{Deserialize, Serialize};

/// What to do when the runtime singleton is NULL at the time its debuggable
/// state is changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullInstancePolicy {
    /// Log a warning and skip the mutation.
    #[default]
    Skip,

    /// Report [`ArtError::NullInstance`] to the caller.
    ///
    /// [`ArtError::NullInstance`]: artkit_core::ArtError::NullInstance
    Fail,
}

/// Configuration of an [`ArtContext`].
///
/// [`ArtContext`]: crate::ArtContext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtConfig {
    /// Overrides the API level reported by the symbol binder.
    pub api_level: Option<ApiLevel>,

    /// Behavior when the runtime singleton is NULL.
    pub null_instance: NullInstancePolicy,

    /// Size of the scratch region used for offset discovery.
    ///
    /// Values below [`DEFAULT_SCRATCH_SIZE`] are raised to it.
    pub scratch_size: usize,

    /// Pass the full debug state to `Runtime::SetRuntimeDebugState` on the
    /// live instance instead of writing the discovered field directly.
    pub direct_debug_state: bool,
}

impl Default for ArtConfig {
    fn default() -> Self {
        Self {
            api_level: None,
            null_instance: NullInstancePolicy::Skip,
            scratch_size: DEFAULT_SCRATCH_SIZE,
            direct_debug_state: false,
        }
    }
}

impl ArtConfig {
    /// Overrides the API level reported by the symbol binder.
    pub fn with_api_level(self, api_level: ApiLevel) -> Self {
        Self {
            api_level: Some(api_level),
            ..self
        }
    }

    /// Sets the behavior when the runtime singleton is NULL.
    pub fn with_null_instance(self, null_instance: NullInstancePolicy) -> Self {
        Self {
            null_instance,
            ..self
        }
    }

    /// Sets the size of the offset discovery scratch region.
    pub fn with_scratch_size(self, scratch_size: usize) -> Self {
        Self {
            scratch_size,
            ..self
        }
    }

    /// Enables or disables the direct `SetRuntimeDebugState` call.
    pub fn with_direct_debug_state(self, direct_debug_state: bool) -> Self {
        Self {
            direct_debug_state,
            ..self
        }
    }
}
