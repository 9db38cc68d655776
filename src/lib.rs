// Expflag - typed experiment flags with per-experiment overrides
//
// Flags are registered with a default value at startup, an override file
// assigns per-experiment values, and lookups fall back from override to
// default to the scalar zero value.

// Re-export core functionality
pub use expflag_core::*;

// Re-export the diagnostic log
pub use expflag_log as log;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ConfigDiagnostic, EnvironmentOptions, ExpEnvironment, FlagId, FlagRegistry, FlagType,
        FlagValue, FlagValueType, ResolutionWarning, StartupError, ValueSource, exp_flags, global,
    };
}
