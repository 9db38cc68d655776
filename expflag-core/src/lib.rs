//! Experiment Flags
//!
//! A layered flag store: typed flags with registered defaults, plus
//! per-experiment overrides loaded from a text file at startup.
//!
//! # Features
//!
//! - **Typed flags** - `bool`, `i32`, `u32` and `f32` values behind one tagged type
//! - **Registry** - defaults keyed by a stable hash of the flag name
//! - **Override file** - `[experiment]` sections of `name = value` lines
//! - **Resolver** - defined fallback from override to default to zero value
//! - **Build-then-freeze** - an immutable environment shared across threads
//!
//! # Quick Start
//!
//! ```
//! use expflag_core::*;
//!
//! let mut registry = FlagRegistry::new();
//! let new_ui = registry.register("new_ui", false).unwrap();
//! let timeout = registry.register("timeout_ms", 250u32).unwrap();
//!
//! let env = ExpEnvironment::from_config_str(
//!     registry,
//!     "# rollout\n[beta]\nnew_ui = true\n",
//! )
//! .unwrap();
//!
//! assert!(env.get_bool(Some("beta"), new_ui));
//! assert_eq!(env.get_uint32(Some("beta"), timeout), 250);
//! assert!(!env.get_bool(None, new_ui));
//! ```
//!
//! # Errors
//!
//! Registration conflicts, an unreadable override file and a repeated
//! experiment section are [`StartupError`]s. Line-level problems in the
//! override file ([`ConfigDiagnostic`]) and lookup misses
//! ([`ResolutionWarning`]) are logged and resolved to a safe value.

pub mod environment;
pub mod error;
pub mod global;
pub mod macros;
pub mod options;
pub mod parser;
pub mod registry;
pub mod value;

pub use environment::{DumpEntry, ExpEnvironment, Resolution, ValueSource};
pub use error::{ConfigDiagnostic, ResolutionWarning, Result, StartupError};
pub use options::{DEFAULT_CONFIG_PATH, EnvironmentOptions};
pub use parser::{ConfigParser, ExperimentMap, ParseOptions, ParsedConfig};
pub use registry::{Flag, FlagId, FlagMap, FlagRegistry, RawFlagId};
pub use value::{FlagType, FlagValue, FlagValueType};
