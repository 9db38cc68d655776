// Error and diagnostic types for the flag store

use crate::registry::RawFlagId;
use crate::value::FlagValueType;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while registering flags or loading overrides.
///
/// These break the uniqueness invariants of the registry or the override
/// table and are expected to stop process startup.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Flag name must not be empty")]
    EmptyFlagName,

    #[error("Flag [{name}] is already registered")]
    DuplicateFlag { name: String },

    #[error("Flag [{name}] conflicts with [{existing}] (id {id})")]
    HashCollision {
        name: String,
        existing: String,
        id: RawFlagId,
    },

    #[error("Flag [{name}] hashes to the reserved invalid id")]
    ReservedId { name: String },

    #[error("Failed to read experiment config {}: {source}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Experiment id [{id}] declared again on line {line}")]
    DuplicateExperiment { id: String, line: usize },

    #[error("Strict load rejected config: {0}")]
    StrictViolation(ConfigDiagnostic),

    #[error("Experiment environment is already initialized")]
    AlreadyInitialized,

    #[error("Cannot register flag [{name}]: the registry is frozen")]
    RegistryFrozen { name: String },
}

pub type Result<T> = std::result::Result<T, StartupError>;

/// Recoverable problem with one line of the override file. The line is
/// skipped and parsing continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigDiagnostic {
    #[error("line {line}: illegal flag line (missing '='): {text}")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: flag line appears before any [experiment] section: {text}")]
    FlagWithoutSection { line: usize, text: String },

    #[error("line {line}: flag [{name}] is not registered")]
    UnregisteredFlag { line: usize, name: String },
}

impl ConfigDiagnostic {
    pub fn line(&self) -> usize {
        match self {
            ConfigDiagnostic::MalformedLine { line, .. }
            | ConfigDiagnostic::FlagWithoutSection { line, .. }
            | ConfigDiagnostic::UnregisteredFlag { line, .. } => *line,
        }
    }
}

/// Why a lookup fell back instead of returning an override.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionWarning {
    #[error("invalid flag id, using zero value")]
    InvalidFlagId,

    #[error("unknown experiment id [{0}], using default value")]
    UnknownExperiment(String),

    #[error("unknown flag id {0}, using zero value")]
    UnknownFlag(RawFlagId),

    #[error("flag [{name}] is {actual}, requested as {requested}; using zero value")]
    KindMismatch {
        name: String,
        requested: FlagValueType,
        actual: FlagValueType,
    },
}
