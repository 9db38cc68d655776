//! Experiment Environment
//!
//! The resolver. An [`ExpEnvironment`] owns the frozen flag registry and the
//! per-experiment override table, and answers "what is flag F under
//! experiment E" with a fixed fallback order:
//!
//! 1. no experiment id, or an invalid flag id: the flag's default
//! 2. unknown experiment id: warn, then the flag's default
//! 3. known experiment without an override for F: the flag's default
//! 4. known experiment with an override: the override
//!
//! "The flag's default" is the registered default, or the scalar zero value
//! with a warning when the flag id is not registered.
//!
//! The environment is immutable once built, so a shared reference can be
//! read from any number of threads.
//!
//! # Examples
//!
//! ```
//! use expflag_core::{ExpEnvironment, FlagRegistry};
//!
//! let mut registry = FlagRegistry::new();
//! let max_items = registry.register("max_items", 20i32).unwrap();
//!
//! let env = ExpEnvironment::from_config_str(registry, "[exp_a]\nmax_items = 42\n").unwrap();
//!
//! assert_eq!(env.get_int32(Some("exp_a"), max_items), 42);
//! assert_eq!(env.get_int32(Some("exp_b"), max_items), 20);
//! assert_eq!(env.get_int32(None, max_items), 20);
//! ```

use crate::error::{ConfigDiagnostic, Result, ResolutionWarning};
use crate::options::EnvironmentOptions;
use crate::parser::{ConfigParser, ExperimentMap, ParsedConfig};
use crate::registry::{Flag, FlagId, FlagMap, FlagRegistry, RawFlagId};
use crate::value::{FlagType, FlagValue};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

const TARGET: &str = "expflag::environment";

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// The experiment's override
    Override,
    /// The registered default
    Default,
    /// The scalar zero value, because no usable flag was found
    ZeroValue,
}

/// A resolved value with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub value: T,
    pub source: ValueSource,
    pub warnings: Vec<ResolutionWarning>,
}

impl<T: FlagType> Resolution<T> {
    fn new(value: T, source: ValueSource, warnings: Vec<ResolutionWarning>) -> Self {
        Self {
            value,
            source,
            warnings,
        }
    }

    fn zero(mut warnings: Vec<ResolutionWarning>, warning: ResolutionWarning) -> Self {
        warnings.push(warning);
        Self::new(T::default_value(), ValueSource::ZeroValue, warnings)
    }
}

/// One row of [`ExpEnvironment::entries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DumpEntry {
    /// `None` for the default map
    pub experiment: Option<String>,
    pub id: RawFlagId,
    pub name: String,
    pub value: FlagValue,
}

/// Frozen registry plus experiment overrides.
#[derive(Debug, Clone)]
pub struct ExpEnvironment {
    registry: Arc<FlagRegistry>,
    experiments: ExperimentMap,
    diagnostics: Vec<ConfigDiagnostic>,
}

impl ExpEnvironment {
    /// Build from an already parsed override table.
    pub fn new(registry: impl Into<Arc<FlagRegistry>>, parsed: ParsedConfig) -> Self {
        Self {
            registry: registry.into(),
            experiments: parsed.experiments,
            diagnostics: parsed.diagnostics,
        }
    }

    /// An environment with no experiments; every lookup yields defaults.
    pub fn defaults_only(registry: impl Into<Arc<FlagRegistry>>) -> Self {
        Self::new(registry, ParsedConfig::default())
    }

    /// Load overrides from `path`.
    pub fn load(registry: impl Into<Arc<FlagRegistry>>, path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(
            registry,
            &EnvironmentOptions::default().with_config_path(path),
        )
    }

    /// Load overrides as described by `options`.
    pub fn with_options(
        registry: impl Into<Arc<FlagRegistry>>,
        options: &EnvironmentOptions,
    ) -> Result<Self> {
        let registry = registry.into();
        let parsed = ConfigParser::new(&registry)
            .with_options(options.parse_options())
            .load(&options.config_path)?;
        Ok(Self::new(registry, parsed))
    }

    /// Parse overrides from text.
    pub fn from_config_str(registry: impl Into<Arc<FlagRegistry>>, content: &str) -> Result<Self> {
        let registry = registry.into();
        let parsed = ConfigParser::new(&registry).parse_str(content)?;
        Ok(Self::new(registry, parsed))
    }

    /// Resolve a flag and report how the value was chosen.
    pub fn resolve<T: FlagType>(
        &self,
        experiment_id: Option<&str>,
        flag_id: FlagId<T>,
    ) -> Resolution<T> {
        let raw = flag_id.raw();

        let Some(experiment_id) = experiment_id else {
            return self.resolve_default(raw, Vec::new());
        };
        if !raw.is_valid() {
            return self.resolve_default(raw, Vec::new());
        }

        let Some(overrides) = self.experiments.get(experiment_id) else {
            let warning = ResolutionWarning::UnknownExperiment(experiment_id.to_string());
            return self.resolve_default(raw, vec![warning]);
        };

        match overrides.get(&raw) {
            Some(flag) => Self::project(flag, ValueSource::Override, Vec::new()),
            None => self.resolve_default(raw, Vec::new()),
        }
    }

    fn resolve_default<T: FlagType>(
        &self,
        raw: RawFlagId,
        warnings: Vec<ResolutionWarning>,
    ) -> Resolution<T> {
        match self.registry.get(raw) {
            Some(flag) => Self::project(flag, ValueSource::Default, warnings),
            None if raw.is_valid() => {
                Resolution::zero(warnings, ResolutionWarning::UnknownFlag(raw))
            }
            None => Resolution::zero(warnings, ResolutionWarning::InvalidFlagId),
        }
    }

    fn project<T: FlagType>(
        flag: &Flag,
        source: ValueSource,
        warnings: Vec<ResolutionWarning>,
    ) -> Resolution<T> {
        match flag.value().get::<T>() {
            Some(value) => Resolution::new(value, source, warnings),
            None => Resolution::zero(
                warnings,
                ResolutionWarning::KindMismatch {
                    name: flag.name().to_string(),
                    requested: T::TYPE,
                    actual: flag.value_type(),
                },
            ),
        }
    }

    /// Effective value of a flag; warnings go to the diagnostic log.
    pub fn get<T: FlagType>(&self, experiment_id: Option<&str>, flag_id: FlagId<T>) -> T {
        let resolution = self.resolve(experiment_id, flag_id);
        for warning in &resolution.warnings {
            expflag_log::warn!(target: TARGET, "{}", warning);
        }
        resolution.value
    }

    pub fn get_bool(&self, experiment_id: Option<&str>, flag_id: FlagId<bool>) -> bool {
        self.get(experiment_id, flag_id)
    }

    pub fn get_int32(&self, experiment_id: Option<&str>, flag_id: FlagId<i32>) -> i32 {
        self.get(experiment_id, flag_id)
    }

    pub fn get_uint32(&self, experiment_id: Option<&str>, flag_id: FlagId<u32>) -> u32 {
        self.get(experiment_id, flag_id)
    }

    pub fn get_float(&self, experiment_id: Option<&str>, flag_id: FlagId<f32>) -> f32 {
        self.get(experiment_id, flag_id)
    }

    /// Effective tagged value for an untyped id, or `None` if the id is
    /// invalid or not registered. Same fallback order and warnings as
    /// [`ExpEnvironment::resolve`].
    pub fn value(&self, experiment_id: Option<&str>, flag_id: RawFlagId) -> Option<FlagValue> {
        let Some(default) = self.registry.get(flag_id) else {
            let warning = if flag_id.is_valid() {
                ResolutionWarning::UnknownFlag(flag_id)
            } else {
                ResolutionWarning::InvalidFlagId
            };
            expflag_log::warn!(target: TARGET, "{}", warning);
            return None;
        };

        let Some(experiment_id) = experiment_id else {
            return Some(default.value());
        };
        match self.experiments.get(experiment_id) {
            Some(overrides) => Some(overrides.get(&flag_id).unwrap_or(default).value()),
            None => {
                expflag_log::warn!(
                    target: TARGET,
                    "{}",
                    ResolutionWarning::UnknownExperiment(experiment_id.to_string())
                );
                Some(default.value())
            }
        }
    }

    pub fn registry(&self) -> &FlagRegistry {
        &self.registry
    }

    pub fn has_experiment(&self, experiment_id: &str) -> bool {
        self.experiments.contains_key(experiment_id)
    }

    /// Experiment ids in sorted order.
    pub fn experiment_ids(&self) -> impl Iterator<Item = &str> {
        self.experiments.keys().map(String::as_str)
    }

    pub fn overrides(&self, experiment_id: &str) -> Option<&FlagMap> {
        self.experiments.get(experiment_id)
    }

    /// Lines skipped while loading the override file.
    pub fn diagnostics(&self) -> &[ConfigDiagnostic] {
        &self.diagnostics
    }

    /// Every default, then every experiment's overrides.
    pub fn entries(&self) -> Vec<DumpEntry> {
        let defaults = self.registry.iter().map(|(id, flag)| (None, id, flag));
        let overrides = self.experiments.iter().flat_map(|(experiment, flags)| {
            flags
                .iter()
                .map(move |(id, flag)| (Some(experiment.as_str()), *id, flag))
        });

        defaults
            .chain(overrides)
            .map(|(experiment, id, flag)| DumpEntry {
                experiment: experiment.map(str::to_string),
                id,
                name: flag.name().to_string(),
                value: flag.value(),
            })
            .collect()
    }

    /// Log the default map and every experiment map.
    pub fn print_all(&self) {
        expflag_log::info!(target: TARGET, "-------- default flag map --------");
        Self::print_flag_map(self.registry.flags());
        for (experiment, flags) in &self.experiments {
            expflag_log::info!(target: TARGET, "-------- {} --------", experiment);
            Self::print_flag_map(flags);
        }
    }

    fn print_flag_map(flags: &FlagMap) {
        for flag in flags.values() {
            expflag_log::info!(
                target: TARGET,
                "{:<6}: {}={}",
                flag.value_type().as_str(),
                flag.name(),
                flag.value()
            );
        }
    }

    /// [`ExpEnvironment::entries`] as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries())
    }
}
