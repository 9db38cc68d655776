//! Process-wide flag store
//!
//! Call sites that cannot thread a registry through (library code declaring
//! its own flags) register into one process registry. Startup then performs
//! a single build-then-freeze step: [`init`] takes the registry, loads the
//! override file, and installs an immutable [`ExpEnvironment`]. From that
//! point on registration fails and every reader sees the same snapshot.
//!
//! ```no_run
//! use expflag_core::global;
//!
//! let max_items = global::register("max_items", 20i32).unwrap();
//!
//! // after every flag is registered, before serving requests
//! global::init_or_exit();
//!
//! let n = global::get_int32(Some("exp_a"), max_items);
//! ```

use crate::environment::ExpEnvironment;
use crate::error::{Result, StartupError};
use crate::options::EnvironmentOptions;
use crate::parser::ConfigParser;
use crate::registry::{FlagId, FlagRegistry};
use crate::value::FlagType;
use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard, OnceLock};

const TARGET: &str = "expflag::global";

/// `None` once the registry has been frozen into [`ENVIRONMENT`].
static REGISTRY: Lazy<Mutex<Option<FlagRegistry>>> =
    Lazy::new(|| Mutex::new(Some(FlagRegistry::new())));

static ENVIRONMENT: OnceLock<ExpEnvironment> = OnceLock::new();

fn registry() -> MutexGuard<'static, Option<FlagRegistry>> {
    REGISTRY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn report<T>(err: StartupError) -> Result<T> {
    expflag_log::fatal!(target: TARGET, "{}", err);
    Err(err)
}

/// Register a flag in the process registry.
pub fn register<T: FlagType>(name: &str, default: T) -> Result<FlagId<T>> {
    match registry().as_mut() {
        Some(registry) => registry.register(name, default),
        None => report(StartupError::RegistryFrozen {
            name: name.to_string(),
        }),
    }
}

/// Freeze the process registry and load overrides using
/// [`EnvironmentOptions::from_env`] (by default `exp.conf` in the working
/// directory).
pub fn init() -> Result<&'static ExpEnvironment> {
    init_with(&EnvironmentOptions::from_env())
}

/// Freeze the process registry and load overrides as described by
/// `options`.
///
/// If loading fails nothing is installed and the registry stays open, so
/// the caller may abort or fall back to [`init_defaults_only`].
pub fn init_with(options: &EnvironmentOptions) -> Result<&'static ExpEnvironment> {
    let mut slot = registry();
    let Some(frozen) = slot.take() else {
        return report(StartupError::AlreadyInitialized);
    };

    let parsed = ConfigParser::new(&frozen)
        .with_options(options.parse_options())
        .load(&options.config_path);

    match parsed {
        Ok(parsed) => install_locked(ExpEnvironment::new(frozen, parsed)),
        Err(err) => {
            *slot = Some(frozen);
            Err(err)
        }
    }
}

/// Freeze the process registry without any experiments.
pub fn init_defaults_only() -> Result<&'static ExpEnvironment> {
    let mut slot = registry();
    match slot.take() {
        Some(frozen) => install_locked(ExpEnvironment::defaults_only(frozen)),
        None => report(StartupError::AlreadyInitialized),
    }
}

/// Install an environment built elsewhere. The process registry is frozen
/// and discarded.
pub fn install(environment: ExpEnvironment) -> Result<&'static ExpEnvironment> {
    let mut slot = registry();
    slot.take();
    install_locked(environment)
}

// Callers hold the registry lock, which serializes initialization.
fn install_locked(environment: ExpEnvironment) -> Result<&'static ExpEnvironment> {
    let mut installed = false;
    let current = ENVIRONMENT.get_or_init(|| {
        installed = true;
        environment
    });

    if !installed {
        return report(StartupError::AlreadyInitialized);
    }

    expflag_log::debug!(
        target: TARGET,
        "experiment environment ready: {} flags, {} experiments",
        current.registry().len(),
        current.experiment_ids().count()
    );
    Ok(current)
}

/// [`init`], exiting the process with status 1 on failure.
pub fn init_or_exit() -> &'static ExpEnvironment {
    match init() {
        Ok(environment) => environment,
        Err(err) => {
            expflag_log::fatal!(target: TARGET, "startup aborted: {}", err);
            std::process::exit(1);
        }
    }
}

/// The installed environment, if initialization has happened.
pub fn environment() -> Option<&'static ExpEnvironment> {
    ENVIRONMENT.get()
}

pub fn is_initialized() -> bool {
    ENVIRONMENT.get().is_some()
}

/// Effective value through the installed environment. Before
/// initialization only registered defaults are visible.
pub fn get<T: FlagType>(experiment_id: Option<&str>, flag_id: FlagId<T>) -> T {
    if let Some(environment) = environment() {
        return environment.get(experiment_id, flag_id);
    }

    expflag_log::warn!(
        target: TARGET,
        "flag read before initialization, using registered default"
    );
    registry()
        .as_ref()
        .and_then(|registry| registry.default_of(flag_id))
        .unwrap_or_else(T::default_value)
}

pub fn get_bool(experiment_id: Option<&str>, flag_id: FlagId<bool>) -> bool {
    get(experiment_id, flag_id)
}

pub fn get_int32(experiment_id: Option<&str>, flag_id: FlagId<i32>) -> i32 {
    get(experiment_id, flag_id)
}

pub fn get_uint32(experiment_id: Option<&str>, flag_id: FlagId<u32>) -> u32 {
    get(experiment_id, flag_id)
}

pub fn get_float(experiment_id: Option<&str>, flag_id: FlagId<f32>) -> f32 {
    get(experiment_id, flag_id)
}

/// Dump the installed environment to the diagnostic log.
pub fn print_all() {
    match environment() {
        Some(environment) => environment.print_all(),
        None => expflag_log::warn!(target: TARGET, "print_all before initialization"),
    }
}
