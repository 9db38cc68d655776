// Load options for the experiment environment

use crate::parser::ParseOptions;
use std::env;
use std::path::{Path, PathBuf};

/// Override file read by the process-wide environment.
pub const DEFAULT_CONFIG_PATH: &str = "exp.conf";

/// Environment variable prefix for every option.
pub const ENV_PREFIX: &str = "EXPFLAG";

/// Where the override file lives and how strictly it is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentOptions {
    pub config_path: PathBuf,
    pub strict: bool,
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            strict: false,
        }
    }
}

impl EnvironmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `EXPFLAG_CONFIG_PATH` and `EXPFLAG_STRICT`, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(path) = env::var(format!("{}_CONFIG_PATH", ENV_PREFIX))
            && !path.trim().is_empty()
        {
            options.config_path = PathBuf::from(path.trim());
        }

        if let Some(strict) = expflag_log::env_flag(&format!("{}_STRICT", ENV_PREFIX)) {
            options.strict = strict;
        }

        options
    }

    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = path.as_ref().to_path_buf();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            strict: self.strict,
        }
    }
}
