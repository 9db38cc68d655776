//! Experiment Config Parser
//!
//! Reads the line-oriented override file:
//!
//! ```text
//! # comment line, ignored
//! [experiment_a]
//! max_items = 40
//! new_ranker = true
//!
//! [experiment_b]
//! max_items = 10
//! ```
//!
//! Structural problems (unreadable file, a section declared twice) are
//! fatal. Problems confined to one line are reported as
//! [`ConfigDiagnostic`]s and the line is skipped, unless the parser runs in
//! strict mode.

use crate::error::{ConfigDiagnostic, Result, StartupError};
use crate::registry::{FlagMap, FlagRegistry};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::Path;

const TARGET: &str = "expflag::parser";

/// Experiment id to its override flags.
pub type ExperimentMap = BTreeMap<String, FlagMap>;

/// Result of a successful load.
#[derive(Debug, Clone, Default)]
pub struct ParsedConfig {
    pub experiments: ExperimentMap,
    /// Skipped lines, in file order.
    pub diagnostics: Vec<ConfigDiagnostic>,
}

impl ParsedConfig {
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    pub fn override_count(&self) -> usize {
        self.experiments.values().map(|flags| flags.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parser options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Reject the file on the first line-level diagnostic.
    pub strict: bool,
}

/// Shape of one trimmed line.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Skip,
    Section(&'a str),
    Assignment { name: &'a str, value: &'a str },
    Malformed,
}

impl<'a> Line<'a> {
    fn classify(line: &'a str) -> Self {
        if line.is_empty() || line.starts_with('#') {
            return Line::Skip;
        }

        if let Some(inner) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return Line::Section(inner.trim());
        }

        match line.split_once('=') {
            Some((name, value)) => Line::Assignment {
                name: name.trim(),
                value: value.trim(),
            },
            None => Line::Malformed,
        }
    }
}

/// Builds the experiment override table against a registry.
pub struct ConfigParser<'a> {
    registry: &'a FlagRegistry,
    options: ParseOptions,
}

impl<'a> ConfigParser<'a> {
    pub fn new(registry: &'a FlagRegistry) -> Self {
        Self {
            registry,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    /// Load and parse the file at `path`.
    ///
    /// Only a missing or unreadable file is fatal. Bytes that are not valid
    /// UTF-8 are replaced, so they affect at most the lines they sit on.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ParsedConfig> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| {
            let err = StartupError::ConfigUnreadable {
                path: path.to_path_buf(),
                source,
            };
            expflag_log::fatal!(target: TARGET, "{}", err);
            err
        })?;

        let content = String::from_utf8_lossy(&bytes);
        let parsed = self.parse_str(&content)?;
        expflag_log::debug!(
            target: TARGET,
            "loaded {}: {} experiments, {} overrides, {} skipped lines",
            path.display(),
            parsed.experiment_count(),
            parsed.override_count(),
            parsed.diagnostics.len()
        );
        Ok(parsed)
    }

    /// Parse override text.
    pub fn parse_str(&self, content: &str) -> Result<ParsedConfig> {
        let mut parsed = ParsedConfig::default();
        let mut current: Option<String> = None;

        for (index, raw_line) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.trim();

            match Line::classify(line) {
                Line::Skip => {}
                Line::Section(id) => match parsed.experiments.entry(id.to_string()) {
                    Entry::Vacant(slot) => {
                        slot.insert(FlagMap::new());
                        current = Some(id.to_string());
                    }
                    Entry::Occupied(_) => {
                        let err = StartupError::DuplicateExperiment {
                            id: id.to_string(),
                            line: line_no,
                        };
                        expflag_log::fatal!(target: TARGET, "{}", err);
                        return Err(err);
                    }
                },
                Line::Malformed => {
                    self.report(
                        &mut parsed,
                        ConfigDiagnostic::MalformedLine {
                            line: line_no,
                            text: line.to_string(),
                        },
                    )?;
                }
                Line::Assignment { name, value } => {
                    let Some(flags) = current
                        .as_ref()
                        .and_then(|id| parsed.experiments.get_mut(id))
                    else {
                        self.report(
                            &mut parsed,
                            ConfigDiagnostic::FlagWithoutSection {
                                line: line_no,
                                text: line.to_string(),
                            },
                        )?;
                        continue;
                    };

                    match self.registry.lookup(name) {
                        // Same flag twice in one section: last assignment wins.
                        Some((id, default)) => {
                            flags.insert(id, default.with_raw_value(value));
                        }
                        None => {
                            self.report(
                                &mut parsed,
                                ConfigDiagnostic::UnregisteredFlag {
                                    line: line_no,
                                    name: name.to_string(),
                                },
                            )?;
                        }
                    }
                }
            }
        }

        Ok(parsed)
    }

    fn report(&self, parsed: &mut ParsedConfig, diagnostic: ConfigDiagnostic) -> Result<()> {
        if self.options.strict {
            let err = StartupError::StrictViolation(diagnostic);
            expflag_log::fatal!(target: TARGET, "{}", err);
            return Err(err);
        }

        expflag_log::warn!(target: TARGET, "{}", diagnostic);
        parsed.diagnostics.push(diagnostic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FlagId;
    use crate::value::FlagValue;

    struct Fixture {
        registry: FlagRegistry,
        max_items: FlagId<i32>,
        new_ranker: FlagId<bool>,
        limit: FlagId<u32>,
    }

    fn fixture() -> Fixture {
        let mut registry = FlagRegistry::new();
        let max_items = registry.register("max_items", 20i32).unwrap();
        let new_ranker = registry.register("new_ranker", false).unwrap();
        let limit = registry.register("limit", 5u32).unwrap();
        Fixture {
            registry,
            max_items,
            new_ranker,
            limit,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(Line::classify(""), Line::Skip);
        assert_eq!(Line::classify("# note"), Line::Skip);
        assert_eq!(Line::classify("[ exp_a ]"), Line::Section("exp_a"));
        assert_eq!(Line::classify("[]"), Line::Section(""));
        assert_eq!(
            Line::classify("a = b = c"),
            Line::Assignment {
                name: "a",
                value: "b = c"
            }
        );
        assert_eq!(Line::classify("[unterminated"), Line::Malformed);
        assert_eq!(Line::classify("no_equals_sign"), Line::Malformed);
    }

    #[test]
    fn test_parse_sections() {
        let f = fixture();
        let parsed = ConfigParser::new(&f.registry)
            .parse_str(
                "# header\n\
                 [exp_a]\n\
                 max_items = 42\n\
                 \tnew_ranker=true  \n\
                 \n\
                 [exp_b]\n\
                 limit = 9\n",
            )
            .unwrap();

        assert!(parsed.is_clean());
        assert_eq!(parsed.experiment_count(), 2);
        assert_eq!(parsed.override_count(), 3);

        let exp_a = &parsed.experiments["exp_a"];
        assert_eq!(exp_a[&f.max_items.raw()].value(), FlagValue::Int32(42));
        assert_eq!(exp_a[&f.new_ranker.raw()].value(), FlagValue::Bool(true));
        assert!(!exp_a.contains_key(&f.limit.raw()));

        let exp_b = &parsed.experiments["exp_b"];
        assert_eq!(exp_b[&f.limit.raw()].name(), "limit");
        assert_eq!(exp_b[&f.limit.raw()].value(), FlagValue::Uint32(9));
    }

    #[test]
    fn test_override_keeps_declared_kind() {
        let f = fixture();
        let parsed = ConfigParser::new(&f.registry)
            .parse_str("[exp]\nmax_items = 1.5\nnew_ranker = maybe\n")
            .unwrap();

        let exp = &parsed.experiments["exp"];
        assert_eq!(exp[&f.max_items.raw()].value(), FlagValue::Int32(0));
        assert_eq!(exp[&f.new_ranker.raw()].value(), FlagValue::Bool(false));
    }

    #[test]
    fn test_duplicate_section_is_fatal() {
        let f = fixture();
        let err = ConfigParser::new(&f.registry)
            .parse_str("[A]\nmax_items = 1\n[B]\n[ A ]\nmax_items = 2\n")
            .unwrap_err();

        match err {
            StartupError::DuplicateExperiment { id, line } => {
                assert_eq!(id, "A");
                assert_eq!(line, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_line_diagnostics_are_skipped() {
        let f = fixture();
        let parsed = ConfigParser::new(&f.registry)
            .parse_str(
                "max_items = 3\n\
                 [exp]\n\
                 garbage line\n\
                 unregistered_flag = 1\n\
                 max_items = 7\n",
            )
            .unwrap();

        assert_eq!(
            parsed.diagnostics,
            vec![
                ConfigDiagnostic::FlagWithoutSection {
                    line: 1,
                    text: "max_items = 3".to_string()
                },
                ConfigDiagnostic::MalformedLine {
                    line: 3,
                    text: "garbage line".to_string()
                },
                ConfigDiagnostic::UnregisteredFlag {
                    line: 4,
                    name: "unregistered_flag".to_string()
                },
            ]
        );
        assert_eq!(
            parsed.experiments["exp"][&f.max_items.raw()].value(),
            FlagValue::Int32(7)
        );
    }

    #[test]
    fn test_reassignment_overwrites() {
        let f = fixture();
        let parsed = ConfigParser::new(&f.registry)
            .parse_str("[exp]\nlimit = 1\nlimit = 2\n")
            .unwrap();

        assert!(parsed.is_clean());
        assert_eq!(parsed.override_count(), 1);
        assert_eq!(
            parsed.experiments["exp"][&f.limit.raw()].value(),
            FlagValue::Uint32(2)
        );
    }

    #[test]
    fn test_strict_mode_rejects_first_diagnostic() {
        let f = fixture();
        let err = ConfigParser::new(&f.registry)
            .strict(true)
            .parse_str("[exp]\nlimit = 1\nmystery = 2\n")
            .unwrap_err();

        assert!(matches!(
            err,
            StartupError::StrictViolation(ConfigDiagnostic::UnregisteredFlag { line: 3, .. })
        ));
    }

    #[test]
    fn test_crlf_input() {
        let f = fixture();
        let parsed = ConfigParser::new(&f.registry)
            .parse_str("[exp]\r\nlimit = 12\r\n")
            .unwrap();
        assert_eq!(
            parsed.experiments["exp"][&f.limit.raw()].value(),
            FlagValue::Uint32(12)
        );
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let f = fixture();
        let err = ConfigParser::new(&f.registry)
            .load("/nonexistent/expflag/exp.conf")
            .unwrap_err();
        assert!(matches!(err, StartupError::ConfigUnreadable { .. }));
    }
}
