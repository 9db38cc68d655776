//! Fuzz target for the experiment override parser.
//!
//! Feeds arbitrary text to the parser against a small registry and checks
//! that every stored override keeps the registered kind and name.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use expflag_core::{ConfigParser, FlagRegistry, StartupError};

/// Arbitrary config scenario.
#[derive(Debug, Arbitrary)]
struct FuzzConfig {
    /// Raw file contents
    text: String,
    /// Parse in strict mode
    strict: bool,
}

fuzz_target!(|data: FuzzConfig| {
    let mut registry = FlagRegistry::new();
    registry.register("enabled", false).unwrap();
    registry.register("depth", 0i32).unwrap();
    registry.register("limit", 0u32).unwrap();
    registry.register("ratio", 0.0f32).unwrap();

    match ConfigParser::new(&registry).strict(data.strict).parse_str(&data.text) {
        Ok(parsed) => {
            for flags in parsed.experiments.values() {
                for (id, flag) in flags {
                    let default = registry.get(*id).expect("override for unregistered flag");
                    assert_eq!(flag.name(), default.name());
                    assert_eq!(flag.value_type(), default.value_type());
                }
            }
            if data.strict {
                assert!(parsed.diagnostics.is_empty());
            }
        }
        Err(StartupError::DuplicateExperiment { line, .. }) => {
            assert!(line >= 2);
        }
        Err(StartupError::StrictViolation(_)) => assert!(data.strict),
        Err(other) => panic!("unexpected error: {other}"),
    }
});
