//! Integration tests for common expflag workflows.
//!
//! These tests verify that the most common use cases work correctly.

use expflag::log::{Level, MemorySink};
use expflag::prelude::*;
use std::sync::{Arc, Mutex};

// The log sink is process-wide; tests that swap it take turns.
static SINK_LOCK: Mutex<()> = Mutex::new(());

exp_flags! {
    struct FeedFlags {
        infinite_scroll: bool = false,
        items_per_page: u32 = 20,
        score_offset: i32 = -5,
        decay: f32 = 0.9,
    }
}

const OVERRIDES: &str = "\
[scroll_test]
infinite_scroll = true
items_per_page = 50

[decay_test]
decay = 0.5
score_offset = 12
";

fn environment() -> (ExpEnvironment, FeedFlags) {
    let mut registry = FlagRegistry::new();
    let flags = FeedFlags::register(&mut registry).unwrap();
    let env = ExpEnvironment::from_config_str(registry, OVERRIDES).unwrap();
    (env, flags)
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_experiment_overrides_and_defaults() {
    let (env, f) = environment();

    assert!(env.get_bool(Some("scroll_test"), f.infinite_scroll));
    assert_eq!(env.get_uint32(Some("scroll_test"), f.items_per_page), 50);
    assert_eq!(env.get_int32(Some("scroll_test"), f.score_offset), -5);
    assert_eq!(env.get_float(Some("scroll_test"), f.decay), 0.9);

    assert!(!env.get_bool(Some("decay_test"), f.infinite_scroll));
    assert_eq!(env.get_int32(Some("decay_test"), f.score_offset), 12);
    assert_eq!(env.get_float(Some("decay_test"), f.decay), 0.5);
}

#[test]
fn test_generic_getter_matches_typed_getters() {
    let (env, f) = environment();

    for experiment in [None, Some("scroll_test"), Some("decay_test"), Some("gone")] {
        assert_eq!(
            env.get(experiment, f.items_per_page),
            env.get_uint32(experiment, f.items_per_page)
        );
        assert_eq!(env.get(experiment, f.decay), env.get_float(experiment, f.decay));
    }
}

#[test]
fn test_resolution_sources() {
    let (env, f) = environment();

    assert_eq!(
        env.resolve(Some("scroll_test"), f.items_per_page).source,
        ValueSource::Override
    );
    assert_eq!(
        env.resolve(Some("decay_test"), f.items_per_page).source,
        ValueSource::Default
    );
    assert_eq!(env.resolve(None, f.items_per_page).source, ValueSource::Default);
    assert_eq!(
        env.resolve(Some("scroll_test"), FlagId::<u32>::invalid()).source,
        ValueSource::ZeroValue
    );
}

// =============================================================================
// Diagnostics
// =============================================================================

#[test]
fn test_lookup_warnings_reach_the_log_sink() {
    let _guard = SINK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let (env, f) = environment();
    let sink = Arc::new(MemorySink::new());
    let previous = expflag::log::set_sink(sink.clone());

    let value = env.get_uint32(Some("experiment_that_does_not_exist"), f.items_per_page);

    expflag::log::set_sink(previous);

    assert_eq!(value, 20);
    let warnings: Vec<_> = sink
        .records_for("expflag::environment")
        .into_iter()
        .filter(|r| r.level == Level::Warn)
        .collect();
    assert!(
        warnings
            .iter()
            .any(|r| r.message.contains("experiment_that_does_not_exist"))
    );
}

#[test]
fn test_untyped_lookup_warns_like_typed_lookup() {
    let _guard = SINK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let (env, f) = environment();
    let sink = Arc::new(MemorySink::new());
    let previous = expflag::log::set_sink(sink.clone());

    let invalid = env.value(Some("scroll_test"), expflag::RawFlagId::INVALID);
    let unknown = env.value(None, expflag::RawFlagId::for_name("never_registered"));
    let typed = env.resolve(Some("scroll_test"), FlagId::<u32>::invalid());
    let hit = env.value(Some("scroll_test"), f.items_per_page.raw());

    expflag::log::set_sink(previous);

    assert_eq!(invalid, None);
    assert_eq!(unknown, None);
    assert_eq!(typed.warnings, vec![ResolutionWarning::InvalidFlagId]);
    assert_eq!(hit, Some(FlagValue::Uint32(50)));

    let messages: Vec<_> = sink
        .records_for("expflag::environment")
        .into_iter()
        .filter(|r| r.level == Level::Warn)
        .map(|r| r.message)
        .collect();
    assert!(
        messages
            .iter()
            .any(|m| *m == ResolutionWarning::InvalidFlagId.to_string())
    );
    assert!(
        messages
            .iter()
            .any(|m| m.contains(&expflag::RawFlagId::for_name("never_registered").to_string()))
    );
}

#[test]
fn test_startup_errors_are_logged_as_fatal() {
    let _guard = SINK_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let sink = Arc::new(MemorySink::new());
    let previous = expflag::log::set_sink(sink.clone());

    let mut registry = FlagRegistry::new();
    registry.register("duplicated_for_fatal_log", 1u32).unwrap();
    let err = registry.register("duplicated_for_fatal_log", 2u32).unwrap_err();

    expflag::log::set_sink(previous);

    assert!(matches!(err, StartupError::DuplicateFlag { .. }));
    assert!(
        sink.records_for("expflag::registry")
            .iter()
            .any(|r| r.level == Level::Fatal && r.message.contains("duplicated_for_fatal_log"))
    );
}

// =============================================================================
// Inspection
// =============================================================================

#[test]
fn test_json_dump_lists_defaults_then_experiments() {
    let (env, _) = environment();
    let dump: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
    let rows = dump.as_array().unwrap();

    assert_eq!(rows.len(), 4 + 4);
    assert!(rows[..4].iter().all(|row| row["experiment"].is_null()));
    assert!(rows[4..6].iter().all(|row| row["experiment"] == "decay_test"));
    assert!(rows[6..].iter().all(|row| row["experiment"] == "scroll_test"));
}

#[test]
fn test_shared_across_threads() {
    let (env, f) = environment();
    let env = Arc::new(env);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let env = Arc::clone(&env);
            std::thread::spawn(move || env.get_uint32(Some("scroll_test"), f.items_per_page))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 50);
    }
}
