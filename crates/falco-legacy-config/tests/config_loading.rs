// crates/falco-legacy-config/tests/config_loading.rs
// ============================================================================
// Module: Config Loading Tests
// Description: Validate defaults, parsing, and fail-closed validation.
// Purpose: Ensure falco-legacy.toml semantics stay stable.
// Dependencies: falco-legacy-config, tempfile
// ============================================================================

//! ## Overview
//! Integration tests for loading and validating compiler settings.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use falco_legacy_config::CompilerConfig;
use falco_legacy_config::ConfigError;
use falco_legacy_config::SkipLogTarget;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<CompilerConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(ConfigError::Invalid(message)) if message.contains(needle) => Ok(()),
        Err(other) => Err(format!("error {other} did not contain {needle}")),
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn empty_document_yields_legacy_defaults() -> TestResult {
    let config = CompilerConfig::from_toml_str("").map_err(|err| err.to_string())?;
    if config != CompilerConfig::default() {
        return Err("empty config should equal defaults".to_string());
    }
    let paths = config.input_paths();
    let expected: Vec<PathBuf> =
        ["falco_tests.yaml", "falco_tests_exceptions.yaml", "falco_traces.yaml"]
            .iter()
            .map(|file| PathBuf::from("./generated/falco-0.33.1/test").join(file))
            .collect();
    if paths != expected {
        return Err(format!("unexpected default inputs: {paths:?}"));
    }
    if config.identifiers.strip_prefixes != ["rules/", "trace_files/", "confs/"] {
        return Err("unexpected default strip prefixes".to_string());
    }
    if !config.compile.parallel {
        return Err("parallel compilation should default to true".to_string());
    }
    if config.diagnostics.skip_log != SkipLogTarget::Stderr {
        return Err("skip log should default to stderr".to_string());
    }
    Ok(())
}

#[test]
fn sections_override_defaults() -> TestResult {
    let config = CompilerConfig::from_toml_str(
        r#"
[input]
base_dir = "fixtures"
files = ["one.yaml"]

[identifiers]
rules_namespace = "ruleset"
strip_prefixes = ["rules/"]

[compile]
parallel = false

[diagnostics]
skip_log = "none"
"#,
    )
    .map_err(|err| err.to_string())?;
    if config.input_paths() != vec![PathBuf::from("fixtures/one.yaml")] {
        return Err("input override not applied".to_string());
    }
    if config.identifiers.rules_namespace != "ruleset" {
        return Err("namespace override not applied".to_string());
    }
    if config.identifiers.configs_namespace != "configs" {
        return Err("unset namespace should keep default".to_string());
    }
    if config.compile.parallel || config.diagnostics.skip_log != SkipLogTarget::None {
        return Err("compile/diagnostics overrides not applied".to_string());
    }
    Ok(())
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn empty_input_list_is_rejected() -> TestResult {
    assert_invalid(CompilerConfig::from_toml_str("[input]\nfiles = []\n"), "input.files")
}

#[test]
fn file_log_requires_path() -> TestResult {
    assert_invalid(
        CompilerConfig::from_toml_str("[diagnostics]\nskip_log = \"file\"\n"),
        "requires diagnostics.skip_log_path",
    )
}

#[test]
fn log_path_without_file_target_is_rejected() -> TestResult {
    assert_invalid(
        CompilerConfig::from_toml_str("[diagnostics]\nskip_log_path = \"skips.jsonl\"\n"),
        "only valid with",
    )
}

#[test]
fn zero_document_limit_is_rejected() -> TestResult {
    assert_invalid(
        CompilerConfig::from_toml_str("[compile]\nmax_document_bytes = 0\n"),
        "max_document_bytes",
    )
}

#[test]
fn non_identifier_namespace_is_rejected() -> TestResult {
    assert_invalid(
        CompilerConfig::from_toml_str("[identifiers]\ncaptures_namespace = \"cap-tures\"\n"),
        "captures_namespace",
    )
}

#[test]
fn malformed_toml_is_parse_error() -> TestResult {
    match CompilerConfig::from_toml_str("[input\nfiles = 3") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[test]
fn load_reads_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("falco-legacy.toml");
    fs::write(&path, "[output]\npath = \"out/bundle.json\"\n").unwrap();
    let config = CompilerConfig::load(Some(&path)).unwrap();
    assert_eq!(config.output.path, PathBuf::from("out/bundle.json"));
}

#[test]
fn load_rejects_oversized_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.toml");
    let mut content = String::from("# padding\n");
    content.push_str(&"#".repeat(1024 * 1024 + 1));
    fs::write(&path, content).unwrap();
    let err = CompilerConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("size limit"));
}

#[test]
fn load_rejects_non_utf8_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binary.toml");
    fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();
    let err = CompilerConfig::load(Some(&path)).unwrap_err();
    assert_eq!(err, ConfigError::Invalid("config file must be utf-8".to_string()));
}
