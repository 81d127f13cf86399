// crates/falco-legacy-config/src/config.rs
// ============================================================================
// Module: Compiler Configuration
// Description: Configuration loading and validation for the legacy compiler.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section defaults to the historical migration behavior,
//! so an empty file (or no file at all) compiles the three historical
//! regression documents from `./generated/falco-0.33.1/test`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "falco-legacy.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FALCO_LEGACY_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of input documents per run.
pub(crate) const MAX_INPUT_FILES: usize = 64;
/// Maximum number of directory prefixes stripped from file references.
pub(crate) const MAX_STRIP_PREFIXES: usize = 32;
/// Maximum length of an identifier namespace.
pub(crate) const MAX_NAMESPACE_LENGTH: usize = 64;
/// Default maximum size of one legacy YAML document.
pub(crate) const DEFAULT_MAX_DOCUMENT_BYTES: usize = 8 * 1024 * 1024;
/// Upper bound for `compile.max_document_bytes`.
pub(crate) const MAX_MAX_DOCUMENT_BYTES: usize = 64 * 1024 * 1024;
/// Default directory holding the legacy documents.
pub(crate) const DEFAULT_INPUT_DIR: &str = "./generated/falco-0.33.1/test";
/// Legacy documents compiled by default, in compilation order.
pub(crate) const DEFAULT_INPUT_FILES: [&str; 3] =
    ["falco_tests.yaml", "falco_tests_exceptions.yaml", "falco_traces.yaml"];
/// Default descriptor bundle output path.
pub(crate) const DEFAULT_OUTPUT_PATH: &str = "generated/legacy_descriptors.json";
/// Directory prefixes stripped from file references by default.
pub(crate) const DEFAULT_STRIP_PREFIXES: [&str; 3] = ["rules/", "trace_files/", "confs/"];

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Legacy test compiler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompilerConfig {
    /// Input document selection.
    #[serde(default)]
    pub input: InputConfig,
    /// Descriptor bundle output.
    #[serde(default)]
    pub output: OutputConfig,
    /// File reference to identifier mapping.
    #[serde(default)]
    pub identifiers: IdentifierConfig,
    /// Batch compilation behavior.
    #[serde(default)]
    pub compile: CompileConfig,
    /// Skip notice routing.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl CompilerConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// An explicit path or the [`CONFIG_ENV_VAR`] override must exist. When
    /// neither is given and [`DEFAULT_CONFIG_NAME`] is absent from the working
    /// directory, the built-in defaults are returned.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(resolved) = resolve_path(path)? else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        check_path("config path", &resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.input.validate()?;
        self.output.validate()?;
        self.identifiers.validate()?;
        self.compile.validate()?;
        self.diagnostics.validate()?;
        Ok(())
    }

    /// Returns the input document paths joined onto the base directory.
    #[must_use]
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.input.files.iter().map(|file| self.input.base_dir.join(file)).collect()
    }
}

/// Input document selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputConfig {
    /// Directory the document names are resolved against.
    #[serde(default = "default_input_dir")]
    pub base_dir: PathBuf,
    /// Document file names, compiled in the listed order.
    #[serde(default = "default_input_files")]
    pub files: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            base_dir: default_input_dir(),
            files: default_input_files(),
        }
    }
}

impl InputConfig {
    /// Validates input configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        check_path("input.base_dir", &self.base_dir)?;
        if self.files.is_empty() {
            return Err(ConfigError::Invalid("input.files must be non-empty".to_string()));
        }
        if self.files.len() > MAX_INPUT_FILES {
            return Err(ConfigError::Invalid("input.files too many entries".to_string()));
        }
        for file in &self.files {
            check_path("input.files", Path::new(file))?;
        }
        Ok(())
    }
}

/// Descriptor bundle output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Path of the JSON descriptor bundle.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

impl OutputConfig {
    /// Validates output configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        check_path("output.path", &self.path)?;
        if self.path.file_name().is_none() {
            return Err(ConfigError::Invalid("output.path must name a file".to_string()));
        }
        Ok(())
    }
}

/// File reference to identifier mapping.
///
/// # Invariants
/// - Namespaces are ASCII identifiers once validated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentifierConfig {
    /// Namespace qualifying rules file identifiers.
    #[serde(default = "default_rules_namespace")]
    pub rules_namespace: String,
    /// Namespace qualifying configuration file identifiers.
    #[serde(default = "default_configs_namespace")]
    pub configs_namespace: String,
    /// Namespace qualifying capture file identifiers.
    #[serde(default = "default_captures_namespace")]
    pub captures_namespace: String,
    /// Directory prefixes removed from references, applied in order.
    #[serde(default = "default_strip_prefixes")]
    pub strip_prefixes: Vec<String>,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            rules_namespace: default_rules_namespace(),
            configs_namespace: default_configs_namespace(),
            captures_namespace: default_captures_namespace(),
            strip_prefixes: default_strip_prefixes(),
        }
    }
}

impl IdentifierConfig {
    /// Validates identifier configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_namespace("identifiers.rules_namespace", &self.rules_namespace)?;
        validate_namespace("identifiers.configs_namespace", &self.configs_namespace)?;
        validate_namespace("identifiers.captures_namespace", &self.captures_namespace)?;
        if self.strip_prefixes.len() > MAX_STRIP_PREFIXES {
            return Err(ConfigError::Invalid(
                "identifiers.strip_prefixes too many entries".to_string(),
            ));
        }
        for prefix in &self.strip_prefixes {
            if prefix.is_empty() {
                return Err(ConfigError::Invalid(
                    "identifiers.strip_prefixes entries must be non-empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Batch compilation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CompileConfig {
    /// Compile records on the rayon thread pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Maximum accepted size of one legacy document in bytes.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

impl CompileConfig {
    /// Validates compile configuration.
    fn validate(self) -> Result<(), ConfigError> {
        if self.max_document_bytes == 0 || self.max_document_bytes > MAX_MAX_DOCUMENT_BYTES {
            return Err(ConfigError::Invalid("compile.max_document_bytes out of range".to_string()));
        }
        Ok(())
    }
}

/// Destination for skip notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkipLogTarget {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `diagnostics.skip_log_path`.
    File,
    /// Discard skip notices.
    None,
}

/// Skip notice routing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DiagnosticsConfig {
    /// Where skip notices go.
    #[serde(default)]
    pub skip_log: SkipLogTarget,
    /// Log file path, required when `skip_log = "file"`.
    #[serde(default)]
    pub skip_log_path: Option<PathBuf>,
}

impl DiagnosticsConfig {
    /// Validates diagnostics configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.skip_log, &self.skip_log_path) {
            (SkipLogTarget::File, None) => Err(ConfigError::Invalid(
                "diagnostics.skip_log = \"file\" requires diagnostics.skip_log_path".to_string(),
            )),
            (SkipLogTarget::File, Some(path)) => {
                check_path("diagnostics.skip_log_path", path)
            }
            (_, Some(_)) => Err(ConfigError::Invalid(
                "diagnostics.skip_log_path is only valid with skip_log = \"file\"".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
///
/// Returns `None` when no source names a config file and the default file is
/// absent.
fn resolve_path(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "{CONFIG_ENV_VAR} is longer than {MAX_TOTAL_PATH_LENGTH} bytes"
            )));
        }
        return Ok(Some(PathBuf::from(env_path)));
    }
    let default_path = PathBuf::from(DEFAULT_CONFIG_NAME);
    if default_path.exists() { Ok(Some(default_path)) } else { Ok(None) }
}

/// Checks a configured path: not blank, bounded in total length, and no
/// component longer than [`MAX_PATH_COMPONENT_LENGTH`].
fn check_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} is longer than {MAX_TOTAL_PATH_LENGTH} bytes"
        )));
    }
    let oversized = path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH);
    if oversized {
        return Err(ConfigError::Invalid(format!(
            "{field} has a path component longer than {MAX_PATH_COMPONENT_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Validates an identifier namespace (ASCII letter followed by letters,
/// digits, or underscores).
fn validate_namespace(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value.len() > MAX_NAMESPACE_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} length out of range")));
    }
    let mut chars = value.chars();
    let leading_letter = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic());
    if !leading_letter || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(ConfigError::Invalid(format!("{field} must be an identifier")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default input directory.
fn default_input_dir() -> PathBuf {
    PathBuf::from(DEFAULT_INPUT_DIR)
}

/// Default input documents.
fn default_input_files() -> Vec<String> {
    DEFAULT_INPUT_FILES.iter().map(ToString::to_string).collect()
}

/// Default bundle output path.
fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

/// Default rules namespace.
fn default_rules_namespace() -> String {
    "rules".to_string()
}

/// Default configs namespace.
fn default_configs_namespace() -> String {
    "configs".to_string()
}

/// Default captures namespace.
fn default_captures_namespace() -> String {
    "captures".to_string()
}

/// Default stripped directory prefixes.
fn default_strip_prefixes() -> Vec<String> {
    DEFAULT_STRIP_PREFIXES.iter().map(ToString::to_string).collect()
}

/// Default to parallel compilation.
const fn default_parallel() -> bool {
    true
}

/// Default maximum legacy document size.
const fn default_max_document_bytes() -> usize {
    DEFAULT_MAX_DOCUMENT_BYTES
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn validate_namespace_accepts_identifier() {
        assert!(validate_namespace("ns", "rules").is_ok());
        assert!(validate_namespace("ns", "rules_v2").is_ok());
    }

    #[test]
    fn validate_namespace_rejects_leading_digit() {
        let err = validate_namespace("ns", "2rules").unwrap_err();
        assert!(err.to_string().contains("must be an identifier"));
    }

    #[test]
    fn validate_namespace_rejects_dotted_value() {
        assert!(validate_namespace("ns", "data.rules").is_err());
    }

    #[test]
    fn validate_namespace_rejects_empty_value() {
        let err = validate_namespace("ns", "").unwrap_err();
        assert!(err.to_string().contains("length out of range"));
    }

    #[test]
    fn check_path_rejects_whitespace_only() {
        let err = check_path("test_path", Path::new("   ")).unwrap_err();
        assert!(err.to_string().contains("test_path must be non-empty"));
    }

    #[test]
    fn check_path_rejects_long_component() {
        let path = Path::new("confs").join("a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        let err = check_path("test_path", &path).unwrap_err();
        assert!(err.to_string().contains("test_path has a path component longer than"));
        assert!(check_path("test_path", &Path::new("confs").join("a.toml")).is_ok());
    }

    #[test]
    fn explicit_missing_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = CompilerConfig::load(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
