// crates/falco-legacy-compiler/src/identifiers.rs
// ============================================================================
// Module: Identifiers
// Description: Identifier-case transform, canonical names, file references.
// Purpose: Derive stable, identifier-safe names from free-form legacy text.
// Dependencies: falco-legacy-config, serde
// ============================================================================

//! ## Overview
//! Legacy test names (`stdout_output_strict`) and data file references
//! (`rules/single_rule.yaml`) become identifiers (`StdoutOutputStrict`,
//! `rules.SingleRule`) through [`to_camel`]. The transform is lossy, so
//! distinct names may collide; the batch compiler checks for that.

use std::fmt;

use falco_legacy_config::IdentifierConfig;
use serde::Serialize;

use crate::error::CompileError;

// ============================================================================
// SECTION: Case Transform
// ============================================================================

/// Converts free-form text to an upper camel identifier.
///
/// ASCII letters are kept; the first letter and any letter following a
/// separator (`_`, space, `-`, `.`) or a digit is upper-cased. Digits are
/// kept. All other characters are dropped, and so is surrounding whitespace.
/// Letters not at a word start keep their original case.
#[must_use]
pub fn to_camel(value: &str) -> String {
    let trimmed = value.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut capitalize_next = true;
    for ch in trimmed.chars() {
        if ch.is_ascii_alphabetic() {
            if capitalize_next {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
            capitalize_next = false;
        } else if ch.is_ascii_digit() {
            out.push(ch);
            capitalize_next = true;
        } else {
            capitalize_next = matches!(ch, '_' | ' ' | '-' | '.');
        }
    }
    out
}

// ============================================================================
// SECTION: Canonical Names
// ============================================================================

/// Identifier-safe name of a compiled test.
///
/// # Invariants
/// - Non-empty and made only of ASCII letters and digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
    /// Derives the canonical name of a raw test name.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidName`] when the name has no identifier
    /// characters.
    pub fn derive(raw: &str) -> Result<Self, CompileError> {
        let camel = to_camel(raw);
        if camel.is_empty() {
            return Err(CompileError::InvalidName {
                record: raw.to_string(),
            });
        }
        Ok(Self(camel))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: File References
// ============================================================================

/// Kind of data file a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Rules file.
    Rules,
    /// Falco configuration file.
    Config,
    /// Trace capture file.
    Capture,
}

/// Namespace-qualified identifier of a data file (`rules.SingleRule`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileIdentifier {
    /// Namespace of the file kind.
    pub namespace: String,
    /// Camel-cased file stem.
    pub name: String,
}

impl fmt::Display for FileIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Resolves data file references to identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierResolver {
    /// Namespace for rules files.
    rules_namespace: String,
    /// Namespace for configuration files.
    configs_namespace: String,
    /// Namespace for capture files.
    captures_namespace: String,
    /// Directory prefixes stripped in order.
    strip_prefixes: Vec<String>,
}

impl IdentifierResolver {
    /// Builds a resolver from identifier settings.
    #[must_use]
    pub fn from_config(config: &IdentifierConfig) -> Self {
        Self {
            rules_namespace: config.rules_namespace.clone(),
            configs_namespace: config.configs_namespace.clone(),
            captures_namespace: config.captures_namespace.clone(),
            strip_prefixes: config.strip_prefixes.clone(),
        }
    }

    /// Resolves one file reference.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidFileReference`] when the reference has
    /// no identifier characters once prefixes and extension are removed.
    pub fn resolve(
        &self,
        kind: FileKind,
        reference: &str,
        record: &str,
        field: &'static str,
    ) -> Result<FileIdentifier, CompileError> {
        let mut stem = strip_extension(reference);
        for prefix in &self.strip_prefixes {
            stem = stem.strip_prefix(prefix.as_str()).unwrap_or(stem);
        }
        let name = to_camel(&stem.replace('/', "_"));
        if name.is_empty() {
            return Err(CompileError::InvalidFileReference {
                record: record.to_string(),
                field,
                value: reference.to_string(),
            });
        }
        let namespace = match kind {
            FileKind::Rules => &self.rules_namespace,
            FileKind::Config => &self.configs_namespace,
            FileKind::Capture => &self.captures_namespace,
        };
        Ok(FileIdentifier {
            namespace: namespace.clone(),
            name,
        })
    }

    /// Resolves a list of references, preserving order.
    ///
    /// # Errors
    ///
    /// Returns the first resolution failure.
    pub fn resolve_all(
        &self,
        kind: FileKind,
        references: &[String],
        record: &str,
        field: &'static str,
    ) -> Result<Vec<FileIdentifier>, CompileError> {
        references.iter().map(|reference| self.resolve(kind, reference, record, field)).collect()
    }
}

impl Default for IdentifierResolver {
    fn default() -> Self {
        Self::from_config(&IdentifierConfig::default())
    }
}

/// Removes the extension of the last path element (`a/b.c.yaml` -> `a/b.c`).
fn strip_extension(path: &str) -> &str {
    let element_start = path.rfind('/').map_or(0, |idx| idx + 1);
    match path[element_start ..].rfind('.') {
        Some(dot) => &path[.. element_start + dot],
        None => path,
    }
}
