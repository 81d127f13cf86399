// crates/falco-legacy-compiler/src/error.rs
// ============================================================================
// Module: Compiler Errors
// Description: Error taxonomy for document loading and record compilation.
// Purpose: Keep authoring defects distinct from structural input failures.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`LoadError`] covers structural problems with a legacy YAML document; any
//! of them rejects the run. [`CompileError`] covers authoring defects inside
//! a single record. Compilation of that record stops, and the batch compiler
//! rejects the whole batch so no partially-correct descriptor set escapes.
//! Ineligible records are not errors; see [`crate::eligibility`].

use thiserror::Error;

/// Errors raised while compiling one record (batch-fatal).
///
/// # Invariants
/// - Every variant names the offending record by its raw test name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    /// Validation and detection expectations are both present.
    #[error("record {record}: validation and detection expectations are mutually exclusive")]
    AmbiguousMode {
        /// Raw test name.
        record: String,
    },
    /// A cross-reference names an entry that none of its siblings match.
    #[error("record {record}: {field} references unknown entry {value:?}")]
    UnresolvedReference {
        /// Raw test name.
        record: String,
        /// Field holding the reference.
        field: &'static str,
        /// Unmatched reference value.
        value: String,
    },
    /// Two lists that must pair up element by element differ in length.
    #[error("record {record}: {field} has {len} entries but {indexed_field} has only {indexed_len}")]
    LengthMismatch {
        /// Raw test name.
        record: String,
        /// Indexing field.
        field: &'static str,
        /// Indexing field length.
        len: usize,
        /// Indexed field.
        indexed_field: &'static str,
        /// Indexed field length.
        indexed_len: usize,
    },
    /// Two records normalize to the same canonical identifier.
    #[error("records {first:?} and {second:?} both normalize to identifier {identifier}")]
    NameCollision {
        /// Shared canonical identifier.
        identifier: String,
        /// Raw name compiled first.
        first: String,
        /// Raw name compiled second.
        second: String,
    },
    /// The test name contains no identifier characters.
    #[error("record {record:?}: name does not produce an identifier")]
    InvalidName {
        /// Raw test name.
        record: String,
    },
    /// A file reference contains no identifier characters.
    #[error("record {record}: {field} value {value:?} does not produce an identifier")]
    InvalidFileReference {
        /// Raw test name.
        record: String,
        /// Field holding the reference.
        field: &'static str,
        /// Offending reference.
        value: String,
    },
    /// Assembled descriptor violates a structural invariant.
    #[error("record {record}: descriptor invariant violated: {detail}")]
    Invariant {
        /// Raw test name.
        record: String,
        /// Violated invariant.
        detail: String,
    },
}

/// Errors raised while reading a legacy YAML document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    /// I/O failure.
    #[error("document io error: {0}")]
    Io(String),
    /// YAML does not match the document structure.
    #[error("document parse error: {0}")]
    Parse(String),
    /// Document exceeds the configured size limit.
    #[error("document {path} exceeds {limit} bytes")]
    TooLarge {
        /// Document path.
        path: String,
        /// Configured limit.
        limit: usize,
    },
    /// The same test name appears twice in one group across documents.
    #[error("duplicate test {record:?} in group {group:?}")]
    Duplicate {
        /// Group name.
        group: String,
        /// Raw test name.
        record: String,
    },
}
