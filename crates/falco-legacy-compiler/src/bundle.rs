// crates/falco-legacy-compiler/src/bundle.rs
// ============================================================================
// Module: Descriptor Bundle
// Description: Deterministic JSON artifact handed to the external renderer.
// Purpose: Serialize compiled batches and keep on-disk bundles in sync.
// Dependencies: serde, serde_json, tempfile, thiserror
// ============================================================================

//! ## Overview
//! A [`DescriptorBundle`] carries every compiled descriptor in both the
//! structured (tagged) form and the rendered expression form, plus the
//! skipped records. The bundle has no timestamps, so compiling the same
//! inputs twice yields byte-identical output, which [`check_bundle`] relies
//! on for drift detection.
//!
//! Bundles are written through a `tempfile` sibling that is persisted over
//! the destination; readers never observe a partially written bundle.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::compiler::CompiledBatch;
use crate::compiler::SkippedRecord;
use crate::descriptor::Assertion;
use crate::descriptor::InvocationOption;
use crate::descriptor::TestDescriptor;
use crate::identifiers::CanonicalName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Generator name recorded in every bundle.
pub const GENERATOR_NAME: &str = "falco-legacy-compiler";
/// Generator version recorded in every bundle.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while writing or checking a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// IO error while reading or writing files.
    #[error("io error: {0}")]
    Io(String),
    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(String),
    /// On-disk bundle differs from the compiled one.
    #[error("descriptor drift detected for {path}. Run falco-legacy-compiler compile.")]
    Drift {
        /// Bundle path.
        path: PathBuf,
    },
}

// ============================================================================
// SECTION: Bundle Types
// ============================================================================

/// Rendered expression form of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDescriptor {
    /// Option expressions in order.
    pub options: Vec<String>,
    /// Assertion expressions in order.
    pub assertions: Vec<String>,
}

/// One descriptor in both forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleEntry {
    /// Canonical test name.
    pub name: CanonicalName,
    /// Structured options.
    pub options: Vec<InvocationOption>,
    /// Structured assertions.
    pub assertions: Vec<Assertion>,
    /// Rendered expressions.
    pub rendered: RenderedDescriptor,
}

impl From<&TestDescriptor> for BundleEntry {
    fn from(descriptor: &TestDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            options: descriptor.options.clone(),
            assertions: descriptor.assertions.clone(),
            rendered: RenderedDescriptor {
                options: descriptor.option_expressions(),
                assertions: descriptor.assertion_expressions(),
            },
        }
    }
}

/// Deterministic artifact for one compiled batch.
///
/// # Invariants
/// - Descriptor and skip order follow document order.
/// - Serialization contains no time- or host-dependent data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorBundle {
    /// Generator name.
    pub generator: &'static str,
    /// Generator version.
    pub version: &'static str,
    /// Compiled descriptors.
    pub descriptors: Vec<BundleEntry>,
    /// Records dropped by the eligibility filter.
    pub skipped: Vec<SkippedRecord>,
}

impl DescriptorBundle {
    /// Builds a bundle from a compiled batch.
    #[must_use]
    pub fn from_batch(batch: &CompiledBatch) -> Self {
        Self {
            generator: GENERATOR_NAME,
            version: GENERATOR_VERSION,
            descriptors: batch.descriptors.iter().map(BundleEntry::from).collect(),
            skipped: batch.skipped.clone(),
        }
    }

    /// Renders the bundle as pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Json`] when serialization fails.
    pub fn to_json_string(&self) -> Result<String, BundleError> {
        let mut out =
            serde_json::to_string_pretty(self).map_err(|err| BundleError::Json(err.to_string()))?;
        out.push('\n');
        Ok(out)
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Atomically writes bundle contents, creating parent directories.
///
/// The contents go to a named temporary file in the destination directory,
/// which is synced and then persisted over the destination.
///
/// # Errors
///
/// Returns [`BundleError::Io`] when any filesystem step fails; the
/// destination is left untouched and the temporary file is removed.
pub fn write_bundle(path: &Path, contents: &str) -> Result<(), BundleError> {
    if path.file_name().is_none() {
        return Err(BundleError::Io(format!("{} does not name a file", path.display())));
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(io_error)?;
            parent
        }
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(parent).map_err(io_error)?;
    temp.write_all(contents.as_bytes()).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}

/// Compares bundle contents against the file on disk.
///
/// # Errors
///
/// Returns [`BundleError::Drift`] when the contents differ and
/// [`BundleError::Io`] when the file cannot be read.
pub fn check_bundle(path: &Path, contents: &str) -> Result<(), BundleError> {
    let existing = fs::read_to_string(path).map_err(|err| BundleError::Io(err.to_string()))?;
    if existing != contents {
        return Err(BundleError::Drift {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Maps an IO failure onto [`BundleError::Io`].
fn io_error(err: std::io::Error) -> BundleError {
    BundleError::Io(err.to_string())
}
