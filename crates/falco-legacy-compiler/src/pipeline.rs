// crates/falco-legacy-compiler/src/pipeline.rs
// ============================================================================
// Module: Compile Pipeline
// Description: Configuration-driven load, compile, and bundle steps.
// Purpose: Shared driver for the CLI and its integration tests.
// Dependencies: falco-legacy-config, thiserror
// ============================================================================

//! ## Overview
//! [`compile_bundle`] loads every configured input document, merges them,
//! compiles the merged document, and renders the bundle text. Nothing is
//! written until compilation has fully succeeded.

use falco_legacy_config::CompilerConfig;
use falco_legacy_config::ConfigError;
use falco_legacy_config::SkipLogTarget;
use thiserror::Error;

use crate::bundle::BundleError;
use crate::bundle::DescriptorBundle;
use crate::bundle::check_bundle;
use crate::bundle::write_bundle;
use crate::compiler::Compiler;
use crate::diagnostics::FileSkipSink;
use crate::diagnostics::NoopSkipSink;
use crate::diagnostics::SkipSink;
use crate::diagnostics::StderrSkipSink;
use crate::error::CompileError;
use crate::error::LoadError;
use crate::record::LegacyDocument;

/// Errors surfaced by the compile pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Compiler configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An input document could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// A record failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The bundle could not be written or checked.
    #[error(transparent)]
    Bundle(#[from] BundleError),
    /// The skip log could not be opened.
    #[error("skip log error: {0}")]
    SkipLog(String),
}

/// Opens the skip sink selected by configuration.
///
/// # Errors
///
/// Returns [`PipelineError::SkipLog`] when the log file cannot be opened.
pub fn skip_sink(config: &CompilerConfig) -> Result<Box<dyn SkipSink>, PipelineError> {
    match (config.diagnostics.skip_log, &config.diagnostics.skip_log_path) {
        (SkipLogTarget::Stderr, _) => Ok(Box::new(StderrSkipSink)),
        (SkipLogTarget::None, _) => Ok(Box::new(NoopSkipSink)),
        (SkipLogTarget::File, Some(path)) => FileSkipSink::new(path)
            .map(|sink| Box::new(sink) as Box<dyn SkipSink>)
            .map_err(|err| PipelineError::SkipLog(err.to_string())),
        (SkipLogTarget::File, None) => {
            Err(PipelineError::SkipLog("skip log path is not configured".to_string()))
        }
    }
}

/// Loads, merges, and compiles the configured inputs into bundle text.
///
/// # Errors
///
/// Returns [`PipelineError`] when loading, compiling, or serialization fails.
pub fn compile_bundle(
    config: &CompilerConfig,
    sink: &dyn SkipSink,
) -> Result<String, PipelineError> {
    let inputs = config.input_paths();
    let document = LegacyDocument::load_all(inputs.as_slice(), config.compile.max_document_bytes)?;
    let batch = Compiler::from_config(config).compile(&document, sink)?;
    Ok(DescriptorBundle::from_batch(&batch).to_json_string()?)
}

/// Compiles the inputs and atomically writes the bundle to the output path.
///
/// # Errors
///
/// Returns [`PipelineError`] when any step fails; no output is written then.
pub fn run_compile(config: &CompilerConfig, sink: &dyn SkipSink) -> Result<(), PipelineError> {
    let contents = compile_bundle(config, sink)?;
    write_bundle(&config.output.path, &contents)?;
    Ok(())
}

/// Compiles the inputs and fails when the on-disk bundle differs.
///
/// # Errors
///
/// Returns [`PipelineError::Bundle`] on drift, or any compile failure.
pub fn run_check(config: &CompilerConfig, sink: &dyn SkipSink) -> Result<(), PipelineError> {
    let contents = compile_bundle(config, sink)?;
    check_bundle(&config.output.path, &contents)?;
    Ok(())
}
