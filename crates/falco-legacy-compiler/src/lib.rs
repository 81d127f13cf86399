// crates/falco-legacy-compiler/src/lib.rs
// ============================================================================
// Module: Falco Legacy Compiler Library
// Description: Compiler from legacy regression YAML to test descriptors.
// Purpose: Turn declarative expectations into ordered options and assertions.
// Dependencies: falco-legacy-config, rayon, serde, serde_json, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! The legacy Falco regression suite describes each test declaratively: the
//! flags to run with and the output, detections, validation results, and exit
//! status to expect. This crate compiles every such record into a
//! [`TestDescriptor`], an ordered list of invocation options and assertions a
//! downstream renderer turns into executable test code.
//!
//! ### Pipeline
//! - [`normalize`]: single-or-many fields as ordered sequences.
//! - [`mode`]: validation, detection, or plain-run classification.
//! - [`eligibility`]: exclusion set and unportable record shapes.
//! - [`mapper`]: the ordered stage table of field-to-fragment rules.
//! - [`assembler`]: fragment concatenation and descriptor invariants.
//! - [`compiler`]: all-or-nothing batch compilation, optionally parallel.
//! - [`bundle`]: deterministic JSON artifact with drift checking.
//!
//! ## Index
//! - Public API: [`Compiler`], [`CompiledBatch`], [`LegacyDocument`], [`TestDescriptor`]
//! - Errors: [`CompileError`], [`LoadError`], [`PipelineError`]
//! - Diagnostics: [`SkipSink`] and its stderr, file, no-op, and memory sinks

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assembler;
pub mod bundle;
pub mod compiler;
pub mod descriptor;
pub mod diagnostics;
pub mod eligibility;
pub mod error;
pub mod identifiers;
pub mod mapper;
pub mod mode;
pub mod normalize;
pub mod pipeline;
pub mod record;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bundle::DescriptorBundle;
pub use compiler::CompiledBatch;
pub use compiler::Compiler;
pub use compiler::SkippedRecord;
pub use descriptor::Assertion;
pub use descriptor::InvocationOption;
pub use descriptor::TestDescriptor;
pub use diagnostics::FileSkipSink;
pub use diagnostics::MemorySkipSink;
pub use diagnostics::NoopSkipSink;
pub use diagnostics::SkipSink;
pub use diagnostics::StderrSkipSink;
pub use eligibility::EligibilityFilter;
pub use eligibility::ExclusionSet;
pub use error::CompileError;
pub use error::LoadError;
pub use identifiers::CanonicalName;
pub use mode::Mode;
pub use pipeline::PipelineError;
pub use record::FieldRecord;
pub use record::LegacyDocument;
