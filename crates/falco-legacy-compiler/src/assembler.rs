// crates/falco-legacy-compiler/src/assembler.rs
// ============================================================================
// Module: Descriptor Assembler
// Description: Concatenates stage fragments into one test descriptor.
// Purpose: Enforce descriptor invariants before anything leaves the compiler.
// Dependencies: none
// ============================================================================

//! ## Overview
//! The assembler runs the mapper's stage table in order, concatenates the
//! fragments, collapses adjacent JSON-output options, and checks the
//! descriptor invariants. A violation means a mapping rule is wrong, so it is
//! reported as [`CompileError::Invariant`] instead of being repaired.

use std::collections::BTreeSet;

use crate::descriptor::Assertion;
use crate::descriptor::InvocationOption;
use crate::descriptor::TestDescriptor;
use crate::error::CompileError;
use crate::identifiers::CanonicalName;
use crate::identifiers::IdentifierResolver;
use crate::mapper::MappingContext;
use crate::mapper::map_record;
use crate::mode::classify;
use crate::record::FieldRecord;

/// Compiles one eligible record into a descriptor.
///
/// `name` is the canonical name derived once by the caller; `raw_name` is
/// used in error reports.
///
/// # Errors
///
/// Returns [`CompileError`] when the record is ambiguous, references unknown
/// entries, or assembles into an invalid descriptor.
pub fn assemble(
    name: CanonicalName,
    raw_name: &str,
    record: &FieldRecord,
    resolver: &IdentifierResolver,
) -> Result<TestDescriptor, CompileError> {
    let mode = classify(record, raw_name)?;
    let ctx = MappingContext {
        name: raw_name,
        record,
        mode,
        resolver,
    };
    let mut options: Vec<InvocationOption> = Vec::new();
    let mut assertions: Vec<Assertion> = Vec::new();
    for (_, fragment) in map_record(&ctx)? {
        options.extend(fragment.options);
        assertions.extend(fragment.assertions);
    }
    options.dedup_by(|next, previous| {
        *next == InvocationOption::OutputJson && *previous == InvocationOption::OutputJson
    });
    let descriptor = TestDescriptor {
        name,
        options,
        assertions,
    };
    check_invariants(&descriptor).map_err(|detail| CompileError::Invariant {
        record: raw_name.to_string(),
        detail,
    })?;
    Ok(descriptor)
}

/// Verifies option uniqueness and exit-code placement.
fn check_invariants(descriptor: &TestDescriptor) -> Result<(), String> {
    let mut seen = BTreeSet::new();
    for option in &descriptor.options {
        let kind = option.kind();
        if !kind.is_repeatable() && !seen.insert(kind) {
            return Err(format!("option {} emitted more than once", kind.as_str()));
        }
    }
    let exit_codes = descriptor
        .assertions
        .iter()
        .filter(|assertion| matches!(assertion, Assertion::ExitCode { .. }))
        .count();
    if exit_codes != 1 {
        return Err(format!("expected one exit code assertion, found {exit_codes}"));
    }
    if !matches!(descriptor.assertions.last(), Some(Assertion::ExitCode { .. })) {
        return Err("exit code assertion is not last".to_string());
    }
    Ok(())
}
