// crates/falco-legacy-compiler/src/compiler.rs
// ============================================================================
// Module: Batch Compiler
// Description: Compiles every record of a legacy document.
// Purpose: All-or-nothing batch transform with advisory skip notices.
// Dependencies: falco-legacy-config, rayon
// ============================================================================

//! ## Overview
//! Records are independent, so they are compiled with a parallel map when
//! enabled. Results are gathered in document order before anything is
//! decided, which keeps the output, the reported error, and the skip notices
//! identical between parallel and sequential runs.
//!
//! ### Failure policy
//! - Ineligible records are dropped and reported to the [`SkipSink`].
//! - Any [`CompileError`] rejects the whole batch; the first one in document
//!   order is returned and no skip notices are emitted.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use falco_legacy_config::CompilerConfig;
use rayon::prelude::*;
use serde::Serialize;

use crate::assembler::assemble;
use crate::descriptor::TestDescriptor;
use crate::diagnostics::BatchSummaryEvent;
use crate::diagnostics::SkipEvent;
use crate::diagnostics::SkipSink;
use crate::eligibility::Eligibility;
use crate::eligibility::EligibilityFilter;
use crate::eligibility::ExclusionSet;
use crate::eligibility::SkipReason;
use crate::error::CompileError;
use crate::identifiers::CanonicalName;
use crate::identifiers::IdentifierResolver;
use crate::record::LegacyDocument;
use crate::record::RecordRef;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A record dropped by the eligibility filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    /// Group holding the record.
    pub group: String,
    /// Raw test name.
    pub record: String,
    /// Canonical test name.
    pub canonical_name: CanonicalName,
    /// Why it was dropped.
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Result of a successful batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledBatch {
    /// Descriptors in document order.
    pub descriptors: Vec<TestDescriptor>,
    /// Skipped records in document order.
    pub skipped: Vec<SkippedRecord>,
}

/// Per-record outcome before batch checks.
enum Outcome {
    /// The record compiled.
    Compiled {
        /// Raw test name.
        raw_name: String,
        /// Compiled descriptor.
        descriptor: TestDescriptor,
    },
    /// The record was dropped.
    Skipped(SkippedRecord),
}

// ============================================================================
// SECTION: Compiler
// ============================================================================

/// Batch compiler over an eligibility filter and an identifier resolver.
#[derive(Debug, Clone)]
pub struct Compiler {
    /// Eligibility filter.
    filter: EligibilityFilter,
    /// File reference resolver.
    resolver: IdentifierResolver,
    /// Compile records with a parallel map.
    parallel: bool,
}

impl Compiler {
    /// Creates a sequential compiler.
    #[must_use]
    pub const fn new(filter: EligibilityFilter, resolver: IdentifierResolver) -> Self {
        Self {
            filter,
            resolver,
            parallel: false,
        }
    }

    /// Builds the compiler described by configuration, with the legacy
    /// exclusion set.
    #[must_use]
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(
            EligibilityFilter::new(ExclusionSet::legacy()),
            IdentifierResolver::from_config(&config.identifiers),
        )
        .with_parallel(config.compile.parallel)
    }

    /// Enables or disables parallel compilation.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Compiles every record of the document.
    ///
    /// # Errors
    ///
    /// Returns the first [`CompileError`] in document order, or
    /// [`CompileError::NameCollision`] when two compiled records share a
    /// canonical name.
    pub fn compile(
        &self,
        document: &LegacyDocument,
        sink: &dyn SkipSink,
    ) -> Result<CompiledBatch, CompileError> {
        let records = document.records();
        let outcomes: Vec<Result<Outcome, CompileError>> = if self.parallel {
            records.par_iter().map(|entry| self.compile_record(entry)).collect()
        } else {
            records.iter().map(|entry| self.compile_record(entry)).collect()
        };

        let mut batch = CompiledBatch::default();
        let mut names: BTreeMap<CanonicalName, String> = BTreeMap::new();
        for outcome in outcomes {
            match outcome? {
                Outcome::Compiled {
                    raw_name,
                    descriptor,
                } => {
                    match names.entry(descriptor.name.clone()) {
                        Entry::Occupied(entry) => {
                            return Err(CompileError::NameCollision {
                                identifier: entry.key().to_string(),
                                first: entry.get().clone(),
                                second: raw_name,
                            });
                        }
                        Entry::Vacant(entry) => {
                            entry.insert(raw_name);
                        }
                    }
                    batch.descriptors.push(descriptor);
                }
                Outcome::Skipped(skipped) => batch.skipped.push(skipped),
            }
        }

        for skipped in &batch.skipped {
            sink.record_skip(&SkipEvent::new(
                &skipped.group,
                &skipped.record,
                skipped.canonical_name.clone(),
                skipped.reason.clone(),
            ));
        }
        sink.record_summary(&BatchSummaryEvent::new(
            records.len(),
            batch.descriptors.len(),
            batch.skipped.len(),
        ));
        Ok(batch)
    }

    /// Names, filters, and assembles one record.
    fn compile_record(&self, entry: &RecordRef<'_>) -> Result<Outcome, CompileError> {
        let name = CanonicalName::derive(entry.name)?;
        match self.filter.check(&name, entry.record) {
            Eligibility::Ineligible(reason) => Ok(Outcome::Skipped(SkippedRecord {
                group: entry.group.to_string(),
                record: entry.name.to_string(),
                canonical_name: name,
                reason,
            })),
            Eligibility::Eligible => {
                let descriptor = assemble(name, entry.name, entry.record, &self.resolver)?;
                Ok(Outcome::Compiled {
                    raw_name: entry.name.to_string(),
                    descriptor,
                })
            }
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(EligibilityFilter::default(), IdentifierResolver::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;
    use crate::diagnostics::MemorySkipSink;
    use crate::diagnostics::NoopSkipSink;

    fn document(yaml: &str) -> LegacyDocument {
        LegacyDocument::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let mut yaml = String::from("trace_files:\n");
        for idx in 0 .. 64 {
            yaml.push_str(&format!("  case_{idx}:\n    detect: {}\n", idx % 2 == 0));
        }
        yaml.push_str("  yes:\n    detect: true\n");
        let document = document(&yaml);
        let sequential = Compiler::default().compile(&document, &NoopSkipSink).unwrap();
        let parallel =
            Compiler::default().with_parallel(true).compile(&document, &NoopSkipSink).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.descriptors.len(), 64);
        assert_eq!(sequential.skipped.len(), 1);
    }

    #[test]
    fn first_error_in_document_order_wins() {
        let document = document(
            "a_group:\n  a_first:\n    validate_rules_file: rules/x.yaml\n    validate_ok: [missing]\n\
             b_group:\n  b_second:\n    detect: true\n    validate_errors: [{code: X}]\n",
        );
        let err = Compiler::default().with_parallel(true).compile(&document, &NoopSkipSink);
        assert!(matches!(err.unwrap_err(), CompileError::UnresolvedReference { .. }));
    }

    #[test]
    fn failure_emits_no_skip_notices() {
        let document = document(
            "g:\n  invalid_macro_loop: {}\n  zz_mixed:\n    detect: true\n    validate_rules_file: rules/a.yaml\n",
        );
        let sink = MemorySkipSink::new();
        assert!(Compiler::default().compile(&document, &sink).is_err());
        assert!(sink.skips().is_empty());
        assert!(sink.summaries().is_empty());
    }

    #[test]
    fn summary_counts_records() {
        let document = document("g:\n  one: {}\n  two: {}\n  'no': {}\n");
        let sink = MemorySkipSink::new();
        Compiler::default().compile(&document, &sink).unwrap();
        let summaries = sink.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].records, 3);
        assert_eq!(summaries[0].compiled, 2);
        assert_eq!(summaries[0].skipped, 1);
    }
}
