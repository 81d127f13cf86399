// crates/falco-legacy-compiler/src/mode.rs
// ============================================================================
// Module: Mode Classifier
// Description: Decides whether a record validates rules, detects, or runs.
// Purpose: Gate which fields are legal and which fragments are emitted.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A record is in validation mode when it expects load-time errors or
//! warnings or names rules files to validate, and in detection mode when it
//! expects alerts. Validation never replays a trace, so a record showing both
//! signals is an authoring defect rather than something to guess about.

use std::fmt;

use serde::Serialize;

use crate::error::CompileError;
use crate::normalize::normalized;
use crate::record::FieldRecord;

/// Execution mode of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Rules are loaded and checked, no trace is replayed.
    Validation,
    /// A capture is replayed and alerts are checked.
    Detection,
    /// Neither validation nor detection expectations.
    PlainRun,
}

impl Mode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Detection => "detection",
            Self::PlainRun => "plain_run",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw mode predicates of a record, before consistency is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSignals {
    /// Any validation expectation is present.
    pub validation: bool,
    /// Any detection expectation is present.
    pub detection: bool,
}

impl ModeSignals {
    /// Evaluates both predicates on a record.
    #[must_use]
    pub fn of(record: &FieldRecord) -> Self {
        let validation = !record.validate_errors.is_empty()
            || !record.validate_warnings.is_empty()
            || !normalized(record.validate_rules_file.as_ref()).is_empty();
        let detection = record.detect
            || record.check_detection_counts
            || !normalized(record.detect_level.as_ref()).is_empty()
            || !record.detect_counts.is_empty();
        Self {
            validation,
            detection,
        }
    }

    /// Returns the mode when the predicates are consistent.
    #[must_use]
    pub const fn mode(self) -> Option<Mode> {
        match (self.validation, self.detection) {
            (true, true) => None,
            (true, false) => Some(Mode::Validation),
            (false, true) => Some(Mode::Detection),
            (false, false) => Some(Mode::PlainRun),
        }
    }
}

/// Classifies a record.
///
/// # Errors
///
/// Returns [`CompileError::AmbiguousMode`] when validation and detection
/// predicates both hold.
pub fn classify(record: &FieldRecord, name: &str) -> Result<Mode, CompileError> {
    ModeSignals::of(record).mode().ok_or_else(|| CompileError::AmbiguousMode {
        record: name.to_string(),
    })
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
    use crate::normalize::OneOrMany;
    use crate::record::RuleCount;
    use crate::record::RuleCounts;
    use crate::record::ValidationExpectation;

    #[test]
    fn empty_record_is_plain_run() {
        assert_eq!(classify(&FieldRecord::default(), "t").unwrap(), Mode::PlainRun);
    }

    #[test]
    fn each_validation_trigger_selects_validation() {
        let mut errors = FieldRecord::default();
        errors.validate_errors.push(ValidationExpectation::default());
        let mut warnings = FieldRecord::default();
        warnings.validate_warnings.push(ValidationExpectation::default());
        let files = FieldRecord {
            validate_rules_file: Some(OneOrMany::Single("rules/a.yaml".to_string())),
            ..FieldRecord::default()
        };
        for record in [errors, warnings, files] {
            assert_eq!(classify(&record, "t").unwrap(), Mode::Validation);
        }
    }

    #[test]
    fn each_detection_trigger_selects_detection() {
        let detect = FieldRecord {
            detect: true,
            ..FieldRecord::default()
        };
        let counts_checked = FieldRecord {
            check_detection_counts: true,
            ..FieldRecord::default()
        };
        let levels = FieldRecord {
            detect_level: Some(OneOrMany::Single("WARNING".to_string())),
            ..FieldRecord::default()
        };
        let counts = FieldRecord {
            detect_counts: vec![RuleCounts(vec![RuleCount {
                rule: "open_1".to_string(),
                count: 1,
            }])],
            ..FieldRecord::default()
        };
        for record in [detect, counts_checked, levels, counts] {
            assert_eq!(classify(&record, "t").unwrap(), Mode::Detection);
        }
    }

    #[test]
    fn empty_list_forms_do_not_trigger() {
        let record = FieldRecord {
            validate_rules_file: Some(OneOrMany::Many(Vec::new())),
            detect_level: Some(OneOrMany::Many(Vec::new())),
            ..FieldRecord::default()
        };
        assert_eq!(classify(&record, "t").unwrap(), Mode::PlainRun);
    }

    #[test]
    fn both_signals_are_ambiguous() {
        let record = FieldRecord {
            detect: true,
            validate_rules_file: Some(OneOrMany::Single("rules/a.yaml".to_string())),
            ..FieldRecord::default()
        };
        let err = classify(&record, "mixed_up").unwrap_err();
        assert_eq!(
            err,
            CompileError::AmbiguousMode {
                record: "mixed_up".to_string()
            }
        );
    }
}
