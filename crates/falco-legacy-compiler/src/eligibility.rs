// crates/falco-legacy-compiler/src/eligibility.rs
// ============================================================================
// Module: Eligibility Filter
// Description: Decides whether a record compiles at all.
// Purpose: Drop known-unportable records with a reason instead of failing.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A record is ineligible when its canonical name is in the exclusion set,
//! when it carries a sub-tree that has no mapping rule (`rules_events`,
//! `grpc`, `package`), or when it sets a mode-specific field while that mode
//! is inactive. Ineligibility is never an error: the batch compiler reports
//! the [`SkipReason`] and moves on.
//!
//! The exclusion set is an immutable value handed to the filter, so tests can
//! substitute synthetic sets for [`ExclusionSet::legacy`].

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::identifiers::CanonicalName;
use crate::mode::Mode;
use crate::mode::ModeSignals;
use crate::normalize::normalized;
use crate::record::FieldRecord;

// ============================================================================
// SECTION: Exclusion Set
// ============================================================================

/// Canonical names of legacy tests that cannot be ported.
const LEGACY_EXCLUSIONS: [&str; 16] = [
    "Yes",
    "No",
    "InOperatorNetmasks",
    "InvalidMacroLoop",
    "EnabledRuleUsingFalseEnabledFlagOnly",
    "JsonOutputNoTagsProperty",
    "NullOutputField",
    "JsonOutputNoOutputProperty",
    "TimeIso8601",
    "JsonOutputEmptyTagsProperty",
    "RuleNamesWithRegexChars",
    "DetectCounts",
    "RulesDirectory",
    "TestWarnings",
    "GrpcUnixSocketOutputs",
    "TestKubeDemo",
];

/// Immutable set of excluded canonical names.
///
/// Membership is an exact, case-sensitive match on the canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    /// Excluded canonical names.
    names: BTreeSet<String>,
}

impl ExclusionSet {
    /// Builds a set from arbitrary canonical names.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the exclusion set of the historical regression suite.
    #[must_use]
    pub fn legacy() -> Self {
        Self::new(LEGACY_EXCLUSIONS)
    }

    /// Returns true when the name is excluded.
    #[must_use]
    pub fn contains(&self, name: &CanonicalName) -> bool {
        self.names.contains(name.as_str())
    }

    /// Returns the number of excluded names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true when nothing is excluded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Why a record was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The canonical name is in the exclusion set.
    Excluded,
    /// A sub-tree with no mapping rule is present.
    IgnoredSubtree {
        /// Sub-tree field name.
        field: &'static str,
    },
    /// A mode-specific field is set while its mode is inactive.
    ///
    /// The legacy harness ran such records and ignored the field; this
    /// compiler skips them instead of emitting a vacuous test.
    Unrepresentable {
        /// Offending field name.
        field: &'static str,
        /// Mode the field requires.
        required: Mode,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excluded => f.write_str("listed in the exclusion set"),
            Self::IgnoredSubtree {
                field,
            } => write!(f, "contains unsupported sub-tree {field}"),
            Self::Unrepresentable {
                field,
                required,
            } => write!(
                f,
                "sets {field} outside {required} mode (the legacy harness ignored it; skipped \
                 rather than compiled without it)"
            ),
        }
    }
}

/// Outcome of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// The record compiles.
    Eligible,
    /// The record is dropped.
    Ineligible(SkipReason),
}

// ============================================================================
// SECTION: Filter
// ============================================================================

/// Eligibility filter over an injected exclusion set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityFilter {
    /// Excluded canonical names.
    exclusions: ExclusionSet,
}

impl EligibilityFilter {
    /// Creates a filter over the given exclusions.
    #[must_use]
    pub const fn new(exclusions: ExclusionSet) -> Self {
        Self {
            exclusions,
        }
    }

    /// Returns the exclusion set.
    #[must_use]
    pub const fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Checks one record. Checks run in order: exclusion, ignored sub-trees,
    /// unrepresentable fields.
    #[must_use]
    pub fn check(&self, name: &CanonicalName, record: &FieldRecord) -> Eligibility {
        if self.exclusions.contains(name) {
            return Eligibility::Ineligible(SkipReason::Excluded);
        }
        if let Some(field) = ignored_subtree(record) {
            return Eligibility::Ineligible(SkipReason::IgnoredSubtree {
                field,
            });
        }
        // Ambiguous records fall through so the mapper reports them.
        if let Some(mode) = ModeSignals::of(record).mode()
            && let Some((field, required)) = unrepresentable_field(record, mode)
        {
            return Eligibility::Ineligible(SkipReason::Unrepresentable {
                field,
                required,
            });
        }
        Eligibility::Eligible
    }
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::new(ExclusionSet::legacy())
    }
}

/// Returns the first present sub-tree that has no mapping rule.
fn ignored_subtree(record: &FieldRecord) -> Option<&'static str> {
    [
        ("rules_events", record.rules_events.is_some()),
        ("grpc", record.grpc.is_some()),
        ("package", record.package.is_some()),
    ]
    .into_iter()
    .find_map(|(field, present)| present.then_some(field))
}

/// Returns the first mode-specific field set while its mode is inactive.
fn unrepresentable_field(record: &FieldRecord, mode: Mode) -> Option<(&'static str, Mode)> {
    if mode != Mode::Validation && !record.validate_ok.is_empty() {
        return Some(("validate_ok", Mode::Validation));
    }
    if mode == Mode::Detection {
        return None;
    }
    [
        ("all_events", record.all_events),
        ("time_iso_8601", record.time_iso_8601),
        ("enable_source", !normalized(record.enable_source.as_ref()).is_empty()),
        ("json_include_output_property", record.json_include_output_property),
        ("json_include_tags_property", record.json_include_tags_property),
    ]
    .into_iter()
    .find_map(|(field, set)| set.then_some((field, Mode::Detection)))
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

    fn name(raw: &str) -> CanonicalName {
        CanonicalName::derive(raw).unwrap()
    }

    #[test]
    fn legacy_set_has_every_historical_exclusion() {
        let set = ExclusionSet::legacy();
        assert_eq!(set.len(), 16);
        assert!(set.contains(&name("invalid_macro_loop")));
        assert!(set.contains(&name("grpc_unix_socket_outputs")));
    }

    #[test]
    fn exclusion_is_exact_match() {
        let filter = EligibilityFilter::default();
        let record = FieldRecord::default();
        assert_eq!(
            filter.check(&name("InvalidMacroLoop"), &record),
            Eligibility::Ineligible(SkipReason::Excluded)
        );
        assert_eq!(filter.check(&name("InvalidMacroLoopX"), &record), Eligibility::Eligible);
        assert_eq!(filter.check(&name("invalidmacroloop"), &record), Eligibility::Eligible);
    }

    #[test]
    fn synthetic_sets_are_injected() {
        let filter = EligibilityFilter::new(ExclusionSet::new(["Custom"]));
        let record = FieldRecord::default();
        assert!(matches!(filter.check(&name("custom"), &record), Eligibility::Ineligible(_)));
        assert_eq!(filter.check(&name("yes"), &record), Eligibility::Eligible);
    }

    #[test]
    fn ignored_subtrees_make_record_ineligible() {
        let filter = EligibilityFilter::new(ExclusionSet::default());
        let record = FieldRecord {
            grpc: Some(serde_yaml::Value::Bool(true)),
            ..FieldRecord::default()
        };
        assert_eq!(
            filter.check(&name("grpc_test"), &record),
            Eligibility::Ineligible(SkipReason::IgnoredSubtree {
                field: "grpc"
            })
        );
    }

    #[test]
    fn validate_ok_outside_validation_is_unrepresentable() {
        let filter = EligibilityFilter::new(ExclusionSet::default());
        let record = FieldRecord {
            validate_ok: vec!["rules/a.yaml".to_string()],
            ..FieldRecord::default()
        };
        assert_eq!(
            filter.check(&name("t"), &record),
            Eligibility::Ineligible(SkipReason::Unrepresentable {
                field: "validate_ok",
                required: Mode::Validation,
            })
        );
    }

    #[test]
    fn detection_fields_need_detection_mode() {
        let filter = EligibilityFilter::new(ExclusionSet::default());
        let plain = FieldRecord {
            enable_source: Some(OneOrMany::Single("k8s_audit".to_string())),
            ..FieldRecord::default()
        };
        assert_eq!(
            filter.check(&name("t"), &plain),
            Eligibility::Ineligible(SkipReason::Unrepresentable {
                field: "enable_source",
                required: Mode::Detection,
            })
        );
        let detecting = FieldRecord {
            detect: true,
            ..plain
        };
        assert_eq!(filter.check(&name("t"), &detecting), Eligibility::Eligible);
    }

    #[test]
    fn plain_run_all_events_is_skipped_with_policy_note() {
        let filter = EligibilityFilter::new(ExclusionSet::default());
        let record = FieldRecord {
            all_events: true,
            ..FieldRecord::default()
        };
        let Eligibility::Ineligible(reason) = filter.check(&name("t"), &record) else {
            panic!("plain run with all_events must be skipped");
        };
        assert_eq!(
            reason,
            SkipReason::Unrepresentable {
                field: "all_events",
                required: Mode::Detection,
            }
        );
        let message = reason.to_string();
        assert!(message.starts_with("sets all_events outside detection mode"));
        assert!(message.contains("the legacy harness ignored it"));
    }

    #[test]
    fn ambiguous_records_are_left_for_the_mapper() {
        let filter = EligibilityFilter::new(ExclusionSet::default());
        let record = FieldRecord {
            detect: true,
            validate_ok: vec!["a".to_string()],
            validate_rules_file: Some(OneOrMany::Single("rules/a.yaml".to_string())),
            ..FieldRecord::default()
        };
        assert_eq!(filter.check(&name("t"), &record), Eligibility::Eligible);
    }
}
