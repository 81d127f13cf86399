// crates/falco-legacy-compiler/src/mapper.rs
// ============================================================================
// Module: Semantic Mapper
// Description: Field-to-fragment rules evaluated in a fixed precedence order.
// Purpose: Turn one classified record into ordered options and assertions.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The mapper is a table of [`Stage`]s. Each stage is a pure function of the
//! [`MappingContext`] that returns a [`Fragment`], empty when its trigger
//! condition does not hold. [`STAGES`] fixes the evaluation order; the
//! assembler concatenates the fragments in that order, so the precedence of
//! options and assertions is an explicit artifact rather than code layout.
//!
//! Mode-specific stages check the record's [`Mode`] themselves, which keeps
//! every stage independently testable.

use serde::Serialize;

use crate::descriptor::Assertion;
use crate::descriptor::CountExpectation;
use crate::descriptor::DetectionScope;
use crate::descriptor::InvocationOption;
use crate::descriptor::OutputStream;
use crate::descriptor::ValidationFilter;
use crate::descriptor::ValidationSeverity;
use crate::error::CompileError;
use crate::identifiers::FileKind;
use crate::identifiers::IdentifierResolver;
use crate::mode::Mode;
use crate::normalize::normalized;
use crate::record::FieldRecord;
use crate::record::ValidationExpectation;

// ============================================================================
// SECTION: Context and Fragments
// ============================================================================

/// Inputs shared by every stage of one record.
#[derive(Debug, Clone, Copy)]
pub struct MappingContext<'a> {
    /// Raw test name, used in error reports.
    pub name: &'a str,
    /// Record being mapped.
    pub record: &'a FieldRecord,
    /// Classified mode of the record.
    pub mode: Mode,
    /// File reference resolver.
    pub resolver: &'a IdentifierResolver,
}

/// Options and assertions contributed by one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// Contributed options, in order.
    pub options: Vec<InvocationOption>,
    /// Contributed assertions, in order.
    pub assertions: Vec<Assertion>,
}

impl Fragment {
    /// Fragment with a single option.
    fn option(option: InvocationOption) -> Self {
        Self {
            options: vec![option],
            assertions: Vec::new(),
        }
    }

    /// Fragment with assertions only.
    fn assertions(assertions: Vec<Assertion>) -> Self {
        Self {
            options: Vec::new(),
            assertions,
        }
    }

    /// Returns true when the stage contributed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.assertions.is_empty()
    }
}

// ============================================================================
// SECTION: Stage Table
// ============================================================================

/// One mapping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// `addl_cmdline_opts`.
    AdditionalArgs,
    /// `priority`.
    MinPriority,
    /// `run_duration`.
    RunDuration,
    /// `conf_file`.
    ConfigFile,
    /// `stderr_*` and `stdout_*` patterns.
    OutputExpectations,
    /// JSON output, requested or implied by the mode.
    OutputJson,
    /// `rules_file`.
    RulesFiles,
    /// `disabled_rules`.
    DisabledRules,
    /// `disable_tags`.
    DisabledTags,
    /// `run_tags`.
    EnabledTags,
    /// `trace_file`.
    CaptureFile,
    /// Validation files, successes, errors, and warnings.
    Validation,
    /// Detection options and count assertions.
    Detection,
    /// Run error and exit status assertions.
    Termination,
}

/// Stages in evaluation order.
pub const STAGES: [Stage; 14] = [
    Stage::AdditionalArgs,
    Stage::MinPriority,
    Stage::RunDuration,
    Stage::ConfigFile,
    Stage::OutputExpectations,
    Stage::OutputJson,
    Stage::RulesFiles,
    Stage::DisabledRules,
    Stage::DisabledTags,
    Stage::EnabledTags,
    Stage::CaptureFile,
    Stage::Validation,
    Stage::Detection,
    Stage::Termination,
];

impl Stage {
    /// Evaluates the stage.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] when a referenced file or entry cannot be
    /// resolved.
    pub fn apply(self, ctx: &MappingContext<'_>) -> Result<Fragment, CompileError> {
        match self {
            Self::AdditionalArgs => Ok(additional_args(ctx)),
            Self::MinPriority => Ok(min_priority(ctx)),
            Self::RunDuration => Ok(run_duration(ctx)),
            Self::ConfigFile => config_file(ctx),
            Self::OutputExpectations => Ok(output_expectations(ctx)),
            Self::OutputJson => Ok(output_json(ctx)),
            Self::RulesFiles => rules_files(ctx),
            Self::DisabledRules => Ok(string_list(&ctx.record.disabled_rules, |rules| {
                InvocationOption::DisabledRules {
                    rules,
                }
            })),
            Self::DisabledTags => Ok(string_list(&ctx.record.disable_tags, |tags| {
                InvocationOption::DisabledTags {
                    tags,
                }
            })),
            Self::EnabledTags => Ok(string_list(&ctx.record.run_tags, |tags| {
                InvocationOption::EnabledTags {
                    tags,
                }
            })),
            Self::CaptureFile => capture_file(ctx),
            Self::Validation => validation(ctx),
            Self::Detection => Ok(detection(ctx)),
            Self::Termination => Ok(termination(ctx)),
        }
    }
}

/// Evaluates every stage in order.
///
/// # Errors
///
/// Returns the first stage failure.
pub fn map_record(ctx: &MappingContext<'_>) -> Result<Vec<(Stage, Fragment)>, CompileError> {
    STAGES.iter().map(|stage| stage.apply(ctx).map(|fragment| (*stage, fragment))).collect()
}

// ============================================================================
// SECTION: Invocation Stages
// ============================================================================

/// Splits the free-text command line into one argument option.
fn additional_args(ctx: &MappingContext<'_>) -> Fragment {
    let args: Vec<String> = ctx
        .record
        .addl_cmdline_opts
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if args.is_empty() {
        return Fragment::default();
    }
    Fragment::option(InvocationOption::Args {
        args,
    })
}

/// Emits the minimum priority option.
fn min_priority(ctx: &MappingContext<'_>) -> Fragment {
    match ctx.record.priority.as_deref() {
        Some(priority) if !priority.is_empty() => {
            Fragment::option(InvocationOption::MinRulePriority {
                priority: priority.to_string(),
            })
        }
        _ => Fragment::default(),
    }
}

/// Emits the duration option for positive durations.
fn run_duration(ctx: &MappingContext<'_>) -> Fragment {
    match ctx.record.run_duration.and_then(|value| u64::try_from(value).ok()) {
        Some(seconds) if seconds > 0 => Fragment::option(InvocationOption::MaxDuration {
            seconds,
        }),
        _ => Fragment::default(),
    }
}

/// Resolves the configuration file option.
fn config_file(ctx: &MappingContext<'_>) -> Result<Fragment, CompileError> {
    match ctx.record.conf_file.as_deref() {
        Some(reference) if !reference.is_empty() => {
            let file = ctx.resolver.resolve(FileKind::Config, reference, ctx.name, "conf_file")?;
            Ok(Fragment::option(InvocationOption::Config {
                file,
            }))
        }
        _ => Ok(Fragment::default()),
    }
}

/// One assertion per output pattern, stream by stream in source order.
fn output_expectations(ctx: &MappingContext<'_>) -> Fragment {
    let record = ctx.record;
    let groups = [
        (record.stderr_contains.as_ref(), OutputStream::Stderr, false),
        (record.stderr_not_contains.as_ref(), OutputStream::Stderr, true),
        (record.stdout_contains.as_ref(), OutputStream::Stdout, false),
        (record.stdout_not_contains.as_ref(), OutputStream::Stdout, true),
    ];
    let assertions = groups
        .into_iter()
        .flat_map(|(field, stream, negated)| {
            normalized(field).iter().map(move |pattern| Assertion::OutputPattern {
                stream,
                pattern: pattern.clone(),
                negated,
            })
        })
        .collect();
    Fragment::assertions(assertions)
}

/// JSON output is requested explicitly or implied by validation and detection.
fn output_json(ctx: &MappingContext<'_>) -> Fragment {
    if ctx.record.json_output || matches!(ctx.mode, Mode::Validation | Mode::Detection) {
        Fragment::option(InvocationOption::OutputJson)
    } else {
        Fragment::default()
    }
}

/// Rules files are loaded for running only; validation names its own files.
fn rules_files(ctx: &MappingContext<'_>) -> Result<Fragment, CompileError> {
    let references = normalized(ctx.record.rules_file.as_ref());
    if ctx.mode == Mode::Validation || references.is_empty() {
        return Ok(Fragment::default());
    }
    let files = ctx.resolver.resolve_all(FileKind::Rules, references, ctx.name, "rules_file")?;
    Ok(Fragment::option(InvocationOption::Rules {
        files,
    }))
}

/// Emits a string list option when the list is non-empty.
fn string_list(values: &[String], build: impl FnOnce(Vec<String>) -> InvocationOption) -> Fragment {
    if values.is_empty() {
        return Fragment::default();
    }
    Fragment::option(build(values.to_vec()))
}

/// Validation never replays a capture.
fn capture_file(ctx: &MappingContext<'_>) -> Result<Fragment, CompileError> {
    match ctx.record.trace_file.as_deref() {
        Some(reference) if !reference.is_empty() && ctx.mode != Mode::Validation => {
            let file =
                ctx.resolver.resolve(FileKind::Capture, reference, ctx.name, "trace_file")?;
            Ok(Fragment::option(InvocationOption::CaptureFile {
                file,
            }))
        }
        _ => Ok(Fragment::default()),
    }
}

// ============================================================================
// SECTION: Validation Stage
// ============================================================================

/// Validation files, expected successes, then errors and warnings.
fn validation(ctx: &MappingContext<'_>) -> Result<Fragment, CompileError> {
    if ctx.mode != Mode::Validation {
        return Ok(Fragment::default());
    }
    let record = ctx.record;
    let references = normalized(record.validate_rules_file.as_ref());

    let mut fragment = Fragment::default();
    if !references.is_empty() {
        let files = ctx.resolver.resolve_all(
            FileKind::Rules,
            references,
            ctx.name,
            "validate_rules_file",
        )?;
        fragment.options.push(InvocationOption::RulesValidation {
            files,
        });
    }
    for expected in &record.validate_ok {
        let index = resolve_validated_index(references, expected).ok_or_else(|| {
            CompileError::UnresolvedReference {
                record: ctx.name.to_string(),
                field: "validate_ok",
                value: expected.clone(),
            }
        })?;
        fragment.assertions.push(Assertion::ValidationSucceeded {
            index,
        });
    }
    let entries = record
        .validate_errors
        .iter()
        .map(|entry| (ValidationSeverity::Error, entry))
        .chain(record.validate_warnings.iter().map(|entry| (ValidationSeverity::Warning, entry)));
    for (severity, entry) in entries {
        fragment.assertions.push(Assertion::ValidationEntry {
            severity,
            filter: validation_filter(entry),
        });
    }
    Ok(fragment)
}

/// Returns the last validated file whose reference contains `expected`.
fn resolve_validated_index(references: &[String], expected: &str) -> Option<usize> {
    references.iter().rposition(|reference| reference.contains(expected))
}

/// Builds the predicate chain in code, item type, item name, message order.
fn validation_filter(entry: &ValidationExpectation) -> ValidationFilter {
    ValidationFilter::new()
        .code(entry.code.as_deref())
        .item_type(entry.item_type.as_deref())
        .item_name(entry.item_name.as_deref())
        .message(entry.message.as_deref())
}

// ============================================================================
// SECTION: Detection Stage
// ============================================================================

/// Detection options, count assertions, then the JSON property overrides.
fn detection(ctx: &MappingContext<'_>) -> Fragment {
    if ctx.mode != Mode::Detection {
        return Fragment::default();
    }
    let record = ctx.record;
    let mut fragment = Fragment::default();
    if record.all_events {
        fragment.options.push(InvocationOption::AllEvents);
    }
    if record.time_iso_8601 {
        fragment.options.push(config_override("time_format_iso_8601", true));
    }
    let sources = normalized(record.enable_source.as_ref());
    if !sources.is_empty() {
        fragment.options.push(InvocationOption::EnabledSources {
            sources: sources.to_vec(),
        });
    }

    let expectation =
        if record.detect { CountExpectation::NonZero } else { CountExpectation::Zero };
    fragment.assertions.push(Assertion::DetectionCount {
        scope: DetectionScope::All,
        expectation,
    });
    for level in normalized(record.detect_level.as_ref()) {
        fragment.assertions.push(Assertion::DetectionCount {
            scope: DetectionScope::Priority(level.clone()),
            expectation,
        });
    }
    for count in record.detect_counts.iter().flat_map(|entry| entry.0.iter()) {
        fragment.assertions.push(Assertion::RuleDetections {
            rule: count.rule.clone(),
            count: count.count,
        });
    }

    fragment
        .options
        .push(config_override("json_include_output_property", record.json_include_output_property));
    fragment
        .options
        .push(config_override("json_include_tags_property", record.json_include_tags_property));
    fragment
}

/// Builds a `-o key=bool` override.
fn config_override(key: &str, value: bool) -> InvocationOption {
    InvocationOption::ConfigOverride {
        key: key.to_string(),
        value: value.to_string(),
    }
}

// ============================================================================
// SECTION: Termination Stage
// ============================================================================

/// Run error expectation followed by the exact exit status.
fn termination(ctx: &MappingContext<'_>) -> Fragment {
    let status = ctx.record.exit_status;
    Fragment::assertions(vec![
        Assertion::RunError {
            expected: status != 0,
        },
        Assertion::ExitCode {
            status,
        },
    ])
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

    fn apply(stage: Stage, record: &FieldRecord, mode: Mode) -> Result<Fragment, CompileError> {
        let resolver = IdentifierResolver::default();
        stage.apply(&MappingContext {
            name: "t",
            record,
            mode,
            resolver: &resolver,
        })
    }

    #[test]
    fn stage_table_is_in_precedence_order() {
        assert_eq!(STAGES.first(), Some(&Stage::AdditionalArgs));
        assert_eq!(STAGES.last(), Some(&Stage::Termination));
        let json = STAGES.iter().position(|stage| *stage == Stage::OutputJson).unwrap();
        let rules = STAGES.iter().position(|stage| *stage == Stage::RulesFiles).unwrap();
        let capture = STAGES.iter().position(|stage| *stage == Stage::CaptureFile).unwrap();
        assert!(json < rules && rules < capture);
    }

    #[test]
    fn additional_args_collapse_repeated_spaces() {
        let record = FieldRecord {
            addl_cmdline_opts: Some("-o  json_output=true -A".to_string()),
            ..FieldRecord::default()
        };
        let fragment = apply(Stage::AdditionalArgs, &record, Mode::PlainRun).unwrap();
        assert_eq!(
            fragment.options,
            [InvocationOption::Args {
                args: vec!["-o".to_string(), "json_output=true".to_string(), "-A".to_string()],
            }]
        );
    }

    #[test]
    fn non_positive_durations_are_ignored() {
        for value in [0, -3] {
            let record = FieldRecord {
                run_duration: Some(value),
                ..FieldRecord::default()
            };
            assert!(apply(Stage::RunDuration, &record, Mode::PlainRun).unwrap().is_empty());
        }
    }

    #[test]
    fn output_patterns_keep_stream_then_source_order() {
        let record = FieldRecord {
            stdout_contains: Some(OneOrMany::Many(vec!["b".to_string(), "a".to_string()])),
            stderr_not_contains: Some(OneOrMany::Single("c".to_string())),
            ..FieldRecord::default()
        };
        let fragment = apply(Stage::OutputExpectations, &record, Mode::PlainRun).unwrap();
        let rendered: Vec<String> = fragment.assertions.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            [
                "assert.NotRegexp(t, `c`, res.Stderr())",
                "assert.Regexp(t, `b`, res.Stdout())",
                "assert.Regexp(t, `a`, res.Stdout())",
            ]
        );
    }

    #[test]
    fn json_output_is_implied_by_mode() {
        let record = FieldRecord::default();
        assert!(apply(Stage::OutputJson, &record, Mode::PlainRun).unwrap().is_empty());
        for mode in [Mode::Validation, Mode::Detection] {
            let fragment = apply(Stage::OutputJson, &record, mode).unwrap();
            assert_eq!(fragment.options, [InvocationOption::OutputJson]);
        }
    }

    #[test]
    fn rules_and_capture_are_suppressed_in_validation() {
        let record = FieldRecord {
            rules_file: Some(OneOrMany::Single("rules/a.yaml".to_string())),
            trace_file: Some("trace_files/b.scap".to_string()),
            ..FieldRecord::default()
        };
        assert!(apply(Stage::RulesFiles, &record, Mode::Validation).unwrap().is_empty());
        assert!(apply(Stage::CaptureFile, &record, Mode::Validation).unwrap().is_empty());
        assert!(!apply(Stage::CaptureFile, &record, Mode::Detection).unwrap().is_empty());
    }

    #[test]
    fn validate_ok_resolves_to_last_substring_match() {
        let references =
            ["rules/a.yaml".to_string(), "rules/b.yaml".to_string(), "rules/ab.yaml".to_string()];
        assert_eq!(resolve_validated_index(&references, "b.yaml"), Some(2));
        assert_eq!(resolve_validated_index(&references, "a.yaml"), Some(0));
        assert_eq!(resolve_validated_index(&references, "zzz"), None);
    }

    #[test]
    fn unknown_validate_ok_is_unresolved_reference() {
        let record = FieldRecord {
            validate_rules_file: Some(OneOrMany::Single("rules/a.yaml".to_string())),
            validate_ok: vec!["rules/missing.yaml".to_string()],
            ..FieldRecord::default()
        };
        let err = apply(Stage::Validation, &record, Mode::Validation).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnresolvedReference {
                record: "t".to_string(),
                field: "validate_ok",
                value: "rules/missing.yaml".to_string(),
            }
        );
    }

    #[test]
    fn validate_ok_entries_may_share_a_file() {
        let record = FieldRecord {
            validate_rules_file: Some(OneOrMany::Single("rules/a.yaml".to_string())),
            validate_ok: vec!["a.yaml".to_string(), "rules/a.yaml".to_string()],
            ..FieldRecord::default()
        };
        let fragment = apply(Stage::Validation, &record, Mode::Validation).unwrap();
        assert_eq!(
            fragment.assertions,
            [
                Assertion::ValidationSucceeded {
                    index: 0
                },
                Assertion::ValidationSucceeded {
                    index: 0
                },
            ]
        );
    }

    #[test]
    fn errors_precede_warnings() {
        let record = FieldRecord {
            validate_warnings: vec![ValidationExpectation {
                code: Some("LOAD_UNUSED_MACRO".to_string()),
                ..ValidationExpectation::default()
            }],
            validate_errors: vec![ValidationExpectation {
                code: Some("LOAD_ERR_VALIDATE".to_string()),
                ..ValidationExpectation::default()
            }],
            ..FieldRecord::default()
        };
        let fragment = apply(Stage::Validation, &record, Mode::Validation).unwrap();
        let severities: Vec<ValidationSeverity> = fragment
            .assertions
            .iter()
            .filter_map(|assertion| match assertion {
                Assertion::ValidationEntry {
                    severity,
                    ..
                } => Some(*severity),
                _ => None,
            })
            .collect();
        assert_eq!(severities, [ValidationSeverity::Error, ValidationSeverity::Warning]);
    }

    #[test]
    fn detection_overrides_pass_booleans_through() {
        let record = FieldRecord {
            detect: true,
            json_include_tags_property: true,
            ..FieldRecord::default()
        };
        let fragment = apply(Stage::Detection, &record, Mode::Detection).unwrap();
        let rendered: Vec<String> = fragment.options.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            [
                "falco.WithArgs(\"-o\", \"json_include_output_property=false\")",
                "falco.WithArgs(\"-o\", \"json_include_tags_property=true\")",
            ]
        );
    }

    #[test]
    fn non_zero_exit_expects_run_error() {
        let record = FieldRecord {
            exit_status: 1,
            ..FieldRecord::default()
        };
        let fragment = apply(Stage::Termination, &record, Mode::PlainRun).unwrap();
        assert_eq!(
            fragment.assertions,
            [
                Assertion::RunError {
                    expected: true
                },
                Assertion::ExitCode {
                    status: 1
                },
            ]
        );
    }
}
