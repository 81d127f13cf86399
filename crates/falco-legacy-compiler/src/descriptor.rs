// crates/falco-legacy-compiler/src/descriptor.rs
// ============================================================================
// Module: Test Descriptors
// Description: Compiled invocation options and assertions for one test.
// Purpose: Renderer-neutral, ordered description of an executable test.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`TestDescriptor`] is the compiled form of one legacy record: the
//! options the monitored executable is launched with and the assertions run
//! against its result, both in emission order. Options and assertions are
//! closed enums that serialize in a tagged, structured form and render
//! (`Display`) to the expression text of the legacy Go harness, e.g.
//! `falco.WithRules(rules.SingleRule)`.
//!
//! ### Rendering
//! - String arguments become escaped double-quoted literals.
//! - Regular expressions are written verbatim as raw backtick literals; a
//!   pattern that itself contains a backtick falls back to a quoted literal.

use std::fmt;
use std::fmt::Write;

use serde::Serialize;

use crate::identifiers::CanonicalName;
use crate::identifiers::FileIdentifier;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Category of an invocation option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionKind {
    /// Raw command line arguments.
    Args,
    /// Minimum rule priority.
    MinRulePriority,
    /// Maximum run duration.
    MaxDuration,
    /// Configuration file.
    Config,
    /// JSON output.
    OutputJson,
    /// Rules files.
    Rules,
    /// Disabled rule patterns.
    DisabledRules,
    /// Disabled tags.
    DisabledTags,
    /// Enabled tags.
    EnabledTags,
    /// Capture file.
    CaptureFile,
    /// Rules files to validate.
    RulesValidation,
    /// Replay all events.
    AllEvents,
    /// Enabled event sources.
    EnabledSources,
    /// `-o key=value` configuration override.
    ConfigOverride,
}

impl OptionKind {
    /// Returns a stable label for the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Args => "args",
            Self::MinRulePriority => "min_rule_priority",
            Self::MaxDuration => "max_duration",
            Self::Config => "config",
            Self::OutputJson => "output_json",
            Self::Rules => "rules",
            Self::DisabledRules => "disabled_rules",
            Self::DisabledTags => "disabled_tags",
            Self::EnabledTags => "enabled_tags",
            Self::CaptureFile => "capture_file",
            Self::RulesValidation => "rules_validation",
            Self::AllEvents => "all_events",
            Self::EnabledSources => "enabled_sources",
            Self::ConfigOverride => "config_override",
        }
    }

    /// Returns true when the category may appear more than once.
    #[must_use]
    pub const fn is_repeatable(self) -> bool {
        matches!(self, Self::Args | Self::ConfigOverride)
    }
}

/// One invocation option of the monitored executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationOption {
    /// Raw command line arguments, in order.
    Args {
        /// Argument tokens.
        args: Vec<String>,
    },
    /// Minimum rule priority.
    MinRulePriority {
        /// Priority name.
        priority: String,
    },
    /// Maximum run duration.
    MaxDuration {
        /// Duration in seconds.
        seconds: u64,
    },
    /// Configuration file.
    Config {
        /// File identifier.
        file: FileIdentifier,
    },
    /// Emit alerts and validation results as JSON.
    OutputJson,
    /// Rules files, in order.
    Rules {
        /// File identifiers.
        files: Vec<FileIdentifier>,
    },
    /// Rule name patterns to disable.
    DisabledRules {
        /// Patterns.
        rules: Vec<String>,
    },
    /// Tags to disable.
    DisabledTags {
        /// Tags.
        tags: Vec<String>,
    },
    /// Tags to enable exclusively.
    EnabledTags {
        /// Tags.
        tags: Vec<String>,
    },
    /// Trace capture to replay.
    CaptureFile {
        /// File identifier.
        file: FileIdentifier,
    },
    /// Rules files to validate without running.
    RulesValidation {
        /// File identifiers.
        files: Vec<FileIdentifier>,
    },
    /// Replay every event of the capture.
    AllEvents,
    /// Event sources to enable.
    EnabledSources {
        /// Source names.
        sources: Vec<String>,
    },
    /// Single configuration override passed as `-o key=value`.
    ConfigOverride {
        /// Configuration key.
        key: String,
        /// Configuration value.
        value: String,
    },
}

impl InvocationOption {
    /// Returns the option category.
    #[must_use]
    pub const fn kind(&self) -> OptionKind {
        match self {
            Self::Args {
                ..
            } => OptionKind::Args,
            Self::MinRulePriority {
                ..
            } => OptionKind::MinRulePriority,
            Self::MaxDuration {
                ..
            } => OptionKind::MaxDuration,
            Self::Config {
                ..
            } => OptionKind::Config,
            Self::OutputJson => OptionKind::OutputJson,
            Self::Rules {
                ..
            } => OptionKind::Rules,
            Self::DisabledRules {
                ..
            } => OptionKind::DisabledRules,
            Self::DisabledTags {
                ..
            } => OptionKind::DisabledTags,
            Self::EnabledTags {
                ..
            } => OptionKind::EnabledTags,
            Self::CaptureFile {
                ..
            } => OptionKind::CaptureFile,
            Self::RulesValidation {
                ..
            } => OptionKind::RulesValidation,
            Self::AllEvents => OptionKind::AllEvents,
            Self::EnabledSources {
                ..
            } => OptionKind::EnabledSources,
            Self::ConfigOverride {
                ..
            } => OptionKind::ConfigOverride,
        }
    }
}

impl fmt::Display for InvocationOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Args {
                args,
            } => write!(f, "falco.WithArgs({})", quoted_list(args)),
            Self::MinRulePriority {
                priority,
            } => write!(f, "falco.WithMinRulePriority({})", quote(priority)),
            Self::MaxDuration {
                seconds,
            } => write!(f, "falco.WithMaxDuration({seconds} * time.Second)"),
            Self::Config {
                file,
            } => write!(f, "falco.WithConfig({file})"),
            Self::OutputJson => f.write_str("falco.WithOutputJSON()"),
            Self::Rules {
                files,
            } => write!(f, "falco.WithRules({})", joined(files)),
            Self::DisabledRules {
                rules,
            } => write!(f, "falco.WithDisabledRules({})", quoted_list(rules)),
            Self::DisabledTags {
                tags,
            } => write!(f, "falco.WithDisabledTags({})", quoted_list(tags)),
            Self::EnabledTags {
                tags,
            } => write!(f, "falco.WithEnabledTags({})", quoted_list(tags)),
            Self::CaptureFile {
                file,
            } => write!(f, "falco.WithCaptureFile({file})"),
            Self::RulesValidation {
                files,
            } => write!(f, "falco.WithRulesValidation({})", joined(files)),
            Self::AllEvents => f.write_str("falco.WithAllEvents()"),
            Self::EnabledSources {
                sources,
            } => write!(f, "falco.WithEnabledSources({})", quoted_list(sources)),
            Self::ConfigOverride {
                key,
                value,
            } => write!(f, "falco.WithArgs(\"-o\", {})", quote(&format!("{key}={value}"))),
        }
    }
}

// ============================================================================
// SECTION: Assertions
// ============================================================================

/// Captured output stream of the monitored executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputStream {
    /// Returns the result accessor for the stream.
    const fn accessor(self) -> &'static str {
        match self {
            Self::Stdout => "res.Stdout()",
            Self::Stderr => "res.Stderr()",
        }
    }
}

/// Severity of a validation result entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSeverity {
    /// Load error.
    Error,
    /// Load warning.
    Warning,
}

/// Field a validation filter predicate compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    /// Result code.
    Code,
    /// Item type.
    ItemType,
    /// Item name.
    ItemName,
    /// Message text.
    Message,
}

impl FilterField {
    /// Returns the fluent filter method for the field.
    const fn method(self) -> &'static str {
        match self {
            Self::Code => "ForCode",
            Self::ItemType => "ForItemType",
            Self::ItemName => "ForItemName",
            Self::Message => "ForMessage",
        }
    }
}

/// One predicate of a validation filter chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterPredicate {
    /// Compared field.
    pub field: FilterField,
    /// Expected value.
    pub value: String,
}

/// Ordered chain of validation result predicates.
///
/// Built fluently; absent or empty components are skipped rather than
/// matched as wildcards.
///
/// # Examples
/// ```
/// use falco_legacy_compiler::descriptor::FilterField;
/// use falco_legacy_compiler::descriptor::ValidationFilter;
///
/// let filter = ValidationFilter::new().code(Some("LOAD_ERR_VALIDATE")).item_name(None::<&str>);
/// assert_eq!(filter.predicates().len(), 1);
/// assert_eq!(filter.predicates()[0].field, FilterField::Code);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationFilter {
    /// Predicates in application order.
    predicates: Vec<FilterPredicate>,
}

impl ValidationFilter {
    /// Starts an empty filter chain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Appends a predicate when the value is present and non-empty.
    #[must_use]
    pub fn with(mut self, field: FilterField, value: Option<impl AsRef<str>>) -> Self {
        if let Some(value) = value
            && !value.as_ref().is_empty()
        {
            self.predicates.push(FilterPredicate {
                field,
                value: value.as_ref().to_string(),
            });
        }
        self
    }

    /// Appends a code predicate.
    #[must_use]
    pub fn code(self, value: Option<impl AsRef<str>>) -> Self {
        self.with(FilterField::Code, value)
    }

    /// Appends an item type predicate.
    #[must_use]
    pub fn item_type(self, value: Option<impl AsRef<str>>) -> Self {
        self.with(FilterField::ItemType, value)
    }

    /// Appends an item name predicate.
    #[must_use]
    pub fn item_name(self, value: Option<impl AsRef<str>>) -> Self {
        self.with(FilterField::ItemName, value)
    }

    /// Appends a message predicate.
    #[must_use]
    pub fn message(self, value: Option<impl AsRef<str>>) -> Self {
        self.with(FilterField::Message, value)
    }

    /// Returns the predicates in application order.
    #[must_use]
    pub fn predicates(&self) -> &[FilterPredicate] {
        &self.predicates
    }
}

/// Scope of a detection count assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "priority", rename_all = "snake_case")]
pub enum DetectionScope {
    /// Every detection.
    All,
    /// Detections at one priority.
    Priority(String),
}

/// Expected magnitude of a detection count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountExpectation {
    /// No detections.
    Zero,
    /// At least one detection.
    NonZero,
}

/// One assertion against the run result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assertion {
    /// Output stream (does not) match a regular expression.
    OutputPattern {
        /// Checked stream.
        stream: OutputStream,
        /// Regular expression, verbatim from the source.
        pattern: String,
        /// True for "must not match".
        negated: bool,
    },
    /// Validation of the file at `index` succeeded.
    ValidationSucceeded {
        /// Zero-based position in the validated files.
        index: usize,
    },
    /// A validation error or warning matching the filter exists.
    ValidationEntry {
        /// Errors or warnings.
        severity: ValidationSeverity,
        /// Predicate chain.
        filter: ValidationFilter,
    },
    /// Detection count is zero or non-zero.
    DetectionCount {
        /// Counted detections.
        #[serde(flatten)]
        scope: DetectionScope,
        /// Expected magnitude.
        expectation: CountExpectation,
    },
    /// Exact detection count of one rule.
    RuleDetections {
        /// Rule name.
        rule: String,
        /// Expected count.
        count: u64,
    },
    /// The run reported (or did not report) an error.
    RunError {
        /// True when an error is expected.
        expected: bool,
    },
    /// Exact exit status.
    ExitCode {
        /// Expected status.
        status: i64,
    },
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputPattern {
                stream,
                pattern,
                negated,
            } => {
                let check = if *negated { "NotRegexp" } else { "Regexp" };
                write!(f, "assert.{check}(t, {}, {})", raw_literal(pattern), stream.accessor())
            }
            Self::ValidationSucceeded {
                index,
            } => write!(f, "assert.True(t, res.RuleValidation().ForIndex({index}).Successful)"),
            Self::ValidationEntry {
                severity,
                filter,
            } => {
                let all = match severity {
                    ValidationSeverity::Error => "AllErrors()",
                    ValidationSeverity::Warning => "AllWarnings()",
                };
                write!(f, "assert.NotNil(t, res.RuleValidation().{all}")?;
                for predicate in filter.predicates() {
                    write!(f, ".\n        {}({})", predicate.field.method(), quote(&predicate.value))?;
                }
                f.write_char(')')
            }
            Self::DetectionCount {
                scope,
                expectation,
            } => {
                let check = match expectation {
                    CountExpectation::Zero => "Zero",
                    CountExpectation::NonZero => "NotZero",
                };
                match scope {
                    DetectionScope::All => {
                        write!(f, "assert.{check}(t, res.Detections().Count())")
                    }
                    DetectionScope::Priority(priority) => write!(
                        f,
                        "assert.{check}(t, res.Detections().ForPriority({}).Count())",
                        quote(priority)
                    ),
                }
            }
            Self::RuleDetections {
                rule,
                count,
            } => write!(
                f,
                "assert.Equal(t, {count}, res.Detections().ForRule({}).Count())",
                quote(rule)
            ),
            Self::RunError {
                expected,
            } => {
                let check = if *expected { "NotNil" } else { "Nil" };
                write!(f, "assert.{check}(t, res.Err(), \"%s\", res.Stderr())")
            }
            Self::ExitCode {
                status,
            } => write!(f, "assert.Equal(t, {status}, res.ExitCode())"),
        }
    }
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Compiled test: canonical name plus ordered options and assertions.
///
/// # Invariants
/// - Exactly one [`Assertion::ExitCode`], always last.
/// - Non-repeatable [`OptionKind`]s appear at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestDescriptor {
    /// Canonical test name.
    pub name: CanonicalName,
    /// Invocation options in emission order.
    pub options: Vec<InvocationOption>,
    /// Assertions in emission order.
    pub assertions: Vec<Assertion>,
}

impl TestDescriptor {
    /// Returns the rendered option expressions.
    #[must_use]
    pub fn option_expressions(&self) -> Vec<String> {
        self.options.iter().map(ToString::to_string).collect()
    }

    /// Returns the rendered assertion expressions.
    #[must_use]
    pub fn assertion_expressions(&self) -> Vec<String> {
        self.assertions.iter().map(ToString::to_string).collect()
    }
}

// ============================================================================
// SECTION: Literal Helpers
// ============================================================================

/// Renders a string as an escaped double-quoted literal.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Renders a pattern as a raw backtick literal when possible.
fn raw_literal(value: &str) -> String {
    if value.contains('`') { quote(value) } else { format!("`{value}`") }
}

/// Renders a comma separated list of quoted strings.
fn quoted_list(values: &[String]) -> String {
    values.iter().map(|value| quote(value)).collect::<Vec<_>>().join(", ")
}

/// Renders a comma separated list of displayable values.
fn joined<T: fmt::Display>(values: &[T]) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
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

    fn file(namespace: &str, name: &str) -> FileIdentifier {
        FileIdentifier {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn options_render_harness_calls() {
        let rules = InvocationOption::Rules {
            files: vec![file("rules", "SingleRule"), file("rules", "OverrideMacro")],
        };
        assert_eq!(rules.to_string(), "falco.WithRules(rules.SingleRule, rules.OverrideMacro)");
        let args = InvocationOption::Args {
            args: vec!["-A".to_string(), "-v".to_string()],
        };
        assert_eq!(args.to_string(), "falco.WithArgs(\"-A\", \"-v\")");
        let duration = InvocationOption::MaxDuration {
            seconds: 5,
        };
        assert_eq!(duration.to_string(), "falco.WithMaxDuration(5 * time.Second)");
        let config_override = InvocationOption::ConfigOverride {
            key: "json_include_tags_property".to_string(),
            value: "false".to_string(),
        };
        assert_eq!(
            config_override.to_string(),
            "falco.WithArgs(\"-o\", \"json_include_tags_property=false\")"
        );
    }

    #[test]
    fn patterns_render_raw_unless_backtick() {
        let plain = Assertion::OutputPattern {
            stream: OutputStream::Stderr,
            pattern: r"Runtime error: .-D/-T.".to_string(),
            negated: false,
        };
        assert_eq!(plain.to_string(), "assert.Regexp(t, `Runtime error: .-D/-T.`, res.Stderr())");
        let ticked = Assertion::OutputPattern {
            stream: OutputStream::Stdout,
            pattern: "a`b".to_string(),
            negated: true,
        };
        assert_eq!(ticked.to_string(), "assert.NotRegexp(t, \"a`b\", res.Stdout())");
    }

    #[test]
    fn validation_entry_renders_chain_in_order() {
        let assertion = Assertion::ValidationEntry {
            severity: ValidationSeverity::Error,
            filter: ValidationFilter::new()
                .code(Some("LOAD_ERR_YAML_VALIDATE"))
                .item_type(Some("rules content"))
                .item_name(Some(""))
                .message(Some("Rules content is not yaml array of objects")),
        };
        assert_eq!(
            assertion.to_string(),
            "assert.NotNil(t, res.RuleValidation().AllErrors().\n        \
             ForCode(\"LOAD_ERR_YAML_VALIDATE\").\n        \
             ForItemType(\"rules content\").\n        \
             ForMessage(\"Rules content is not yaml array of objects\"))"
        );
    }

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(quote("say \"hi\"\\"), "\"say \\\"hi\\\"\\\\\"");
    }

    #[test]
    fn repeatable_kinds() {
        assert!(OptionKind::Args.is_repeatable());
        assert!(OptionKind::ConfigOverride.is_repeatable());
        assert!(!OptionKind::OutputJson.is_repeatable());
        assert!(!OptionKind::Rules.is_repeatable());
    }

    #[test]
    fn structured_form_is_tagged() {
        let value = serde_json::to_value(Assertion::DetectionCount {
            scope: DetectionScope::Priority("WARNING".to_string()),
            expectation: CountExpectation::NonZero,
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "kind": "detection_count",
                "scope": "priority",
                "priority": "WARNING",
                "expectation": "non_zero"
            })
        );
    }
}
