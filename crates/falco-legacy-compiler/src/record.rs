// crates/falco-legacy-compiler/src/record.rs
// ============================================================================
// Module: Legacy Records
// Description: Raw legacy test entries and the documents that group them.
// Purpose: Typed, order-preserving view of the legacy regression YAML.
// Dependencies: serde, serde_yaml
// ============================================================================

//! ## Overview
//! A legacy document maps group names to test names to [`FieldRecord`]s.
//! Every record field is optional; unknown fields are ignored. Groups and
//! tests are held in sorted maps so iteration (and therefore the emitted
//! descriptor order) is deterministic.
//!
//! A present key with a null value (`~` or nothing after the colon) reads as
//! the field's zero value, the same as a missing key.
//!
//! `detect_counts` keeps the key order of each YAML mapping, which a plain
//! map type would lose, so it has a hand-written deserializer.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use serde::Deserializer;
use serde::de::MapAccess;
use serde::de::Visitor;

use crate::error::LoadError;
use crate::normalize::OneOrMany;

// ============================================================================
// SECTION: Record Types
// ============================================================================

/// One raw legacy test entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldRecord {
    /// Free-text extra command line, split on whitespace.
    pub addl_cmdline_opts: Option<String>,
    /// Minimum rule priority.
    pub priority: Option<String>,
    /// Maximum run duration in seconds.
    pub run_duration: Option<i64>,
    /// Falco configuration file reference.
    pub conf_file: Option<String>,
    /// Rules file reference(s).
    pub rules_file: Option<OneOrMany<String>>,
    /// Rule name patterns to disable.
    #[serde(deserialize_with = "null_as_default")]
    pub disabled_rules: Vec<String>,
    /// Tags to disable.
    #[serde(deserialize_with = "null_as_default")]
    pub disable_tags: Vec<String>,
    /// Tags to enable exclusively.
    #[serde(deserialize_with = "null_as_default")]
    pub run_tags: Vec<String>,
    /// Replay every event of the capture.
    #[serde(deserialize_with = "null_as_default")]
    pub all_events: bool,
    /// Event sources to enable.
    pub enable_source: Option<OneOrMany<String>>,
    /// Trace capture file reference.
    pub trace_file: Option<String>,
    /// Patterns stderr must match.
    pub stderr_contains: Option<OneOrMany<String>>,
    /// Patterns stderr must not match.
    pub stderr_not_contains: Option<OneOrMany<String>>,
    /// Patterns stdout must match.
    pub stdout_contains: Option<OneOrMany<String>>,
    /// Patterns stdout must not match.
    pub stdout_not_contains: Option<OneOrMany<String>>,
    /// Any detection expected.
    #[serde(deserialize_with = "null_as_default")]
    pub detect: bool,
    /// Priorities detections are checked at.
    pub detect_level: Option<OneOrMany<String>>,
    /// Exact per-rule detection counts.
    #[serde(deserialize_with = "null_as_default")]
    pub detect_counts: Vec<RuleCounts>,
    /// Detection counts are checked.
    #[serde(deserialize_with = "null_as_default")]
    pub check_detection_counts: bool,
    /// JSON output requested.
    #[serde(deserialize_with = "null_as_default")]
    pub json_output: bool,
    /// Use ISO-8601 timestamps.
    #[serde(deserialize_with = "null_as_default")]
    pub time_iso_8601: bool,
    /// Include the formatted output property in JSON alerts.
    #[serde(deserialize_with = "null_as_default")]
    pub json_include_output_property: bool,
    /// Include the tags property in JSON alerts.
    #[serde(deserialize_with = "null_as_default")]
    pub json_include_tags_property: bool,
    /// Rules files loaded for validation only.
    pub validate_rules_file: Option<OneOrMany<String>>,
    /// Substrings naming validation files expected to load cleanly.
    #[serde(deserialize_with = "null_as_default")]
    pub validate_ok: Vec<String>,
    /// Expected validation errors.
    #[serde(deserialize_with = "null_as_default")]
    pub validate_errors: Vec<ValidationExpectation>,
    /// Expected validation warnings.
    #[serde(deserialize_with = "null_as_default")]
    pub validate_warnings: Vec<ValidationExpectation>,
    /// Expected exit status.
    #[serde(deserialize_with = "null_as_default")]
    pub exit_status: i64,
    /// Nested rule event fixtures (no mapping rule).
    pub rules_events: Option<serde_yaml::Value>,
    /// gRPC output fixtures (no mapping rule).
    pub grpc: Option<serde_yaml::Value>,
    /// Package test fixtures (no mapping rule).
    pub package: Option<serde_yaml::Value>,
}

/// Reads a null as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One expected validation error or warning.
///
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationExpectation {
    /// Item type (`rule`, `macro`, ...).
    pub item_type: Option<String>,
    /// Item name.
    pub item_name: Option<String>,
    /// Result code (`LOAD_ERR_VALIDATE`, ...).
    pub code: Option<String>,
    /// Message text.
    pub message: Option<String>,
}

/// Exact detection count expected for one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCount {
    /// Rule name.
    pub rule: String,
    /// Expected detections.
    pub count: u64,
}

/// One `detect_counts` entry: a mapping of rule names to counts, in source
/// key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleCounts(pub Vec<RuleCount>);

impl<'de> Deserialize<'de> for RuleCounts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        /// Visitor collecting map entries in order.
        struct RuleCountsVisitor;

        impl<'de> Visitor<'de> for RuleCountsVisitor {
            type Value = RuleCounts;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a mapping of rule names to detection counts")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut counts = Vec::with_capacity(map.size_hint().unwrap_or(1));
                while let Some((rule, count)) = map.next_entry::<String, u64>()? {
                    counts.push(RuleCount {
                        rule,
                        count,
                    });
                }
                Ok(RuleCounts(counts))
            }
        }

        deserializer.deserialize_map(RuleCountsVisitor)
    }
}

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Legacy regression document: group name -> test name -> record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct LegacyDocument {
    /// Groups in sorted order.
    pub groups: BTreeMap<String, BTreeMap<String, FieldRecord>>,
}

/// A record together with its position in the document.
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    /// Group name.
    pub group: &'a str,
    /// Raw test name.
    pub name: &'a str,
    /// Record fields.
    pub record: &'a FieldRecord,
}

impl LegacyDocument {
    /// Parses a document from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Parse`] when the YAML does not have the document
    /// structure. An empty document parses as an empty set of groups.
    pub fn from_yaml_str(content: &str) -> Result<Self, LoadError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|err| LoadError::Parse(err.to_string()))
    }

    /// Reads and parses a document, enforcing a size limit.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the file cannot be read, exceeds
    /// `max_bytes`, is not UTF-8, or does not parse.
    pub fn load(path: &Path, max_bytes: usize) -> Result<Self, LoadError> {
        let file = fs::File::open(path).map_err(|err| LoadError::Io(err.to_string()))?;
        let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
        let mut bytes = Vec::new();
        file.take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|err| LoadError::Io(err.to_string()))?;
        if bytes.len() > max_bytes {
            return Err(LoadError::TooLarge {
                path: path.display().to_string(),
                limit: max_bytes,
            });
        }
        let content = String::from_utf8(bytes).map_err(|_| {
            LoadError::Parse(format!("{} must be utf-8", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Loads and merges several documents in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`LoadError`] raised by [`Self::load`] or
    /// [`Self::merge`].
    pub fn load_all<P: AsRef<Path>>(paths: &[P], max_bytes: usize) -> Result<Self, LoadError> {
        let mut document = Self::default();
        for path in paths {
            document.merge(Self::load(path.as_ref(), max_bytes)?)?;
        }
        Ok(document)
    }

    /// Merges another document into this one.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Duplicate`] when a test name already exists in
    /// the same group.
    pub fn merge(&mut self, other: Self) -> Result<(), LoadError> {
        for (group, tests) in other.groups {
            let target = self.groups.entry(group.clone()).or_default();
            for (name, record) in tests {
                match target.entry(name) {
                    Entry::Occupied(entry) => {
                        return Err(LoadError::Duplicate {
                            group,
                            record: entry.key().clone(),
                        });
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(record);
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns every record in document order.
    #[must_use]
    pub fn records(&self) -> Vec<RecordRef<'_>> {
        self.groups
            .iter()
            .flat_map(|(group, tests)| {
                tests.iter().map(move |(name, record)| RecordRef {
                    group,
                    name,
                    record,
                })
            })
            .collect()
    }

    /// Returns the total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    /// Returns true when the document holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
