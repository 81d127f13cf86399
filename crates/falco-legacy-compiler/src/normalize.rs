// crates/falco-legacy-compiler/src/normalize.rs
// ============================================================================
// Module: Field Normalizer
// Description: Single-or-many field shape and its canonical sequence view.
// Purpose: Remove per-use-site type tests on loosely typed YAML fields.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Several legacy fields accept either a scalar or a list (`rules_file:
//! foo.yaml` and `rules_file: [a.yaml, b.yaml]` are both valid). The shape is
//! captured once by [`OneOrMany`] and every consumer reads it through
//! [`normalized`], which yields an ordered slice in all cases.

use serde::Deserialize;
use serde::Serialize;

/// A field that may hold one value or an ordered list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// Scalar form.
    Single(T),
    /// List form, in source order.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Returns the values as an ordered slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        Self::Single(value)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values)
    }
}

/// Normalizes an optional single-or-many field to an ordered slice.
///
/// Absent fields yield an empty slice and scalars a one-element slice.
#[must_use]
pub fn normalized<T>(field: Option<&OneOrMany<T>>) -> &[T] {
    match field {
        Some(value) => value.as_slice(),
        None => &[],
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

    #[test]
    fn absent_field_is_empty() {
        assert!(normalized::<String>(None).is_empty());
    }

    #[test]
    fn scalar_yaml_becomes_single_element() {
        let field: OneOrMany<String> = serde_yaml::from_str("rules/a.yaml").unwrap();
        assert_eq!(field, OneOrMany::Single("rules/a.yaml".to_string()));
        assert_eq!(normalized(Some(&field)), ["rules/a.yaml".to_string()]);
    }

    #[test]
    fn list_yaml_keeps_source_order() {
        let field: OneOrMany<String> = serde_yaml::from_str("[b, a, c]").unwrap();
        assert_eq!(normalized(Some(&field)), ["b", "a", "c"]);
    }

    #[test]
    fn empty_list_is_empty() {
        let field: OneOrMany<String> = serde_yaml::from_str("[]").unwrap();
        assert!(normalized(Some(&field)).is_empty());
    }
}
