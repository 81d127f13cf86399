// crates/falco-legacy-config/src/lib.rs
// ============================================================================
// Module: Falco Legacy Config Library
// Description: Canonical settings model for the legacy test compiler.
// Purpose: Single source of truth for falco-legacy.toml semantics.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! `falco-legacy-config` defines the settings that drive a compilation run:
//! which legacy YAML documents to read, where the descriptor bundle is
//! written, how file references become identifiers, and where skip notices
//! are logged. Loading is strict and fails closed.
//!
//! The set of excluded test names is not part of this model; it
//! is a compile-time constant of the compiler crate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
