// crates/gantry-config/src/lib.rs
// ============================================================================
// Module: Gantry Config
// Description: Workflow YAML loading, normalization, and validation.
// Purpose: Turn raw pipeline YAML into a validated WorkflowSpec.
// Dependencies: gantry-core, jsonschema, regex, serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! Configuration is the source of truth for every execution, so loading is
//! total: parsing never panics and never throws past the boundary. All
//! failures accumulate into an error list, and `is_valid` is simply "no
//! errors". Two passes run over every document and their error sets union:
//! a JSON-Schema structural pass over the raw document and a semantic pass
//! that normalizes shapes (string-or-list fields, kebab-case keys, trigger
//! spellings) while checking job keys, step shapes, dependency resolution,
//! and cycles.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// YAML loading and normalization.
pub mod parser;
/// JSON-Schema structural validation.
pub mod schema;
/// Semantic validation over the normalized spec.
pub mod validate;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::parser::ParseOutcome;
pub use crate::parser::load_workflow;
pub use crate::parser::serialize_workflow;
pub use crate::schema::validate_document;
