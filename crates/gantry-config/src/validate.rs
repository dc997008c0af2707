// crates/gantry-config/src/validate.rs
// ============================================================================
// Module: Semantic Workflow Validation
// Description: Job-key format, dependency resolution, and cycle checks.
// Purpose: Enforce the rules the structural schema cannot express.
// Dependencies: gantry-core, regex
// ============================================================================

//! ## Overview
//! The semantic pass runs over the normalized spec: job keys must match the
//! key grammar, every `needs` entry must reference a declared job, and the
//! dependency graph must be acyclic (one error per document for cycles).
//! Cron expressions are validated as 5-or-6 field strings; the schedule
//! daemon consuming them is an external collaborator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use gantry_core::JobKey;
use gantry_core::WorkflowSpec;
use gantry_core::graph::CIRCULAR_DEPENDENCY_ERROR;
use gantry_core::graph::has_cycle;
use gantry_core::graph::validate_needs;
use regex::Regex;

// ============================================================================
// SECTION: Field Grammars
// ============================================================================

/// Job key grammar source.
const JOB_KEY_PATTERN: &str = "^[A-Za-z_][A-Za-z0-9_-]*$";

/// Returns the compiled job key grammar.
fn job_key_regex() -> &'static Regex {
    static COMPILED: OnceLock<Regex> = OnceLock::new();
    COMPILED.get_or_init(|| {
        #[allow(
            clippy::expect_used,
            reason = "The pattern is a compile-time constant known to be valid."
        )]
        Regex::new(JOB_KEY_PATTERN).expect("job key pattern compiles")
    })
}

/// Returns true when the job key matches the key grammar.
#[must_use]
pub fn job_key_is_well_formed(key: &str) -> bool {
    job_key_regex().is_match(key)
}

/// Returns true when the cron expression has 5 or 6 whitespace-separated
/// fields.
#[must_use]
pub fn cron_is_well_formed(expression: &str) -> bool {
    let fields = expression.split_whitespace().count();
    fields == 5 || fields == 6
}

// ============================================================================
// SECTION: Spec-Level Checks
// ============================================================================

/// Validates dependency resolution and acyclicity over a normalized spec.
///
/// Returns one error per dangling `needs` reference and a single circular
/// dependency error when any back-edge exists.
#[must_use]
pub fn check_spec(spec: &WorkflowSpec) -> Vec<String> {
    let adjacency: Vec<(JobKey, Vec<JobKey>)> = spec
        .jobs
        .iter()
        .map(|job| (job.key.clone(), job.needs.clone()))
        .collect();

    let mut errors = validate_needs(&adjacency);
    if has_cycle(&adjacency) {
        errors.push(CIRCULAR_DEPENDENCY_ERROR.to_string());
    }
    errors
}
