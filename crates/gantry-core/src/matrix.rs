// crates/gantry-core/src/matrix.rs
// ============================================================================
// Module: Matrix Expander
// Description: Cartesian expansion of job strategy matrices.
// Purpose: Turn one declared job into concrete instances with stable order.
// Dependencies: crate::core::workflow, serde_json
// ============================================================================

//! ## Overview
//! A matrix expands into the cartesian product over its variable axes in
//! declaration order. Combinations that are a superset of any `exclude`
//! pattern are dropped; `include` entries are appended verbatim after the
//! base product and are never de-duplicated (an include may legitimately
//! re-add an excluded base combination). An empty matrix yields exactly one
//! empty combination. `max_parallel` is advisory to the scheduler and plays
//! no role here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::workflow::MatrixRow;
use crate::core::workflow::MatrixSpec;
use crate::core::workflow::StrategySpec;

// ============================================================================
// SECTION: Expansion
// ============================================================================

/// Expands a job strategy into concrete matrix combinations.
///
/// Returns a single empty combination when no matrix is declared.
#[must_use]
pub fn expand_strategy(strategy: Option<&StrategySpec>) -> Vec<MatrixRow> {
    match strategy.and_then(|strategy| strategy.matrix.as_ref()) {
        Some(matrix) if !matrix.is_empty() => expand_matrix(matrix),
        _ => vec![MatrixRow::new()],
    }
}

/// Expands a matrix definition into concrete combinations.
#[must_use]
pub fn expand_matrix(matrix: &MatrixSpec) -> Vec<MatrixRow> {
    let mut combinations = Vec::new();

    // An axis with no values empties the whole product.
    if matrix.axes.iter().any(|axis| axis.values.is_empty()) {
        return finish(combinations, matrix);
    }

    if !matrix.axes.is_empty() {
        let mut indices = vec![0_usize; matrix.axes.len()];
        loop {
            let combination: MatrixRow = matrix
                .axes
                .iter()
                .zip(&indices)
                .map(|(axis, &index)| (axis.key.clone(), axis.values[index].clone()))
                .collect();
            if !is_excluded(&combination, &matrix.exclude) {
                combinations.push(combination);
            }
            // Odometer increment over axis indices, last axis fastest.
            let mut position = matrix.axes.len();
            loop {
                if position == 0 {
                    return finish(combinations, matrix);
                }
                position -= 1;
                indices[position] += 1;
                if indices[position] < matrix.axes[position].values.len() {
                    break;
                }
                indices[position] = 0;
            }
        }
    }

    finish(combinations, matrix)
}

/// Appends include entries verbatim after the filtered base product.
fn finish(mut combinations: Vec<MatrixRow>, matrix: &MatrixSpec) -> Vec<MatrixRow> {
    combinations.extend(matrix.include.iter().cloned());
    combinations
}

/// Returns true when the combination is a superset of any exclude pattern.
///
/// A pattern matches when every pattern key equals the combination's value
/// for that key.
fn is_excluded(combination: &MatrixRow, exclude: &[MatrixRow]) -> bool {
    exclude.iter().any(|pattern| {
        pattern
            .iter()
            .all(|(key, value)| row_value(combination, key) == Some(value))
    })
}

/// Looks up the value bound to `key` in an ordered row.
fn row_value<'a>(row: &'a MatrixRow, key: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(candidate, _)| candidate == key)
        .map(|(_, value)| value)
}

// ============================================================================
// SECTION: Display Names
// ============================================================================

/// Composes the display name for a matrix job instance.
///
/// Values are joined in declaration order: `"{job_name} ({v1, v2, ...})"`.
/// An empty combination yields the bare job name.
#[must_use]
pub fn display_name(job_name: &str, combination: &MatrixRow) -> String {
    if combination.is_empty() {
        return job_name.to_string();
    }
    let values = combination
        .iter()
        .map(|(_, value)| scalar_label(value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{job_name} ({values})")
}

/// Renders a matrix value as a bare scalar label (strings unquoted).
fn scalar_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Counts the combinations a strategy expands into.
#[must_use]
pub fn count_combinations(strategy: Option<&StrategySpec>) -> usize {
    expand_strategy(strategy).len()
}
