// crates/gantry-core/tests/matrix_unit.rs
// ============================================================================
// Module: Matrix Expander Unit Tests
// Description: Cartesian expansion with include/exclude and display names.
// Purpose: Validate expansion order, exclusion, and name composition.
// ============================================================================

//! Matrix expansion tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use gantry_core::MatrixAxis;
use gantry_core::MatrixRow;
use gantry_core::MatrixSpec;
use gantry_core::StrategySpec;
use gantry_core::matrix::display_name;
use gantry_core::matrix::expand_matrix;
use gantry_core::matrix::expand_strategy;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn axis(key: &str, values: &[&str]) -> MatrixAxis {
    MatrixAxis {
        key: key.to_string(),
        values: values.iter().map(|value| json!(value)).collect(),
    }
}

fn row(pairs: &[(&str, serde_json::Value)]) -> MatrixRow {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

// ============================================================================
// SECTION: Expansion
// ============================================================================

#[test]
fn empty_matrix_yields_one_empty_combination() {
    let combos = expand_strategy(None);
    assert_eq!(combos, vec![MatrixRow::new()]);

    let strategy = StrategySpec::default();
    assert_eq!(expand_strategy(Some(&strategy)), vec![MatrixRow::new()]);
}

#[test]
fn cartesian_product_preserves_declaration_order() {
    let matrix = MatrixSpec {
        axes: vec![axis("os", &["ubuntu", "macos"]), axis("node", &["18", "20"])],
        include: Vec::new(),
        exclude: Vec::new(),
    };
    let combos = expand_matrix(&matrix);
    assert_eq!(
        combos,
        vec![
            row(&[("os", json!("ubuntu")), ("node", json!("18"))]),
            row(&[("os", json!("ubuntu")), ("node", json!("20"))]),
            row(&[("os", json!("macos")), ("node", json!("18"))]),
            row(&[("os", json!("macos")), ("node", json!("20"))]),
        ]
    );
}

#[test]
fn exclude_then_include_in_order() {
    // Seed scenario: exclude one base combination, include one extra.
    let matrix = MatrixSpec {
        axes: vec![axis("os", &["ubuntu", "macos"]), axis("node", &["18", "20"])],
        include: vec![row(&[
            ("os", json!("ubuntu")),
            ("node", json!("16")),
            ("experimental", json!(true)),
        ])],
        exclude: vec![row(&[("os", json!("macos")), ("node", json!("18"))])],
    };
    let combos = expand_matrix(&matrix);
    assert_eq!(
        combos,
        vec![
            row(&[("os", json!("ubuntu")), ("node", json!("18"))]),
            row(&[("os", json!("ubuntu")), ("node", json!("20"))]),
            row(&[("os", json!("macos")), ("node", json!("20"))]),
            row(&[
                ("os", json!("ubuntu")),
                ("node", json!("16")),
                ("experimental", json!(true)),
            ]),
        ]
    );
}

#[test]
fn exclude_pattern_matches_on_subset_of_keys() {
    let matrix = MatrixSpec {
        axes: vec![axis("os", &["ubuntu", "macos"]), axis("node", &["18", "20"])],
        include: Vec::new(),
        exclude: vec![row(&[("os", json!("macos"))])],
    };
    let combos = expand_matrix(&matrix);
    assert_eq!(combos.len(), 2);
    assert!(combos.iter().all(|combo| {
        combo
            .iter()
            .any(|(key, value)| key == "os" && value == &json!("ubuntu"))
    }));
}

#[test]
fn include_may_re_add_an_excluded_combination() {
    let excluded = row(&[("os", json!("macos")), ("node", json!("18"))]);
    let matrix = MatrixSpec {
        axes: vec![axis("os", &["ubuntu", "macos"]), axis("node", &["18", "20"])],
        include: vec![excluded.clone()],
        exclude: vec![excluded.clone()],
    };
    let combos = expand_matrix(&matrix);
    assert_eq!(combos.len(), 4);
    assert_eq!(combos.last(), Some(&excluded));
}

// ============================================================================
// SECTION: Display Names
// ============================================================================

#[test]
fn display_name_joins_values_in_declaration_order() {
    let combo = row(&[("os", json!("ubuntu-22.04")), ("node", json!("18"))]);
    assert_eq!(display_name("Build", &combo), "Build (ubuntu-22.04, 18)");
}

#[test]
fn display_name_for_empty_combination_is_bare_job_name() {
    assert_eq!(display_name("Build", &MatrixRow::new()), "Build");
}

#[test]
fn display_name_renders_non_string_scalars() {
    let combo = row(&[("node", json!(18)), ("experimental", json!(true))]);
    assert_eq!(display_name("Test", &combo), "Test (18, true)");
}
