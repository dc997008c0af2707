// crates/gantry-config/tests/roundtrip.rs
// ============================================================================
// Module: Parser Round-Trip Tests
// Description: Canonical serialization followed by reload yields the same spec.
// Purpose: Hold the parser to its normalization fixed point over a corpus.
// ============================================================================

//! Round-trip soundness over a corpus of valid workflow documents:
//! `load(serialize(load(y)))` is equivalent to `load(y)`.

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

use gantry_config::load_workflow;
use gantry_config::serialize_workflow;

// ============================================================================
// SECTION: Corpus
// ============================================================================

/// Valid documents exercising every normalized shape.
const CORPUS: &[&str] = &[
    // Bare minimum.
    r"
on: push
jobs:
  build:
    runs-on: linux
    steps:
      - run: make
",
    // String-or-list coercions and kebab-case keys.
    r"
name: Coercions
on:
  push:
    branches: [main, 'release/**']
    paths-ignore: ['**/*.md']
    tags: ['v*']
jobs:
  build:
    runs-on: [linux, docker]
    timeout-minutes: 30
    steps:
      - name: Checkout
        uses: actions/checkout@v4
        with:
          fetch-depth: 1
      - run: make build
        working-directory: src
        continue-on-error: true
",
    // Full trigger spread with dispatch inputs and concurrency.
    r"
name: Full
on:
  push:
    branches: [main]
  pull_request:
    branches: [main]
    types: [opened, reopened]
  schedule:
    - cron: '0 2 * * *'
  workflow_dispatch:
    inputs:
      environment:
        description: Target
        required: true
        type: choice
        options: [staging, production]
env:
  CI: 'true'
concurrency:
  group: deploy
  cancel-in-progress: true
defaults:
  run:
    shell: bash
    working-directory: app
jobs:
  build:
    runs-on: linux
    steps:
      - run: make
  deploy:
    runs-on: linux
    needs: [build]
    if: github.ref == 'refs/heads/main'
    steps:
      - run: make deploy
",
    // Matrix with include and exclude, services, container.
    r"
name: Matrix
on: [push, pull_request]
jobs:
  test:
    runs-on: linux
    container:
      image: rust:1.92
      env:
        CARGO_HOME: /cargo
    services:
      postgres:
        image: postgres:16
        ports: ['5432']
    strategy:
      fail-fast: false
      max-parallel: 3
      matrix:
        os: [ubuntu, macos]
        node: [18, 20]
        exclude:
          - os: macos
            node: 18
        include:
          - os: ubuntu
            node: 16
            experimental: true
    steps:
      - run: make test
        env:
          NODE_ENV: test
",
];

// ============================================================================
// SECTION: Round-Trip Law
// ============================================================================

#[test]
fn corpus_documents_load_clean() {
    for (index, document) in CORPUS.iter().enumerate() {
        let outcome = load_workflow(document);
        assert!(
            outcome.is_valid(),
            "corpus[{index}] failed: {:?}",
            outcome.errors
        );
    }
}

#[test]
fn serialize_then_load_is_identity_on_normalized_specs() {
    for (index, document) in CORPUS.iter().enumerate() {
        let first = load_workflow(document);
        let spec = first.spec.unwrap();
        let canonical = serialize_workflow(&spec);
        let second = load_workflow(&canonical);
        assert!(
            second.is_valid(),
            "corpus[{index}] reserialized with errors: {:?}",
            second.errors
        );
        assert_eq!(
            second.spec.unwrap(),
            spec,
            "corpus[{index}] round-trip diverged"
        );
    }
}

#[test]
fn serialization_is_a_fixed_point() {
    for document in CORPUS {
        let spec = load_workflow(document).spec.unwrap();
        let once = serialize_workflow(&spec);
        let twice = serialize_workflow(&load_workflow(&once).spec.unwrap());
        assert_eq!(once, twice);
    }
}
