// crates/gantry-core/src/graph.rs
// ============================================================================
// Module: Job Dependency Graph
// Description: Needs-graph validation, cycle detection, and readiness rules.
// Purpose: Drive scheduling order and dependency-failure propagation.
// Dependencies: crate::core::{execution, identifiers, status}
// ============================================================================

//! ## Overview
//! Jobs form a DAG over workflow job keys via `needs`. Validation rejects
//! unknown keys and cycles (DFS on coloured nodes; adjacency is string-keyed,
//! never pointer-linked). Scheduling readiness: a job is ready when every
//! dependency finished with `success`. When any upstream finished with
//! `failed`, `cancelled`, or `timeout`, the dependent is skipped. With
//! `fail_fast`, the first failing matrix instance cancels its still-pending
//! siblings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::core::execution::Job;
use crate::core::identifiers::JobId;
use crate::core::identifiers::JobKey;
use crate::core::status::RunStatus;

// ============================================================================
// SECTION: Static Validation
// ============================================================================

/// Error emitted when every DFS path has been explored and a back-edge found.
pub const CIRCULAR_DEPENDENCY_ERROR: &str = "circular dependency detected in job graph";

/// Validates that every `needs` entry references a declared job key.
///
/// Returns one error per dangling reference.
#[must_use]
pub fn validate_needs(jobs: &[(JobKey, Vec<JobKey>)]) -> Vec<String> {
    let declared: BTreeSet<&JobKey> = jobs.iter().map(|(key, _)| key).collect();
    let mut errors = Vec::new();
    for (key, needs) in jobs {
        for needed in needs {
            if !declared.contains(needed) {
                errors.push(format!(
                    "job '{key}' depends on non-existent job '{needed}'"
                ));
            }
        }
    }
    errors
}

/// DFS colour state for cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    /// Not yet visited.
    White,
    /// On the current DFS stack.
    Grey,
    /// Fully explored.
    Black,
}

/// Detects a cycle in the needs graph.
///
/// Returns true when any back-edge exists. Unknown keys referenced by
/// `needs` are ignored here; [`validate_needs`] reports them separately.
#[must_use]
pub fn has_cycle(jobs: &[(JobKey, Vec<JobKey>)]) -> bool {
    let adjacency: BTreeMap<&JobKey, &Vec<JobKey>> =
        jobs.iter().map(|(key, needs)| (key, needs)).collect();
    let mut colours: BTreeMap<&JobKey, Colour> =
        jobs.iter().map(|(key, _)| (key, Colour::White)).collect();

    for (key, _) in jobs {
        if colours.get(key) == Some(&Colour::White) && visit(key, &adjacency, &mut colours) {
            return true;
        }
    }
    false
}

/// Explores one node iteratively, returning true on a back-edge.
fn visit<'a>(
    start: &'a JobKey,
    adjacency: &BTreeMap<&'a JobKey, &'a Vec<JobKey>>,
    colours: &mut BTreeMap<&'a JobKey, Colour>,
) -> bool {
    // Explicit stack of (node, next-edge-index) frames to keep recursion
    // depth independent of graph size.
    let mut stack: Vec<(&JobKey, usize)> = vec![(start, 0)];
    colours.insert(start, Colour::Grey);

    while let Some((node, edge)) = stack.pop() {
        let needs = adjacency.get(node).copied();
        let Some(needs) = needs else {
            colours.insert(node, Colour::Black);
            continue;
        };
        if edge >= needs.len() {
            colours.insert(node, Colour::Black);
            continue;
        }
        stack.push((node, edge + 1));
        let next = &needs[edge];
        match colours.get(next) {
            Some(Colour::Grey) => return true,
            Some(Colour::White) => {
                colours.insert(next, Colour::Grey);
                stack.push((next, 0));
            }
            _ => {}
        }
    }
    false
}

// ============================================================================
// SECTION: Scheduling Readiness
// ============================================================================

/// Scheduling decision for one pending job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// All dependencies succeeded; the job may be queued.
    Ready,
    /// Some dependency is still in flight.
    Waiting,
    /// Some dependency finished with failure/cancel/timeout; skip the job.
    Skip,
}

/// Evaluates readiness of one job against its execution's jobs.
///
/// Matrix instances share a job key, so a dependency on key `k` waits for
/// every instance of `k`. A skipped upstream also skips the dependent:
/// its required output never materialized, so skips propagate down the
/// chain.
#[must_use]
pub fn readiness(job: &Job, all_jobs: &[Job]) -> Readiness {
    let mut waiting = false;
    for needed in &job.needs {
        for upstream in all_jobs.iter().filter(|other| &other.job_key == needed) {
            if upstream.status.is_dependency_failure() || upstream.status == RunStatus::Skipped {
                return Readiness::Skip;
            }
            if upstream.status != RunStatus::Success {
                waiting = true;
            }
        }
    }
    if waiting {
        Readiness::Waiting
    } else {
        Readiness::Ready
    }
}

/// Returns the pending jobs of an execution that are ready to queue.
#[must_use]
pub fn ready_jobs(all_jobs: &[Job]) -> Vec<JobId> {
    all_jobs
        .iter()
        .filter(|job| job.status == RunStatus::Pending)
        .filter(|job| readiness(job, all_jobs) == Readiness::Ready)
        .map(|job| job.id)
        .collect()
}

/// Returns the pending jobs that must be skipped due to upstream failures.
#[must_use]
pub fn skippable_jobs(all_jobs: &[Job]) -> Vec<JobId> {
    all_jobs
        .iter()
        .filter(|job| job.status == RunStatus::Pending)
        .filter(|job| readiness(job, all_jobs) == Readiness::Skip)
        .map(|job| job.id)
        .collect()
}

/// Returns the not-yet-running matrix siblings to cancel under `fail_fast`.
///
/// Siblings share the failing job's key within the same execution. A
/// sibling already executing on a runner is left to finish; pending and
/// queued-but-unassigned instances cancel.
#[must_use]
pub fn fail_fast_siblings(failed: &Job, all_jobs: &[Job]) -> Vec<JobId> {
    all_jobs
        .iter()
        .filter(|job| job.id != failed.id)
        .filter(|job| job.job_key == failed.job_key)
        .filter(|job| {
            job.status == RunStatus::Pending
                || (job.status == RunStatus::Queued && job.runner_id.is_none())
        })
        .map(|job| job.id)
        .collect()
}

/// Derives the execution status from its jobs' terminal states.
///
/// Returns `None` while any job is still in flight. Failure dominates
/// timeout, which dominates cancellation; skipped jobs do not fail the run.
#[must_use]
pub fn aggregate_status(all_jobs: &[Job]) -> Option<RunStatus> {
    if all_jobs.iter().any(|job| !job.status.is_terminal()) {
        return None;
    }
    if all_jobs
        .iter()
        .any(|job| job.status == RunStatus::Failed)
    {
        return Some(RunStatus::Failed);
    }
    if all_jobs
        .iter()
        .any(|job| job.status == RunStatus::Timeout)
    {
        return Some(RunStatus::Timeout);
    }
    if all_jobs
        .iter()
        .any(|job| job.status == RunStatus::Cancelled)
    {
        return Some(RunStatus::Cancelled);
    }
    Some(RunStatus::Success)
}
