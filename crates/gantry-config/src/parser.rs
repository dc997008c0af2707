// crates/gantry-config/src/parser.rs
// ============================================================================
// Module: Workflow YAML Parser
// Description: YAML loading and normalization into a WorkflowSpec.
// Purpose: Accept every supported spelling and produce one canonical form.
// Dependencies: gantry-core, serde_json, serde_yaml, crate::{schema, validate}
// ============================================================================

//! ## Overview
//! Loading is total: every failure is accumulated into the outcome's error
//! list and the function never panics on untrusted documents. The semantic
//! pass walks the YAML value tree directly because YAML mappings preserve
//! declaration order, which is meaningful for jobs, steps, and matrix axes.
//! The structural schema pass runs over a JSON conversion of the same
//! document; both error sets are union'd.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use gantry_core::ConcurrencySpec;
use gantry_core::ContainerSpec;
use gantry_core::DispatchInput;
use gantry_core::DispatchInputType;
use gantry_core::DispatchSpec;
use gantry_core::JobKey;
use gantry_core::JobSpec;
use gantry_core::MatrixAxis;
use gantry_core::MatrixRow;
use gantry_core::MatrixSpec;
use gantry_core::PullRequestFilter;
use gantry_core::PushFilter;
use gantry_core::RunDefaults;
use gantry_core::ScheduleEntry;
use gantry_core::ServiceSpec;
use gantry_core::StepAction;
use gantry_core::StepSpec;
use gantry_core::StrategySpec;
use gantry_core::TriggerSpec;
use gantry_core::WorkflowSpec;
use gantry_core::core::workflow::ContainerCredentials;
use gantry_core::core::workflow::DEFAULT_SHELL;
use gantry_core::core::workflow::DEFAULT_TIMEOUT_MINUTES;
use serde_json::Value as Json;
use serde_yaml::Mapping;
use serde_yaml::Value as Yaml;

use crate::schema::validate_document;
use crate::validate;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Workflow name applied when the document omits `name`.
const DEFAULT_WORKFLOW_NAME: &str = "Unnamed Pipeline";

/// Result of loading a workflow document.
///
/// # Invariants
/// - `spec` is `Some` whenever the document parsed as a YAML mapping, even
///   when validation errors exist; `errors.is_empty()` is the validity bit
///   stamped on the stored configuration.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// Normalized spec, when the document parsed at all.
    pub spec: Option<WorkflowSpec>,
    /// Accumulated structural and semantic errors.
    pub errors: Vec<String>,
}

impl ParseOutcome {
    /// Returns true when the document loaded without errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Loads and validates a workflow document.
#[must_use]
pub fn load_workflow(yaml_raw: &str) -> ParseOutcome {
    let document: Yaml = match serde_yaml::from_str(yaml_raw) {
        Ok(document) => document,
        Err(error) => {
            return ParseOutcome {
                spec: None,
                errors: vec![format!("YAML syntax error: {error}")],
            };
        }
    };
    let Yaml::Mapping(root) = document else {
        return ParseOutcome {
            spec: None,
            errors: vec!["pipeline configuration must be a YAML mapping".to_string()],
        };
    };

    let mut errors = validate_document(&yaml_to_json(&Yaml::Mapping(root.clone())));

    let mut parser = Parser::default();
    let spec = parser.parse_root(&root);
    errors.extend(parser.errors);
    errors.extend(validate::check_spec(&spec));

    ParseOutcome {
        spec: Some(spec),
        errors,
    }
}

// ============================================================================
// SECTION: Semantic Parser
// ============================================================================

/// Error-accumulating semantic parser.
#[derive(Debug, Default)]
struct Parser {
    /// Accumulated semantic errors.
    errors: Vec<String>,
}

impl Parser {
    /// Parses the document root.
    fn parse_root(&mut self, root: &Mapping) -> WorkflowSpec {
        let jobs = self.parse_jobs(root.get("jobs"));
        if jobs.is_empty() {
            self.errors
                .push("pipeline must have at least one job".to_string());
        }
        WorkflowSpec {
            name: get_string(root, "name").unwrap_or_else(|| DEFAULT_WORKFLOW_NAME.to_string()),
            triggers: self.parse_triggers(root.get("on")),
            env: self.parse_env(root.get("env"), "env"),
            defaults: parse_defaults(root.get("defaults")),
            concurrency: self.parse_concurrency(root.get("concurrency")),
            jobs,
        }
    }

    // ------------------------------------------------------------------
    // Triggers
    // ------------------------------------------------------------------

    /// Parses the `on` field in its three accepted shapes.
    fn parse_triggers(&mut self, on: Option<&Yaml>) -> TriggerSpec {
        match on {
            None | Some(Yaml::Null) => TriggerSpec::default(),
            Some(Yaml::String(kind)) => self.trigger_from_kind(kind, None),
            Some(Yaml::Sequence(kinds)) => {
                let mut triggers = TriggerSpec::default();
                for kind in kinds {
                    if let Some(kind) = kind.as_str() {
                        merge_triggers(&mut triggers, self.trigger_from_kind(kind, None));
                    }
                }
                triggers
            }
            Some(Yaml::Mapping(mapping)) => {
                let mut triggers = TriggerSpec::default();
                if let Some(config) = mapping.get("push") {
                    triggers.push = Some(self.parse_push_filter(config));
                }
                if let Some(config) = mapping.get("pull_request") {
                    triggers.pull_request = Some(self.parse_pr_filter(config));
                }
                if let Some(config) = mapping.get("schedule") {
                    triggers.schedule = self.parse_schedule(config);
                }
                if let Some(config) = mapping.get("workflow_dispatch") {
                    triggers.workflow_dispatch = Some(self.parse_dispatch(config));
                }
                triggers
            }
            Some(_) => {
                self.errors
                    .push("'on' must be a string, list, or mapping".to_string());
                TriggerSpec::default()
            }
        }
    }

    /// Builds an empty-config trigger for a bare kind name.
    ///
    /// Kinds without a bare-form meaning (a schedule with no cron entries
    /// cannot fire) are tolerated and ignored, matching the permissive `on`
    /// shapes.
    fn trigger_from_kind(&mut self, kind: &str, _config: Option<&Yaml>) -> TriggerSpec {
        let mut triggers = TriggerSpec::default();
        match kind {
            "push" => triggers.push = Some(PushFilter::default()),
            "pull_request" => triggers.pull_request = Some(PullRequestFilter::default()),
            "workflow_dispatch" => triggers.workflow_dispatch = Some(DispatchSpec::default()),
            _ => {}
        }
        triggers
    }

    /// Parses a push trigger filter.
    fn parse_push_filter(&mut self, config: &Yaml) -> PushFilter {
        let Yaml::Mapping(mapping) = config else {
            return PushFilter::default();
        };
        PushFilter {
            branches: self.string_list(get_kebab(mapping, "branches")),
            branches_ignore: self.string_list(get_kebab(mapping, "branches-ignore")),
            paths: self.string_list(get_kebab(mapping, "paths")),
            paths_ignore: self.string_list(get_kebab(mapping, "paths-ignore")),
            tags: self.string_list(get_kebab(mapping, "tags")),
            tags_ignore: self.string_list(get_kebab(mapping, "tags-ignore")),
        }
    }

    /// Parses a pull-request trigger filter with default action types.
    fn parse_pr_filter(&mut self, config: &Yaml) -> PullRequestFilter {
        let Yaml::Mapping(mapping) = config else {
            return PullRequestFilter::default();
        };
        let types = self.string_list(mapping.get("types"));
        PullRequestFilter {
            branches: self.string_list(get_kebab(mapping, "branches")),
            branches_ignore: self.string_list(get_kebab(mapping, "branches-ignore")),
            paths: self.string_list(get_kebab(mapping, "paths")),
            paths_ignore: self.string_list(get_kebab(mapping, "paths-ignore")),
            types: if types.is_empty() {
                PullRequestFilter::default().types
            } else {
                types
            },
        }
    }

    /// Parses schedule entries, validating the cron field count.
    fn parse_schedule(&mut self, config: &Yaml) -> Vec<ScheduleEntry> {
        let Yaml::Sequence(entries) = config else {
            self.errors
                .push("'schedule' must be a list of cron entries".to_string());
            return Vec::new();
        };
        let mut schedule = Vec::new();
        for entry in entries {
            let Some(cron) = entry
                .as_mapping()
                .and_then(|mapping| get_string(mapping, "cron"))
            else {
                continue;
            };
            if validate::cron_is_well_formed(&cron) {
                schedule.push(ScheduleEntry { cron });
            } else {
                self.errors.push(format!("invalid cron expression: {cron}"));
            }
        }
        schedule
    }

    /// Parses `workflow_dispatch` input declarations.
    fn parse_dispatch(&mut self, config: &Yaml) -> DispatchSpec {
        let Some(inputs) = config
            .as_mapping()
            .and_then(|mapping| mapping.get("inputs"))
            .and_then(Yaml::as_mapping)
        else {
            return DispatchSpec::default();
        };

        let mut declared = Vec::new();
        for (name, input) in inputs {
            let Some(name) = name.as_str() else {
                continue;
            };
            let mapping = input.as_mapping();
            let input_type = mapping
                .and_then(|mapping| get_string(mapping, "type"))
                .map_or(DispatchInputType::String, |label| {
                    self.parse_input_type(name, &label)
                });
            declared.push(DispatchInput {
                name: name.to_string(),
                description: mapping
                    .and_then(|mapping| get_string(mapping, "description"))
                    .unwrap_or_default(),
                required: mapping
                    .and_then(|mapping| mapping.get("required"))
                    .and_then(Yaml::as_bool)
                    .unwrap_or(false),
                default: mapping
                    .and_then(|mapping| mapping.get("default"))
                    .map(yaml_to_json),
                input_type,
                options: self.string_list(mapping.and_then(|mapping| mapping.get("options"))),
            });
        }
        DispatchSpec { inputs: declared }
    }

    /// Parses a dispatch input type label.
    fn parse_input_type(&mut self, input: &str, label: &str) -> DispatchInputType {
        match label {
            "string" => DispatchInputType::String,
            "boolean" => DispatchInputType::Boolean,
            "choice" => DispatchInputType::Choice,
            "environment" => DispatchInputType::Environment,
            other => {
                self.errors
                    .push(format!("input '{input}' has unknown type: {other}"));
                DispatchInputType::String
            }
        }
    }

    // ------------------------------------------------------------------
    // Concurrency
    // ------------------------------------------------------------------

    /// Parses the `concurrency` field (string or mapping shape).
    fn parse_concurrency(&mut self, config: Option<&Yaml>) -> Option<ConcurrencySpec> {
        match config {
            None | Some(Yaml::Null) => None,
            Some(Yaml::String(group)) => Some(ConcurrencySpec {
                group: group.clone(),
                cancel_in_progress: false,
            }),
            Some(Yaml::Mapping(mapping)) => Some(ConcurrencySpec {
                group: get_string(mapping, "group").unwrap_or_default(),
                cancel_in_progress: get_kebab(mapping, "cancel-in-progress")
                    .and_then(Yaml::as_bool)
                    .unwrap_or(false),
            }),
            Some(_) => {
                self.errors
                    .push("'concurrency' must be a string or mapping".to_string());
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Parses the jobs mapping in declaration order.
    fn parse_jobs(&mut self, jobs: Option<&Yaml>) -> Vec<JobSpec> {
        let Some(Yaml::Mapping(mapping)) = jobs else {
            return Vec::new();
        };
        let mut parsed = Vec::new();
        for (key, config) in mapping {
            let Some(key) = key.as_str() else {
                self.errors.push("job keys must be strings".to_string());
                continue;
            };
            if !validate::job_key_is_well_formed(key) {
                self.errors.push(format!("invalid job key: {key}"));
                continue;
            }
            let Some(config) = config.as_mapping() else {
                self.errors.push(format!("job '{key}' must be a mapping"));
                continue;
            };
            parsed.push(self.parse_job(key, config));
        }
        parsed
    }

    /// Parses a single job.
    fn parse_job(&mut self, key: &str, config: &Mapping) -> JobSpec {
        let runs_on = self.string_list(get_kebab(config, "runs-on"));
        if runs_on.is_empty() {
            self.errors
                .push(format!("job '{key}' must specify 'runs-on'"));
        }
        let steps = self.parse_steps(key, config.get("steps"));
        if steps.is_empty() {
            self.errors
                .push(format!("job '{key}' must have at least one step"));
        }
        JobSpec {
            key: JobKey::new(key),
            name: get_string(config, "name").unwrap_or_else(|| key.to_string()),
            runs_on,
            needs: self
                .string_list(config.get("needs"))
                .into_iter()
                .map(JobKey::new)
                .collect(),
            condition: get_string(config, "if").unwrap_or_default(),
            container: self.parse_container(config.get("container")),
            services: self.parse_services(config.get("services")),
            env: self.parse_env(config.get("env"), "job env"),
            steps,
            strategy: self.parse_strategy(config.get("strategy")),
            timeout_minutes: parse_timeout(config),
            outputs: self.parse_env(config.get("outputs"), "outputs"),
        }
    }

    /// Parses a container in its string or mapping shape.
    fn parse_container(&mut self, config: Option<&Yaml>) -> Option<ContainerSpec> {
        match config {
            None | Some(Yaml::Null) => None,
            Some(Yaml::String(image)) => Some(ContainerSpec {
                image: image.clone(),
                ..ContainerSpec::default()
            }),
            Some(Yaml::Mapping(mapping)) => Some(ContainerSpec {
                image: get_string(mapping, "image").unwrap_or_default(),
                credentials: mapping
                    .get("credentials")
                    .and_then(Yaml::as_mapping)
                    .map(|credentials| ContainerCredentials {
                        username: get_string(credentials, "username").unwrap_or_default(),
                        password: get_string(credentials, "password").unwrap_or_default(),
                    }),
                env: self.parse_env(mapping.get("env"), "container env"),
                ports: self.string_list(mapping.get("ports")),
                volumes: self.string_list(mapping.get("volumes")),
                options: get_string(mapping, "options").unwrap_or_default(),
            }),
            Some(_) => {
                self.errors
                    .push("'container' must be a string or mapping".to_string());
                None
            }
        }
    }

    /// Parses service containers in declaration order.
    fn parse_services(&mut self, config: Option<&Yaml>) -> Vec<ServiceSpec> {
        let Some(Yaml::Mapping(mapping)) = config else {
            return Vec::new();
        };
        let mut services = Vec::new();
        for (name, container) in mapping {
            let Some(name) = name.as_str() else {
                continue;
            };
            if let Some(container) = self.parse_container(Some(container)) {
                services.push(ServiceSpec {
                    name: name.to_string(),
                    container,
                });
            }
        }
        services
    }

    /// Parses a job strategy with its matrix.
    fn parse_strategy(&mut self, config: Option<&Yaml>) -> Option<StrategySpec> {
        let mapping = match config {
            None | Some(Yaml::Null) => return None,
            Some(Yaml::Mapping(mapping)) => mapping,
            Some(_) => {
                self.errors.push("'strategy' must be a mapping".to_string());
                return None;
            }
        };
        Some(StrategySpec {
            fail_fast: get_kebab(mapping, "fail-fast")
                .and_then(Yaml::as_bool)
                .unwrap_or(true),
            max_parallel: get_kebab(mapping, "max-parallel")
                .and_then(Yaml::as_u64)
                .and_then(|value| u32::try_from(value).ok()),
            matrix: self.parse_matrix(mapping.get("matrix")),
        })
    }

    /// Parses a matrix: axes in declaration order plus include/exclude rows.
    fn parse_matrix(&mut self, config: Option<&Yaml>) -> Option<MatrixSpec> {
        let Some(Yaml::Mapping(mapping)) = config else {
            return None;
        };
        let mut matrix = MatrixSpec::default();
        for (key, value) in mapping {
            let Some(key) = key.as_str() else {
                continue;
            };
            match key {
                "include" => matrix.include = self.parse_matrix_rows(value, "include"),
                "exclude" => matrix.exclude = self.parse_matrix_rows(value, "exclude"),
                axis => {
                    let Yaml::Sequence(values) = value else {
                        self.errors
                            .push(format!("matrix variable '{axis}' must be a list"));
                        continue;
                    };
                    matrix.axes.push(MatrixAxis {
                        key: axis.to_string(),
                        values: values.iter().map(yaml_to_json).collect(),
                    });
                }
            }
        }
        Some(matrix)
    }

    /// Parses include/exclude entries as ordered rows.
    fn parse_matrix_rows(&mut self, config: &Yaml, field: &str) -> Vec<MatrixRow> {
        let Yaml::Sequence(entries) = config else {
            self.errors
                .push(format!("matrix '{field}' must be a list of mappings"));
            return Vec::new();
        };
        let mut rows = Vec::new();
        for entry in entries {
            let Some(mapping) = entry.as_mapping() else {
                self.errors
                    .push(format!("matrix '{field}' entries must be mappings"));
                continue;
            };
            let row: MatrixRow = mapping
                .iter()
                .filter_map(|(key, value)| {
                    key.as_str()
                        .map(|key| (key.to_string(), yaml_to_json(value)))
                })
                .collect();
            rows.push(row);
        }
        rows
    }

    // ------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------

    /// Parses job steps in declaration order.
    fn parse_steps(&mut self, job_key: &str, config: Option<&Yaml>) -> Vec<StepSpec> {
        let Some(Yaml::Sequence(entries)) = config else {
            return Vec::new();
        };
        let mut steps = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let Some(mapping) = entry.as_mapping() else {
                self.errors.push(format!(
                    "job '{job_key}' step {} must be a mapping",
                    index + 1
                ));
                continue;
            };
            steps.push(self.parse_step(index, mapping));
        }
        steps
    }

    /// Parses one step, enforcing the run-xor-uses rule.
    fn parse_step(&mut self, index: usize, config: &Mapping) -> StepSpec {
        let run = get_string(config, "run").unwrap_or_default();
        let uses = get_string(config, "uses").unwrap_or_default();
        let position = index + 1;

        if run.is_empty() && uses.is_empty() {
            self.errors
                .push(format!("step {position} must have either 'run' or 'uses'"));
        }
        if !run.is_empty() && !uses.is_empty() {
            self.errors
                .push(format!("step {position} cannot have both 'run' and 'uses'"));
        }

        let action = if uses.is_empty() {
            StepAction::Run { command: run }
        } else {
            let mut with = BTreeMap::new();
            if let Some(inputs) = config.get("with").and_then(Yaml::as_mapping) {
                for (key, value) in inputs {
                    if let Some(key) = key.as_str() {
                        with.insert(key.to_string(), yaml_to_json(value));
                    }
                }
            }
            StepAction::Uses {
                action: uses,
                with,
            }
        };

        StepSpec {
            name: get_string(config, "name").unwrap_or_else(|| format!("Step {position}")),
            id: get_string(config, "id").unwrap_or_default(),
            action,
            env: self.parse_env(config.get("env"), "step env"),
            working_directory: get_kebab(config, "working-directory")
                .and_then(Yaml::as_str)
                .unwrap_or_default()
                .to_string(),
            shell: get_string(config, "shell").unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            condition: get_string(config, "if").unwrap_or_default(),
            continue_on_error: get_kebab(config, "continue-on-error")
                .and_then(Yaml::as_bool)
                .unwrap_or(false),
            timeout_minutes: parse_timeout(config),
        }
    }

    // ------------------------------------------------------------------
    // Shared scalars
    // ------------------------------------------------------------------

    /// Parses an environment-style mapping, coercing scalar values to
    /// strings.
    fn parse_env(&mut self, config: Option<&Yaml>, field: &str) -> BTreeMap<String, String> {
        let Some(Yaml::Mapping(mapping)) = config else {
            return BTreeMap::new();
        };
        let mut env = BTreeMap::new();
        for (key, value) in mapping {
            let Some(key) = key.as_str() else {
                continue;
            };
            if let Some(value) = scalar_string(value) {
                env.insert(key.to_string(), value);
            } else {
                self.errors
                    .push(format!("{field} value for '{key}' must be a scalar"));
            }
        }
        env
    }

    /// Normalizes a string-or-list field to a list of strings.
    fn string_list(&mut self, config: Option<&Yaml>) -> Vec<String> {
        match config {
            None | Some(Yaml::Null) => Vec::new(),
            Some(Yaml::String(single)) => vec![single.clone()],
            Some(Yaml::Sequence(values)) => values.iter().filter_map(scalar_string).collect(),
            Some(other) => scalar_string(other).map_or_else(Vec::new, |value| vec![value]),
        }
    }
}

// ============================================================================
// SECTION: Mapping Helpers
// ============================================================================

/// Looks up a kebab-case key, also accepting its snake_case spelling.
fn get_kebab<'a>(mapping: &'a Mapping, kebab: &str) -> Option<&'a Yaml> {
    mapping
        .get(kebab)
        .or_else(|| mapping.get(kebab.replace('-', "_").as_str()))
}

/// Reads a scalar field as a string.
fn get_string(mapping: &Mapping, key: &str) -> Option<String> {
    mapping.get(key).and_then(scalar_string)
}

/// Renders a scalar YAML value as a string (strings pass through).
fn scalar_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(text) => Some(text.clone()),
        Yaml::Bool(value) => Some(value.to_string()),
        Yaml::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Reads the shared `timeout-minutes` field with its default.
fn parse_timeout(mapping: &Mapping) -> u32 {
    get_kebab(mapping, "timeout-minutes")
        .and_then(Yaml::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(DEFAULT_TIMEOUT_MINUTES)
}

/// Parses `defaults.run` settings.
fn parse_defaults(config: Option<&Yaml>) -> RunDefaults {
    let run = config
        .and_then(Yaml::as_mapping)
        .and_then(|mapping| mapping.get("run"))
        .and_then(Yaml::as_mapping);
    let Some(run) = run else {
        return RunDefaults::default();
    };
    RunDefaults {
        shell: get_string(run, "shell"),
        working_directory: get_kebab(run, "working-directory").and_then(scalar_string),
    }
}

/// Merges one bare-kind trigger into the accumulated set.
fn merge_triggers(into: &mut TriggerSpec, from: TriggerSpec) {
    if from.push.is_some() {
        into.push = from.push;
    }
    if from.pull_request.is_some() {
        into.pull_request = from.pull_request;
    }
    if from.workflow_dispatch.is_some() {
        into.workflow_dispatch = from.workflow_dispatch;
    }
}

// ============================================================================
// SECTION: YAML to JSON Conversion
// ============================================================================

/// Converts a YAML value to JSON for schema validation and stored fields.
///
/// Mapping keys are stringified; non-scalar keys are dropped.
#[must_use]
pub fn yaml_to_json(value: &Yaml) -> Json {
    match value {
        Yaml::Null => Json::Null,
        Yaml::Bool(value) => Json::Bool(*value),
        Yaml::Number(number) => number.as_i64().map_or_else(
            || {
                number.as_u64().map_or_else(
                    || {
                        number
                            .as_f64()
                            .and_then(serde_json::Number::from_f64)
                            .map_or(Json::Null, Json::Number)
                    },
                    Json::from,
                )
            },
            Json::from,
        ),
        Yaml::String(text) => Json::String(text.clone()),
        Yaml::Sequence(values) => Json::Array(values.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => {
            let mut object = serde_json::Map::new();
            for (key, value) in mapping {
                if let Some(key) = scalar_string(key) {
                    object.insert(key, yaml_to_json(value));
                }
            }
            Json::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

// ============================================================================
// SECTION: Canonical Serialization
// ============================================================================

/// Serializes a normalized spec back into canonical workflow YAML.
///
/// Loading the produced document yields an equivalent spec, which is the
/// round-trip law the test suite holds the parser to.
#[must_use]
pub fn serialize_workflow(spec: &WorkflowSpec) -> String {
    let document = document_from_spec(spec);
    serde_yaml::to_string(&document).unwrap_or_default()
}

/// Builds the canonical YAML document for a spec.
fn document_from_spec(spec: &WorkflowSpec) -> Yaml {
    let mut root = Mapping::new();
    root.insert(yaml_str("name"), yaml_str(&spec.name));
    root.insert(yaml_str("on"), triggers_document(&spec.triggers));
    if !spec.env.is_empty() {
        root.insert(yaml_str("env"), env_document(&spec.env));
    }
    if spec.defaults.shell.is_some() || spec.defaults.working_directory.is_some() {
        let mut run = Mapping::new();
        if let Some(shell) = &spec.defaults.shell {
            run.insert(yaml_str("shell"), yaml_str(shell));
        }
        if let Some(directory) = &spec.defaults.working_directory {
            run.insert(yaml_str("working-directory"), yaml_str(directory));
        }
        let mut defaults = Mapping::new();
        defaults.insert(yaml_str("run"), Yaml::Mapping(run));
        root.insert(yaml_str("defaults"), Yaml::Mapping(defaults));
    }
    if let Some(concurrency) = &spec.concurrency {
        let mut mapping = Mapping::new();
        mapping.insert(yaml_str("group"), yaml_str(&concurrency.group));
        mapping.insert(
            yaml_str("cancel-in-progress"),
            Yaml::Bool(concurrency.cancel_in_progress),
        );
        root.insert(yaml_str("concurrency"), Yaml::Mapping(mapping));
    }

    let mut jobs = Mapping::new();
    for job in &spec.jobs {
        jobs.insert(yaml_str(job.key.as_str()), job_document(job));
    }
    root.insert(yaml_str("jobs"), Yaml::Mapping(jobs));
    Yaml::Mapping(root)
}

/// Builds the `on` document.
fn triggers_document(triggers: &TriggerSpec) -> Yaml {
    let mut on = Mapping::new();
    if let Some(push) = &triggers.push {
        let mut mapping = Mapping::new();
        insert_list(&mut mapping, "branches", &push.branches);
        insert_list(&mut mapping, "branches-ignore", &push.branches_ignore);
        insert_list(&mut mapping, "paths", &push.paths);
        insert_list(&mut mapping, "paths-ignore", &push.paths_ignore);
        insert_list(&mut mapping, "tags", &push.tags);
        insert_list(&mut mapping, "tags-ignore", &push.tags_ignore);
        on.insert(yaml_str("push"), Yaml::Mapping(mapping));
    }
    if let Some(pull_request) = &triggers.pull_request {
        let mut mapping = Mapping::new();
        insert_list(&mut mapping, "branches", &pull_request.branches);
        insert_list(&mut mapping, "branches-ignore", &pull_request.branches_ignore);
        insert_list(&mut mapping, "paths", &pull_request.paths);
        insert_list(&mut mapping, "paths-ignore", &pull_request.paths_ignore);
        insert_list(&mut mapping, "types", &pull_request.types);
        on.insert(yaml_str("pull_request"), Yaml::Mapping(mapping));
    }
    if !triggers.schedule.is_empty() {
        let entries: Vec<Yaml> = triggers
            .schedule
            .iter()
            .map(|entry| {
                let mut mapping = Mapping::new();
                mapping.insert(yaml_str("cron"), yaml_str(&entry.cron));
                Yaml::Mapping(mapping)
            })
            .collect();
        on.insert(yaml_str("schedule"), Yaml::Sequence(entries));
    }
    if let Some(dispatch) = &triggers.workflow_dispatch {
        let mut inputs = Mapping::new();
        for input in &dispatch.inputs {
            let mut mapping = Mapping::new();
            mapping.insert(yaml_str("description"), yaml_str(&input.description));
            mapping.insert(yaml_str("required"), Yaml::Bool(input.required));
            if let Some(default) = &input.default {
                mapping.insert(yaml_str("default"), json_to_yaml(default));
            }
            let label = match input.input_type {
                DispatchInputType::String => "string",
                DispatchInputType::Boolean => "boolean",
                DispatchInputType::Choice => "choice",
                DispatchInputType::Environment => "environment",
            };
            mapping.insert(yaml_str("type"), yaml_str(label));
            insert_list(&mut mapping, "options", &input.options);
            inputs.insert(yaml_str(&input.name), Yaml::Mapping(mapping));
        }
        let mut mapping = Mapping::new();
        mapping.insert(yaml_str("inputs"), Yaml::Mapping(inputs));
        on.insert(yaml_str("workflow_dispatch"), Yaml::Mapping(mapping));
    }
    Yaml::Mapping(on)
}

/// Builds one job document.
fn job_document(job: &JobSpec) -> Yaml {
    let mut mapping = Mapping::new();
    mapping.insert(yaml_str("name"), yaml_str(&job.name));
    mapping.insert(
        yaml_str("runs-on"),
        Yaml::Sequence(job.runs_on.iter().map(|label| yaml_str(label)).collect()),
    );
    if !job.needs.is_empty() {
        mapping.insert(
            yaml_str("needs"),
            Yaml::Sequence(job.needs.iter().map(|key| yaml_str(key.as_str())).collect()),
        );
    }
    if !job.condition.is_empty() {
        mapping.insert(yaml_str("if"), yaml_str(&job.condition));
    }
    if let Some(container) = &job.container {
        mapping.insert(yaml_str("container"), container_document(container));
    }
    if !job.services.is_empty() {
        let mut services = Mapping::new();
        for service in &job.services {
            services.insert(
                yaml_str(&service.name),
                container_document(&service.container),
            );
        }
        mapping.insert(yaml_str("services"), Yaml::Mapping(services));
    }
    if !job.env.is_empty() {
        mapping.insert(yaml_str("env"), env_document(&job.env));
    }
    if let Some(strategy) = &job.strategy {
        mapping.insert(yaml_str("strategy"), strategy_document(strategy));
    }
    mapping.insert(
        yaml_str("timeout-minutes"),
        Yaml::Number(job.timeout_minutes.into()),
    );
    if !job.outputs.is_empty() {
        mapping.insert(yaml_str("outputs"), env_document(&job.outputs));
    }
    mapping.insert(
        yaml_str("steps"),
        Yaml::Sequence(job.steps.iter().map(step_document).collect()),
    );
    Yaml::Mapping(mapping)
}

/// Builds one container document.
fn container_document(container: &ContainerSpec) -> Yaml {
    let mut mapping = Mapping::new();
    mapping.insert(yaml_str("image"), yaml_str(&container.image));
    if let Some(credentials) = &container.credentials {
        let mut credentials_mapping = Mapping::new();
        credentials_mapping.insert(yaml_str("username"), yaml_str(&credentials.username));
        credentials_mapping.insert(yaml_str("password"), yaml_str(&credentials.password));
        mapping.insert(yaml_str("credentials"), Yaml::Mapping(credentials_mapping));
    }
    if !container.env.is_empty() {
        mapping.insert(yaml_str("env"), env_document(&container.env));
    }
    insert_list(&mut mapping, "ports", &container.ports);
    insert_list(&mut mapping, "volumes", &container.volumes);
    if !container.options.is_empty() {
        mapping.insert(yaml_str("options"), yaml_str(&container.options));
    }
    Yaml::Mapping(mapping)
}

/// Builds one strategy document.
fn strategy_document(strategy: &StrategySpec) -> Yaml {
    let mut mapping = Mapping::new();
    mapping.insert(yaml_str("fail-fast"), Yaml::Bool(strategy.fail_fast));
    if let Some(max_parallel) = strategy.max_parallel {
        mapping.insert(yaml_str("max-parallel"), Yaml::Number(max_parallel.into()));
    }
    if let Some(matrix) = &strategy.matrix {
        let mut matrix_mapping = Mapping::new();
        for axis in &matrix.axes {
            matrix_mapping.insert(
                yaml_str(&axis.key),
                Yaml::Sequence(axis.values.iter().map(json_to_yaml).collect()),
            );
        }
        if !matrix.include.is_empty() {
            matrix_mapping.insert(yaml_str("include"), rows_document(&matrix.include));
        }
        if !matrix.exclude.is_empty() {
            matrix_mapping.insert(yaml_str("exclude"), rows_document(&matrix.exclude));
        }
        mapping.insert(yaml_str("matrix"), Yaml::Mapping(matrix_mapping));
    }
    Yaml::Mapping(mapping)
}

/// Builds include/exclude row documents.
fn rows_document(rows: &[MatrixRow]) -> Yaml {
    Yaml::Sequence(
        rows.iter()
            .map(|row| {
                let mut mapping = Mapping::new();
                for (key, value) in row {
                    mapping.insert(yaml_str(key), json_to_yaml(value));
                }
                Yaml::Mapping(mapping)
            })
            .collect(),
    )
}

/// Builds one step document.
fn step_document(step: &StepSpec) -> Yaml {
    let mut mapping = Mapping::new();
    mapping.insert(yaml_str("name"), yaml_str(&step.name));
    if !step.id.is_empty() {
        mapping.insert(yaml_str("id"), yaml_str(&step.id));
    }
    match &step.action {
        StepAction::Run { command } => {
            mapping.insert(yaml_str("run"), yaml_str(command));
        }
        StepAction::Uses { action, with } => {
            mapping.insert(yaml_str("uses"), yaml_str(action));
            if !with.is_empty() {
                let mut inputs = Mapping::new();
                for (key, value) in with {
                    inputs.insert(yaml_str(key), json_to_yaml(value));
                }
                mapping.insert(yaml_str("with"), Yaml::Mapping(inputs));
            }
        }
    }
    if !step.env.is_empty() {
        mapping.insert(yaml_str("env"), env_document(&step.env));
    }
    if !step.working_directory.is_empty() {
        mapping.insert(
            yaml_str("working-directory"),
            yaml_str(&step.working_directory),
        );
    }
    mapping.insert(yaml_str("shell"), yaml_str(&step.shell));
    if !step.condition.is_empty() {
        mapping.insert(yaml_str("if"), yaml_str(&step.condition));
    }
    mapping.insert(
        yaml_str("continue-on-error"),
        Yaml::Bool(step.continue_on_error),
    );
    mapping.insert(
        yaml_str("timeout-minutes"),
        Yaml::Number(step.timeout_minutes.into()),
    );
    Yaml::Mapping(mapping)
}

/// Builds an env mapping document.
fn env_document(env: &BTreeMap<String, String>) -> Yaml {
    let mut mapping = Mapping::new();
    for (key, value) in env {
        mapping.insert(yaml_str(key), yaml_str(value));
    }
    Yaml::Mapping(mapping)
}

/// Inserts a string list field when non-empty.
fn insert_list(mapping: &mut Mapping, key: &str, values: &[String]) {
    if !values.is_empty() {
        mapping.insert(
            yaml_str(key),
            Yaml::Sequence(values.iter().map(|value| yaml_str(value)).collect()),
        );
    }
}

/// Builds a YAML string value.
fn yaml_str(text: &str) -> Yaml {
    Yaml::String(text.to_string())
}

/// Converts a JSON value back to YAML.
fn json_to_yaml(value: &Json) -> Yaml {
    match value {
        Json::Null => Yaml::Null,
        Json::Bool(value) => Yaml::Bool(*value),
        Json::Number(number) => serde_yaml::from_str(&number.to_string()).unwrap_or(Yaml::Null),
        Json::String(text) => Yaml::String(text.clone()),
        Json::Array(values) => Yaml::Sequence(values.iter().map(json_to_yaml).collect()),
        Json::Object(object) => {
            let mut mapping = Mapping::new();
            for (key, value) in object {
                mapping.insert(yaml_str(key), json_to_yaml(value));
            }
            Yaml::Mapping(mapping)
        }
    }
}
