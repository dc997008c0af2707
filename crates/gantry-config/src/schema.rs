// crates/gantry-config/src/schema.rs
// ============================================================================
// Module: Workflow Schema Validation
// Description: Draft-7 JSON-Schema structural pass over raw documents.
// Purpose: Reject unknown container shapes and enforce enums and required fields.
// Dependencies: jsonschema, serde_json
// ============================================================================

//! ## Overview
//! The structural pass validates the raw YAML document (converted to JSON)
//! against an embedded Draft-7 schema. It runs in addition to the semantic
//! normalization pass; both error sets are union'd onto the stored
//! configuration. Errors carry the instance path so the API can surface
//! field-level details.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Embedded Schema
// ============================================================================

/// Builds the workflow document schema.
fn schema_document() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "name": {"type": "string", "maxLength": 200},
            "on": {
                "oneOf": [
                    {"type": "string"},
                    {"type": "array", "items": {"type": "string"}},
                    {
                        "type": "object",
                        "properties": {
                            "push": {"$ref": "#/definitions/pushTrigger"},
                            "pull_request": {"$ref": "#/definitions/prTrigger"},
                            "schedule": {"$ref": "#/definitions/scheduleTrigger"},
                            "workflow_dispatch": {"$ref": "#/definitions/workflowDispatch"},
                        },
                    },
                ]
            },
            "env": {"type": "object", "additionalProperties": {"type": ["string", "number", "boolean"]}},
            "defaults": {
                "type": "object",
                "properties": {
                    "run": {
                        "type": "object",
                        "properties": {
                            "shell": {"type": "string"},
                            "working-directory": {"type": "string"},
                        },
                    },
                },
            },
            "concurrency": {
                "oneOf": [
                    {"type": "string"},
                    {
                        "type": "object",
                        "properties": {
                            "group": {"type": "string"},
                            "cancel-in-progress": {"type": "boolean"},
                        },
                        "required": ["group"],
                    },
                ]
            },
            "jobs": {
                "type": "object",
                "additionalProperties": {"$ref": "#/definitions/job"},
                "minProperties": 1,
            },
        },
        "required": ["jobs"],
        "definitions": {
            "pushTrigger": {
                "oneOf": [
                    {"type": "null"},
                    {
                        "type": "object",
                        "properties": {
                            "branches": {"type": "array", "items": {"type": "string"}},
                            "branches-ignore": {"type": "array", "items": {"type": "string"}},
                            "paths": {"type": "array", "items": {"type": "string"}},
                            "paths-ignore": {"type": "array", "items": {"type": "string"}},
                            "tags": {"type": "array", "items": {"type": "string"}},
                            "tags-ignore": {"type": "array", "items": {"type": "string"}},
                        },
                    },
                ]
            },
            "prTrigger": {
                "oneOf": [
                    {"type": "null"},
                    {
                        "type": "object",
                        "properties": {
                            "branches": {"type": "array", "items": {"type": "string"}},
                            "branches-ignore": {"type": "array", "items": {"type": "string"}},
                            "paths": {"type": "array", "items": {"type": "string"}},
                            "paths-ignore": {"type": "array", "items": {"type": "string"}},
                            "types": {"type": "array", "items": {"type": "string"}},
                        },
                    },
                ]
            },
            "scheduleTrigger": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "cron": {"type": "string"},
                    },
                    "required": ["cron"],
                },
            },
            "workflowDispatch": {
                "oneOf": [
                    {"type": "null"},
                    {
                        "type": "object",
                        "properties": {
                            "inputs": {
                                "type": "object",
                                "additionalProperties": {
                                    "type": "object",
                                    "properties": {
                                        "description": {"type": "string"},
                                        "required": {"type": "boolean"},
                                        "default": {},
                                        "type": {
                                            "type": "string",
                                            "enum": ["string", "boolean", "choice", "environment"],
                                        },
                                        "options": {"type": "array", "items": {"type": "string"}},
                                    },
                                },
                            },
                        },
                    },
                ]
            },
            "job": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "runs-on": {
                        "oneOf": [
                            {"type": "string"},
                            {"type": "array", "items": {"type": "string"}},
                        ]
                    },
                    "needs": {
                        "oneOf": [
                            {"type": "string"},
                            {"type": "array", "items": {"type": "string"}},
                        ]
                    },
                    "if": {"type": "string"},
                    "container": {"$ref": "#/definitions/container"},
                    "services": {
                        "type": "object",
                        "additionalProperties": {"$ref": "#/definitions/container"},
                    },
                    "env": {"type": "object", "additionalProperties": {"type": ["string", "number", "boolean"]}},
                    "steps": {
                        "type": "array",
                        "items": {"$ref": "#/definitions/step"},
                        "minItems": 1,
                    },
                    "strategy": {"$ref": "#/definitions/strategy"},
                    "timeout-minutes": {"type": "integer", "minimum": 1},
                    "outputs": {"type": "object"},
                },
                "required": ["runs-on", "steps"],
            },
            "container": {
                "oneOf": [
                    {"type": "string"},
                    {
                        "type": "object",
                        "properties": {
                            "image": {"type": "string"},
                            "credentials": {
                                "type": "object",
                                "properties": {
                                    "username": {"type": "string"},
                                    "password": {"type": "string"},
                                },
                            },
                            "env": {"type": "object", "additionalProperties": {"type": ["string", "number", "boolean"]}},
                            "ports": {"type": "array", "items": {"type": ["string", "integer"]}},
                            "volumes": {"type": "array", "items": {"type": "string"}},
                            "options": {"type": "string"},
                        },
                        "required": ["image"],
                    },
                ]
            },
            "strategy": {
                "type": "object",
                "properties": {
                    "fail-fast": {"type": "boolean"},
                    "max-parallel": {"type": "integer", "minimum": 1},
                    "matrix": {
                        "type": "object",
                        "properties": {
                            "include": {"type": "array"},
                            "exclude": {"type": "array"},
                        },
                        "additionalProperties": {"type": "array"},
                    },
                },
            },
            "step": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "id": {"type": "string"},
                    "run": {"type": "string"},
                    "uses": {"type": "string"},
                    "with": {"type": "object"},
                    "env": {"type": "object", "additionalProperties": {"type": ["string", "number", "boolean"]}},
                    "working-directory": {"type": "string"},
                    "shell": {"type": "string"},
                    "if": {"type": "string"},
                    "continue-on-error": {"type": "boolean"},
                    "timeout-minutes": {"type": "integer", "minimum": 1},
                },
            },
        },
    })
}

/// Returns the compiled schema validator.
///
/// The schema is a build-time constant, so compilation failure is a
/// programming error surfaced once as a validation error string rather
/// than a panic.
fn compiled() -> &'static Result<Validator, String> {
    static COMPILED: OnceLock<Result<Validator, String>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(&schema_document())
            .map_err(|error| format!("workflow schema failed to compile: {error}"))
    })
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a raw workflow document against the embedded schema.
///
/// Returns one message per violation, prefixed with the instance path in
/// `a -> b -> c` form when the violation is not at the document root.
#[must_use]
pub fn validate_document(document: &Value) -> Vec<String> {
    let validator = match compiled() {
        Ok(validator) => validator,
        Err(error) => return vec![error.clone()],
    };

    validator
        .iter_errors(document)
        .map(|error| {
            let pointer = error.instance_path().to_string();
            let path = pointer
                .trim_start_matches('/')
                .split('/')
                .filter(|segment| !segment.is_empty())
                .collect::<Vec<_>>()
                .join(" -> ");
            if path.is_empty() {
                error.to_string()
            } else {
                format!("{path}: {error}")
            }
        })
        .collect()
}
