//! Job description validation
//!
//! Pure checks over a parsed description: known kind, registered workflow,
//! required inputs present, integer priority. Normalization fills defaults
//! and clamps priority into the queue's bounds instead of rejecting it.

use crate::domain::{
    JobKind, JobPayload, NewJob, QueuePolicy, ValidationError, WorkflowRegistry, WorkflowSpec,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Validator with its registries fixed at construction
#[derive(Debug, Clone)]
pub struct Validator {
    known_kinds: Vec<String>,
    workflows: Arc<WorkflowRegistry>,
    policy: QueuePolicy,
}

type Outcome<T> = std::result::Result<T, ValidationError>;

impl Validator {
    pub fn new(
        known_kinds: Vec<String>,
        workflows: Arc<WorkflowRegistry>,
        policy: QueuePolicy,
    ) -> Self {
        Self {
            known_kinds,
            workflows,
            policy,
        }
    }

    /// Check `raw` and turn it into a job ready for `enqueue`
    pub fn validate_and_normalize(&self, name: &str, raw: &Value) -> Outcome<NewJob> {
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let doc = raw.as_object().ok_or_else(|| ValidationError::InvalidType {
            field: "<document>".to_string(),
            expected: "mapping".to_string(),
            actual: describe(raw),
        })?;

        let kind = self.check_kind(doc)?;
        let (workflow_ref, workflow) = self.check_workflow(doc)?;
        let priority = self.normalize_priority(doc)?;
        let retry_limit = self.normalize_retry_limit(doc)?;
        let payload = check_payload(doc, &workflow_ref, workflow)?;

        let metadata = match doc.get("metadata") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.clone()),
        };

        Ok(NewJob {
            name: name.to_string(),
            kind,
            workflow_ref,
            priority,
            retry_limit,
            payload,
            metadata,
        })
    }

    fn check_kind(&self, doc: &Map<String, Value>) -> Outcome<JobKind> {
        let kind = required_str(doc, "kind")?;
        if !self.known_kinds.iter().any(|k| k == kind) {
            return Err(ValidationError::UnknownKind {
                kind: kind.to_string(),
                known: self.known_kinds.join(", "),
            });
        }
        Ok(JobKind::new(kind))
    }

    fn check_workflow<'a>(
        &'a self,
        doc: &Map<String, Value>,
    ) -> Outcome<(String, &'a WorkflowSpec)> {
        let workflow_ref = required_str(doc, "workflow_ref")?.trim();
        if workflow_ref.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "workflow_ref".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if !is_well_formed_ref(workflow_ref) {
            return Err(ValidationError::InvalidValue {
                field: "workflow_ref".to_string(),
                reason: format!(
                    "`{}` must start with a letter or digit and contain only letters, digits, `_`, `-`, `.` or `/`",
                    workflow_ref
                ),
            });
        }
        let spec =
            self.workflows
                .get(workflow_ref)
                .ok_or_else(|| ValidationError::UnknownWorkflow {
                    workflow_ref: workflow_ref.to_string(),
                })?;
        Ok((workflow_ref.to_string(), spec))
    }

    fn normalize_priority(&self, doc: &Map<String, Value>) -> Outcome<i32> {
        match doc.get("priority") {
            None | Some(Value::Null) => Ok(self.policy.default_priority),
            Some(v) => {
                let raw = integer(v).ok_or_else(|| ValidationError::InvalidType {
                    field: "priority".to_string(),
                    expected: "integer".to_string(),
                    actual: describe(v),
                })?;
                let clamped = self.policy.clamp_priority(raw);
                if clamped as i64 != raw {
                    tracing::debug!(requested = raw, applied = clamped, "Priority clamped");
                }
                Ok(clamped)
            }
        }
    }

    fn normalize_retry_limit(&self, doc: &Map<String, Value>) -> Outcome<i32> {
        match doc.get("retry_limit") {
            None | Some(Value::Null) => Ok(self.policy.default_retry_limit),
            Some(v) => {
                let raw = integer(v).ok_or_else(|| ValidationError::InvalidType {
                    field: "retry_limit".to_string(),
                    expected: "non-negative integer".to_string(),
                    actual: describe(v),
                })?;
                if !(0..=i32::MAX as i64).contains(&raw) {
                    return Err(ValidationError::InvalidValue {
                        field: "retry_limit".to_string(),
                        reason: format!("must be between 0 and {}, got {}", i32::MAX, raw),
                    });
                }
                Ok(raw as i32)
            }
        }
    }
}

fn check_payload(
    doc: &Map<String, Value>,
    workflow_ref: &str,
    workflow: &WorkflowSpec,
) -> Outcome<JobPayload> {
    let payload = doc.get("payload").ok_or_else(|| ValidationError::MissingField {
        field: "payload".to_string(),
    })?;
    let payload_map = payload
        .as_object()
        .ok_or_else(|| ValidationError::InvalidType {
            field: "payload".to_string(),
            expected: "mapping".to_string(),
            actual: describe(payload),
        })?;

    let inputs = required_map(payload_map, "inputs", "payload.inputs")?;
    let outputs = required_map(payload_map, "outputs", "payload.outputs")?;

    if let Some(file_path) = outputs.get("file_path") {
        match file_path.as_str() {
            Some(p) if !p.trim().is_empty() => {}
            Some(_) => {
                return Err(ValidationError::InvalidValue {
                    field: "payload.outputs.file_path".to_string(),
                    reason: "must not be empty".to_string(),
                })
            }
            None => {
                return Err(ValidationError::InvalidType {
                    field: "payload.outputs.file_path".to_string(),
                    expected: "string".to_string(),
                    actual: describe(file_path),
                })
            }
        }
    }

    let missing: Vec<String> = workflow
        .required_inputs
        .iter()
        .filter(|required| !input_satisfied(inputs, required))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingInputs {
            workflow_ref: workflow_ref.to_string(),
            missing,
        });
    }

    Ok(JobPayload::new(payload.clone()))
}

/// An input is satisfied by its exact key or by a node-qualified key
/// (`31_seed` for `seed`); `prompt` also accepts any `*_text*` key.
fn input_satisfied(inputs: &Map<String, Value>, required: &str) -> bool {
    if inputs.contains_key(required) {
        return true;
    }
    if required == "prompt" && inputs.keys().any(|k| k.contains("_text")) {
        return true;
    }
    let suffix = format!("_{}", required);
    inputs.keys().any(|k| k.ends_with(&suffix))
}

fn is_well_formed_ref(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
}

fn required_str<'a>(doc: &'a Map<String, Value>, field: &str) -> Outcome<&'a str> {
    let value = doc.get(field).ok_or_else(|| ValidationError::MissingField {
        field: field.to_string(),
    })?;
    value.as_str().ok_or_else(|| ValidationError::InvalidType {
        field: field.to_string(),
        expected: "string".to_string(),
        actual: describe(value),
    })
}

fn required_map<'a>(
    doc: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Outcome<&'a Map<String, Value>> {
    let value = doc.get(key).ok_or_else(|| ValidationError::MissingField {
        field: field.to_string(),
    })?;
    value.as_object().ok_or_else(|| ValidationError::InvalidType {
        field: field.to_string(),
        expected: "mapping".to_string(),
        actual: describe(value),
    })
}

/// Integers only; `20.0` and `"20"` are rejected
fn integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX)),
        _ => None,
    }
}

fn describe(v: &Value) -> String {
    const MAX_SHOWN: usize = 40;
    let kind = match v {
        Value::Null => return "null".to_string(),
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    };
    let mut shown = v.to_string();
    if shown.len() > MAX_SHOWN {
        let cut = (0..=MAX_SHOWN)
            .rev()
            .find(|i| shown.is_char_boundary(*i))
            .unwrap_or(0);
        shown.truncate(cut);
        shown.push_str("...");
    }
    format!("{} {}", kind, shown)
}
