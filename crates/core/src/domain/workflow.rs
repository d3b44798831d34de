// Workflow Registry - configured workflows and their required inputs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One workflow the backend knows how to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub template_path: String,
    #[serde(default)]
    pub required_inputs: Vec<String>,
}

/// Registry keyed by workflow_ref; new workflows are a config change only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowRegistry {
    workflows: BTreeMap<String, WorkflowSpec>,
}

impl WorkflowRegistry {
    pub fn new(workflows: BTreeMap<String, WorkflowSpec>) -> Self {
        Self { workflows }
    }

    pub fn get(&self, workflow_ref: &str) -> Option<&WorkflowSpec> {
        self.workflows.get(workflow_ref)
    }

    pub fn contains(&self, workflow_ref: &str) -> bool {
        self.workflows.contains_key(workflow_ref)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn insert(&mut self, workflow_ref: impl Into<String>, spec: WorkflowSpec) {
        self.workflows.insert(workflow_ref.into(), spec);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkflowSpec)> {
        self.workflows.iter().map(|(k, v)| (k.as_str(), v))
    }
}
