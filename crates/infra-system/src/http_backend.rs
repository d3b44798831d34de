// HTTP GenerationBackend (ComfyUI-style prompt API)
//
// Submit: POST {base}/prompt {"prompt": <graph>, "client_id": ..} -> {"prompt_id": ..}
// Await:  GET {base}/history/{prompt_id} until the id appears, then read outputs.

use async_trait::async_trait;
use gantry_core::config::BackendConfig;
use gantry_core::domain::{JobPayload, WorkflowRegistry};
use gantry_core::error::{AppError, Result};
use gantry_core::port::{BackendError, BackendOutcome, GenerationBackend};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Output lists a history entry may carry per node
const ARTIFACT_KEYS: [&str; 3] = ["images", "gifs", "audio"];

/// Longest response excerpt kept in an error message
const MAX_ERROR_BODY: usize = 512;

pub struct HttpBackend {
    client: Client,
    base_url: String,
    client_id: String,
    workflows: Arc<WorkflowRegistry>,
    template_root: Option<PathBuf>,
    history_poll: Duration,
}

#[derive(Debug, Deserialize)]
struct QueuedPrompt {
    prompt_id: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig, workflows: Arc<WorkflowRegistry>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: uuid::Uuid::new_v4().to_string(),
            workflows,
            template_root: config.template_root.clone(),
            history_poll: Duration::from_millis(config.history_poll_ms.max(1)),
        })
    }

    fn template_path(&self, template_path: &str) -> PathBuf {
        let path = Path::new(template_path);
        match &self.template_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    async fn load_template(&self, template_path: &str) -> std::result::Result<Value, BackendError> {
        let path = self.template_path(template_path);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            BackendError::Rejected(format!("cannot read template {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            BackendError::Rejected(format!("invalid template JSON {}: {}", path.display(), e))
        })
    }

    async fn queue_prompt(&self, prompt: &Value) -> std::result::Result<String, BackendError> {
        let url = format!("{}/prompt", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({"prompt": prompt, "client_id": self.client_id}))
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let response = check_status(&url, response).await?;

        let queued: QueuedPrompt = response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("no prompt_id from {}: {}", url, e)))?;
        Ok(queued.prompt_id)
    }

    /// `None` while the prompt is still queued or running
    async fn fetch_history(&self, prompt_id: &str) -> std::result::Result<Option<Value>, BackendError> {
        let url = format!("{}/history/{}", self.base_url, prompt_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let response = check_status(&url, response).await?;

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("invalid history from {}: {}", url, e)))?;
        Ok(body.get_mut(prompt_id).map(Value::take))
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn submit(
        &self,
        workflow_ref: &str,
        payload: &JobPayload,
        timeout: Duration,
    ) -> std::result::Result<BackendOutcome, BackendError> {
        let spec = self.workflows.get(workflow_ref).ok_or_else(|| {
            BackendError::Rejected(format!("workflow `{}` is not registered", workflow_ref))
        })?;

        let template = self.load_template(&spec.template_path).await?;
        let prompt = build_prompt(template, payload.inputs(), payload.outputs());

        let deadline = Instant::now() + timeout;
        let prompt_id = self.queue_prompt(&prompt).await?;
        info!(workflow_ref = %workflow_ref, prompt_id = %prompt_id, "Prompt queued");

        loop {
            if let Some(entry) = self.fetch_history(&prompt_id).await? {
                let mut outcome = interpret_history(&prompt_id, &entry)?;
                if let Some(requested) = payload.outputs().get("file_path") {
                    outcome.diagnostics["requested_path"] = requested.clone();
                }
                return Ok(outcome);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(prompt_id = %prompt_id, "Prompt did not finish before the deadline");
                return Err(BackendError::Timeout(timeout.as_millis() as u64));
            }
            sleep(self.history_poll.min(deadline - now)).await;
        }
    }
}

/// Map `<node>_<param>` inputs onto the template graph.
///
/// Keys that name no existing node parameter are ignored, as are `job_*`
/// bookkeeping keys. `outputs.file_path` sets `filename_prefix` on every
/// `Save*` node.
pub fn build_prompt(mut template: Value, inputs: &Value, outputs: &Value) -> Value {
    if let Some(inputs) = inputs.as_object() {
        for (key, value) in inputs {
            if key.starts_with("job_") {
                continue;
            }
            let Some((node_id, param)) = key.split_once('_') else {
                continue;
            };
            let node_inputs = template
                .get_mut(node_id)
                .and_then(|node| node.get_mut("inputs"))
                .and_then(Value::as_object_mut);

            match node_inputs {
                Some(node_inputs) if node_inputs.contains_key(param) => {
                    node_inputs.insert(param.to_string(), value.clone());
                    debug!(key = %key, node = %node_id, param = %param, "Mapped input");
                }
                Some(_) => debug!(key = %key, node = %node_id, "Parameter not present on node"),
                None => {}
            }
        }
    }

    let prefix = outputs
        .get("file_path")
        .and_then(Value::as_str)
        .and_then(|p| Path::new(p).file_stem())
        .map(|s| s.to_string_lossy().into_owned());

    if let (Some(prefix), Some(nodes)) = (prefix, template.as_object_mut()) {
        for node in nodes.values_mut() {
            let is_save = node
                .get("class_type")
                .and_then(Value::as_str)
                .map(|c| c.starts_with("Save"))
                .unwrap_or(false);
            if !is_save {
                continue;
            }
            if let Some(node_inputs) = node.get_mut("inputs").and_then(Value::as_object_mut) {
                node_inputs.insert("filename_prefix".to_string(), Value::String(prefix.clone()));
            }
        }
    }

    template
}

/// Turn a finished history entry into an outcome
pub fn interpret_history(
    prompt_id: &str,
    entry: &Value,
) -> std::result::Result<BackendOutcome, BackendError> {
    let status_str = entry
        .pointer("/status/status_str")
        .and_then(Value::as_str)
        .unwrap_or("success");

    if status_str == "error" {
        let detail = entry
            .pointer("/status/messages")
            .map(|m| truncate(&m.to_string()))
            .unwrap_or_else(|| "no details".to_string());
        return Err(BackendError::Rejected(format!(
            "prompt {} failed: {}",
            prompt_id, detail
        )));
    }

    let mut artifacts = Vec::new();
    if let Some(nodes) = entry.get("outputs").and_then(Value::as_object) {
        for node_output in nodes.values() {
            for key in ARTIFACT_KEYS {
                let Some(items) = node_output.get(key).and_then(Value::as_array) else {
                    continue;
                };
                for item in items {
                    let Some(filename) = item.get("filename").and_then(Value::as_str) else {
                        continue;
                    };
                    match item.get("subfolder").and_then(Value::as_str) {
                        Some(sub) if !sub.is_empty() => artifacts.push(format!("{}/{}", sub, filename)),
                        _ => artifacts.push(filename.to_string()),
                    }
                }
            }
        }
    }

    Ok(BackendOutcome {
        artifacts,
        diagnostics: json!({
            "prompt_id": prompt_id,
            "status": status_str,
        }),
    })
}

fn transport_error(url: &str, err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Unavailable(format!("request to {} timed out: {}", url, err))
    } else {
        BackendError::Unavailable(format!("request to {} failed: {}", url, err))
    }
}

/// 5xx means the endpoint is struggling; 4xx means it refused this job
async fn check_status(url: &str, response: Response) -> std::result::Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = format!("HTTP {} from {}: {}", status, url, truncate(&body));
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(BackendError::Unavailable(detail))
    } else {
        Err(BackendError::Rejected(detail))
    }
}

fn truncate(s: &str) -> String {
    if s.len() <= MAX_ERROR_BODY {
        return s.to_string();
    }
    let cut = (0..=MAX_ERROR_BODY)
        .rev()
        .find(|i| s.is_char_boundary(*i))
        .unwrap_or(0);
    format!("{}...", &s[..cut])
}
