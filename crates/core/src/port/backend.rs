// Generation Backend Port
// Single always-addressable endpoint: submit a workflow, await artifacts or an error

use crate::domain::JobPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Successful backend outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendOutcome {
    /// Artifact destinations produced or confirmed by the backend
    pub artifacts: Vec<String>,
    pub diagnostics: serde_json::Value,
}

impl BackendOutcome {
    /// Shape persisted as the job's `result`
    pub fn to_result_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "artifacts": self.artifacts,
            "diagnostics": self.diagnostics,
        })
    }
}

/// Backend failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Endpoint unreachable or answering 5xx
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend timed out after {0}ms")]
    Timeout(u64),

    /// Backend refused the workflow or inputs
    #[error("backend rejected job: {0}")]
    Rejected(String),

    /// Response could not be understood
    #[error("backend protocol error: {0}")]
    Protocol(String),

    #[error("backend panicked: {0}")]
    Panicked(String),
}

impl BackendError {
    /// Transient failures suggest the endpoint itself is struggling
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::Timeout(_))
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run `workflow_ref` with the job's payload.
    ///
    /// `timeout` is advisory for adapters that poll; the execution loop
    /// enforces it independently.
    async fn submit(
        &self,
        workflow_ref: &str,
        payload: &JobPayload,
        timeout: Duration,
    ) -> Result<BackendOutcome, BackendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// One scripted backend reaction
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Succeed(Vec<String>),
        Fail(BackendError),
        /// Panic inside submit (panic isolation tests)
        Panic(String),
        /// Never answer (timeout tests)
        Hang,
    }

    /// Backend that replays a script, then succeeds
    pub struct ScriptedBackend {
        script: Arc<Mutex<VecDeque<MockBehavior>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedBackend {
        pub fn new(script: impl IntoIterator<Item = MockBehavior>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into_iter().collect())),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn always_succeed() -> Self {
            Self::new([])
        }

        /// Fail `n` times with a transient error, then succeed
        pub fn failing_times(n: usize) -> Self {
            Self::new((0..n).map(|i| {
                MockBehavior::Fail(BackendError::Unavailable(format!("attempt {}", i + 1)))
            }))
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn submit(
            &self,
            workflow_ref: &str,
            payload: &JobPayload,
            _timeout: Duration,
        ) -> Result<BackendOutcome, BackendError> {
            self.calls.lock().unwrap().push(workflow_ref.to_string());
            let next = self.script.lock().unwrap().pop_front();

            match next {
                None => Ok(BackendOutcome {
                    artifacts: payload
                        .outputs()
                        .get("file_path")
                        .and_then(|v| v.as_str())
                        .map(|p| vec![p.to_string()])
                        .unwrap_or_default(),
                    diagnostics: serde_json::json!({"mock": true}),
                }),
                Some(MockBehavior::Succeed(artifacts)) => Ok(BackendOutcome {
                    artifacts,
                    diagnostics: serde_json::json!({"mock": true}),
                }),
                Some(MockBehavior::Fail(err)) => Err(err),
                Some(MockBehavior::Panic(msg)) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
                Some(MockBehavior::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Unavailable("refused".into()).is_transient());
        assert!(BackendError::Timeout(5_000).is_transient());
        assert!(!BackendError::Rejected("bad node 12".into()).is_transient());
        assert!(!BackendError::Protocol("no prompt_id".into()).is_transient());
        assert!(!BackendError::Panicked("boom".into()).is_transient());
    }

    #[test]
    fn test_result_metadata_shape() {
        let outcome = BackendOutcome {
            artifacts: vec!["out/a.png".to_string()],
            diagnostics: serde_json::json!({"prompt_id": "p1"}),
        };
        let meta = outcome.to_result_metadata();
        assert_eq!(meta["artifacts"][0], "out/a.png");
        assert_eq!(meta["diagnostics"]["prompt_id"], "p1");
    }
}
