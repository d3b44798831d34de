// Workflow registry file (YAML mapping of workflow_ref -> spec)

use gantry_core::domain::WorkflowRegistry;
use gantry_core::error::{AppError, Result};
use std::path::Path;
use tracing::info;

/// Load the registry; a missing or malformed file is a configuration error
pub fn load_workflows(path: &Path) -> Result<WorkflowRegistry> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("cannot read workflows file {}: {}", path.display(), e))
    })?;

    // An empty file is an empty registry
    if raw.trim().is_empty() {
        return Ok(WorkflowRegistry::default());
    }

    let registry: WorkflowRegistry = serde_yaml::from_str(&raw).map_err(|e| {
        AppError::Config(format!("invalid workflows file {}: {}", path.display(), e))
    })?;

    for (workflow_ref, spec) in registry.iter() {
        if spec.template_path.trim().is_empty() {
            return Err(AppError::Config(format!(
                "workflow `{}` has an empty template_path",
                workflow_ref
            )));
        }
    }

    info!(path = %path.display(), workflows = %registry.len(), "Loaded workflow registry");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_registry() {
        let file = write(
            r#"
wf_portrait:
  template_path: workflows/portrait.json
  required_inputs: [prompt, seed]
tts_narrator:
  template_path: /opt/workflows/narrator.json
"#,
        );
        let registry = load_workflows(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("wf_portrait").unwrap().required_inputs,
            vec!["prompt", "seed"]
        );
        assert!(registry.get("tts_narrator").unwrap().required_inputs.is_empty());
    }

    #[test]
    fn test_missing_template_path_rejected() {
        let file = write("wf_portrait:\n  required_inputs: [prompt]\n");
        assert!(matches!(load_workflows(file.path()), Err(AppError::Config(_))));

        let file = write("wf_portrait:\n  template_path: \"  \"\n");
        assert!(matches!(load_workflows(file.path()), Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_workflows(Path::new("/nonexistent/gantry/workflows.yaml")).unwrap_err();
        assert!(err.to_string().contains("workflows.yaml"));
    }

    #[test]
    fn test_empty_file_is_empty_registry() {
        let file = write("\n");
        assert!(load_workflows(file.path()).unwrap().is_empty());
    }
}
