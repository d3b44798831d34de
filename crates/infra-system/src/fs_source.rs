// Filesystem DescriptionSource: YAML files under a watch root

use async_trait::async_trait;
use gantry_core::error::Result;
use gantry_core::port::{DescriptionSource, ScannedDescription};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Recursively lists description files; never moves or deletes them
pub struct FsDescriptionSource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FsDescriptionSource {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Candidate files in sorted order. Unreadable subdirectories are skipped.
    async fn collect_paths(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // The root itself must be listable
                Err(e) if dir == self.root => return Err(e.into()),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if hidden {
                    continue;
                }
                let file_type = match entry.file_type().await {
                    Ok(t) => t,
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Entry vanished during scan");
                        continue;
                    }
                };
                if file_type.is_dir() {
                    pending.push(path);
                } else if self.matches_extension(&path) {
                    found.push(path);
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

#[async_trait]
impl DescriptionSource for FsDescriptionSource {
    async fn scan(&self) -> Result<Vec<ScannedDescription>> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            debug!(root = %self.root.display(), "Watch root does not exist yet");
            return Ok(Vec::new());
        }

        let paths = self.collect_paths().await?;
        let mut scanned = Vec::with_capacity(paths.len());

        for path in paths {
            let name = match path.file_name() {
                Some(n) => n.to_string_lossy().into_owned(),
                None => continue,
            };
            let document = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => parse_document(&raw),
                Err(e) => Err(format!("cannot read file: {}", e)),
            };
            scanned.push(ScannedDescription {
                path,
                name,
                document,
            });
        }

        Ok(scanned)
    }
}

fn parse_document(raw: &str) -> std::result::Result<serde_json::Value, String> {
    serde_yaml::from_str::<serde_json::Value>(raw).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn yaml_source(root: &Path) -> FsDescriptionSource {
        FsDescriptionSource::new(root, vec!["yaml".to_string(), ".YML".to_string()])
    }

    #[tokio::test]
    async fn test_scan_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("image")).unwrap();
        fs::write(dir.path().join("image/T2I_b.yaml"), "kind: T2I\n").unwrap();
        fs::write(dir.path().join("SPEECH_a.yml"), "kind: SPEECH\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join(".T2I_hidden.yaml"), "kind: T2I\n").unwrap();

        let scanned = yaml_source(dir.path()).scan().await.unwrap();
        let names: Vec<&str> = scanned.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SPEECH_a.yml", "T2I_b.yaml"]);
        assert_eq!(scanned[1].document.as_ref().unwrap()["kind"], "T2I");
    }

    #[tokio::test]
    async fn test_unparseable_file_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.yaml"), "kind: [unclosed\n").unwrap();
        fs::write(dir.path().join("good.yaml"), "kind: T2I\npriority: 10\n").unwrap();

        let scanned = yaml_source(dir.path()).scan().await.unwrap();
        assert_eq!(scanned.len(), 2);
        assert!(scanned[0].document.is_err());
        assert_eq!(scanned[1].document.as_ref().unwrap()["priority"], 10);
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = yaml_source(&dir.path().join("not-created"));
        assert!(source.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_leaves_files_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("T2I_a.yaml");
        fs::write(&file, "kind: T2I\n").unwrap();

        let source = yaml_source(dir.path());
        source.scan().await.unwrap();
        source.scan().await.unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "kind: T2I\n");
    }
}
