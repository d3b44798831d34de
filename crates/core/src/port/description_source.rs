// Description Source Port
// Lists job descriptions under the watch root; never mutates them

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// One candidate description found by a scan
#[derive(Debug, Clone)]
pub struct ScannedDescription {
    pub path: PathBuf,
    /// Unique logical job name derived from the file name
    pub name: String,
    /// Parsed document, or the parse/read failure as text
    pub document: std::result::Result<serde_json::Value, String>,
}

#[async_trait]
pub trait DescriptionSource: Send + Sync {
    /// Every candidate under the root, in a stable (sorted) order
    async fn scan(&self) -> Result<Vec<ScannedDescription>>;
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// In-memory source whose contents tests can swap between scans
    #[derive(Default)]
    pub struct StaticSource {
        entries: Mutex<Vec<ScannedDescription>>,
    }

    impl StaticSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add(&self, name: &str, document: serde_json::Value) {
            self.entries.lock().unwrap().push(ScannedDescription {
                path: PathBuf::from(name),
                name: name.to_string(),
                document: Ok(document),
            });
        }

        pub fn add_unparseable(&self, name: &str, reason: &str) {
            self.entries.lock().unwrap().push(ScannedDescription {
                path: PathBuf::from(name),
                name: name.to_string(),
                document: Err(reason.to_string()),
            });
        }

        /// Add an entry whose path differs from its name
        pub fn push(&self, entry: ScannedDescription) {
            self.entries.lock().unwrap().push(entry);
        }
    }

    #[async_trait]
    impl DescriptionSource for StaticSource {
        async fn scan(&self) -> Result<Vec<ScannedDescription>> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }
}
