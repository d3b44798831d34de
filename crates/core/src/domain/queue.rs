// Queue Policy - priority bounds and retry defaults

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Priority (lower number = higher precedence)
pub type Priority = i32;

/// Queue-wide defaults applied at ingestion and on control-surface edits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuePolicy {
    pub default_priority: Priority,
    pub min_priority: Priority,
    pub max_priority: Priority,
    pub default_retry_limit: i32,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            default_priority: 50,
            min_priority: 1,
            max_priority: 999,
            default_retry_limit: 2,
        }
    }
}

impl QueuePolicy {
    pub fn validate(&self) -> Result<()> {
        if self.min_priority > self.max_priority {
            return Err(DomainError::InvalidPriorityRange {
                min: self.min_priority,
                max: self.max_priority,
            });
        }
        Ok(())
    }

    /// Clamp to the nearest bound instead of rejecting
    pub fn clamp_priority(&self, priority: i64) -> Priority {
        priority.clamp(self.min_priority as i64, self.max_priority as i64) as Priority
    }

    /// Highest-precedence priority ("God Mode")
    pub fn top_priority(&self) -> Priority {
        self.min_priority
    }
}
