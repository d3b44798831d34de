// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod queue;
pub mod workflow;

// Re-exports
pub use error::{DomainError, ValidationError};
pub use job::{
    EnqueueOutcome, Job, JobId, JobKind, JobName, JobPayload, JobStatus, NewJob, StatusCounts,
};
pub use queue::{Priority, QueuePolicy};
pub use workflow::{WorkflowRegistry, WorkflowSpec};
