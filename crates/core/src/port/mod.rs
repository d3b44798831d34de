// Port Layer - Interfaces for external dependencies

pub mod backend;
pub mod description_source;
pub mod job_repository;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use backend::{BackendError, BackendOutcome, GenerationBackend};
pub use description_source::{DescriptionSource, ScannedDescription};
pub use job_repository::JobRepository;
pub use time_provider::TimeProvider;
