// Application Layer - Use Cases and Business Logic

pub mod control;
pub mod ingestion;
pub mod recovery;
pub mod retry;
pub mod validation;
pub mod worker;

// Re-exports
pub use control::ControlService;
pub use ingestion::{IngestionReport, IngestionService};
pub use recovery::RecoveryService;
pub use retry::BackoffPolicy;
pub use validation::Validator;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};
