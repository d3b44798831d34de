// Gantry Infrastructure - System Adapters
// Implements: DescriptionSource (watch root), GenerationBackend (HTTP)

pub mod fs_source;
pub mod http_backend;
pub mod workflow_loader;

pub use fs_source::FsDescriptionSource;
pub use http_backend::HttpBackend;
pub use workflow_loader::load_workflows;
