pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod splitter;
pub mod tree;

pub use orchestrator::{TrainingOrchestrator, TrainingResult, WalkForwardValidation};
pub use registry::{ExperimentRecord, ExperimentRegistry};
pub use splitter::{Split, WalkForwardSplitter};
