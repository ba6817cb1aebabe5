// Library exports for reuse by the CLI and integration tests
pub mod cli;
pub mod error;
pub mod image_processing;
pub mod json_output;
pub mod utils;

// Re-export commonly used types
pub use cli::VectorizerKind;
pub use error::{DepixelError, DepixelResult, FailureKind};
pub use image_processing::{
    BatchJob, BatchReport, ChromaKey, DepixelConfig, JobEvent, KeyMatcher, ProcessingEngine,
    ProcessingResult, Stage, VectorDocument,
};
pub use json_output::JsonMessage;
