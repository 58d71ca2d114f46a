// Public modules
pub mod artifacts;
pub mod ci;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod output;
pub mod paths;
pub mod release;
pub mod venv;

// Re-export common types for convenience
pub use engine::pipeline;
pub use error::{Error, ErrorCode, Result};
pub use output::{BuildOutput, StepOutput, UploadOutput};
