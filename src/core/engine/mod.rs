//! Generic pipeline execution infrastructure.
//!
//! - `pipeline` - Step/executor/resolver traits and sequential fail-fast execution
//!
//! Domain-specific orchestration (the release pipeline) builds on these primitives.

pub mod pipeline;
