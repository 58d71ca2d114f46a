mod executor;
mod pipeline;
mod resolver;
mod types;

pub use pipeline::{plan, run};
pub(crate) use pipeline::run_project;
pub use types::{
    ReleaseOptions, ReleasePlan, ReleasePlanStatus, ReleasePlanStep, ReleaseRun, ReleaseStepType,
    ReleaseVariant,
};
