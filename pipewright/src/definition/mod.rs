//! The typed pipeline document model.
//!
//! Pipelines are built as plain value objects (resources, jobs, steps) and
//! serialized to the coordination server's configuration format in a single
//! step at the wire boundary. Structural invariants (no dangling references,
//! acyclic gating graph) are checked by [`PipelineDefinition::validate`]
//! before anything is sent.

mod pipeline;
mod resource;
mod step;

pub use pipeline::{Job, PipelineDefinition, VarSource};
pub use resource::{Resource, ResourceType, BUILTIN_RESOURCE_KINDS};
pub use step::{
    AcrossVar, Command, DoStep, GetStep, ImageResource, PutStep, Step, StepAttrs, TaskConfig,
    TaskInput, TaskOutput, TaskStep, TryStep,
};
