//! Cross-job sequencing through gate resources.
//!
//! Job plan order alone never sequences across jobs; every ordering in a
//! generated pipeline (online before offline, batch N before batch N+1) is
//! expressed by applying [`gate`] one or more times.

use crate::definition::{GetStep, Job, PutStep, Resource};

/// The resource kind backing gate resources.
pub const GATE_RESOURCE_KIND: &str = "keyval";

/// Sequences `downstream` after `upstream` through the named gate resource.
///
/// Appends a put advancing the gate to the upstream plan and prepends a
/// triggered get constrained to `passed=[upstream]` to the downstream plan.
/// The `passed` constraint guarantees the downstream get never observes a
/// gate advance belonging to an upstream run that did not succeed.
///
/// Returns the gate resource, which the caller must declare in the pipeline
/// along with a [`GATE_RESOURCE_KIND`] resource type.
pub fn gate(upstream: &mut Job, downstream: &mut Job, gate_name: &str) -> Resource {
    upstream.plan.push(
        PutStep::new(gate_name)
            .with_param("mapping", "timestamp = now()")
            .without_inputs()
            .into(),
    );
    downstream.plan.insert(
        0,
        GetStep::new(gate_name)
            .with_passed([upstream.name.clone()])
            .triggered()
            .into(),
    );
    Resource::new(gate_name, GATE_RESOURCE_KIND)
        .with_icon("gate")
        .check_never()
}
