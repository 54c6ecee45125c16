//! Jobs, var sources, and the top-level pipeline aggregate.

use super::resource::{Resource, ResourceType, BUILTIN_RESOURCE_KINDS};
use super::step::Step;
use crate::errors::PipelineValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// The job name, unique within a pipeline.
    pub name: String,
    /// The steps run in order.
    pub plan: Vec<Step>,
    /// Disallow concurrent instances of this job.
    #[serde(skip_serializing_if = "is_false", default)]
    pub serial: bool,
}

impl Job {
    /// Creates a job with the given plan.
    #[must_use]
    pub fn new(name: impl Into<String>, plan: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            plan,
            serial: false,
        }
    }

    /// Disallows concurrent instances.
    #[must_use]
    pub const fn serial(mut self) -> Self {
        self.serial = true;
        self
    }
}

/// A named substitution namespace providing `((name:key))` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarSource {
    /// The namespace name.
    pub name: String,
    /// The var-source kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// The kind-specific configuration.
    pub config: VarSourceConfig,
}

/// Configuration of a var source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarSourceConfig {
    /// The provided values.
    pub vars: BTreeMap<String, Value>,
}

impl VarSource {
    /// A static var source carrying literal values.
    #[must_use]
    pub fn dummy(name: impl Into<String>, vars: BTreeMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            kind: "dummy".to_string(),
            config: VarSourceConfig { vars },
        }
    }
}

/// The top-level pipeline aggregate sent to the coordination server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Substitution namespaces.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub var_sources: Vec<VarSource>,
    /// Declared resource kinds.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub resource_types: Vec<ResourceType>,
    /// Declared resources.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub resources: Vec<Resource>,
    /// Jobs.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub jobs: Vec<Job>,
}

impl PipelineDefinition {
    /// Checks the structural invariants of the pipeline graph.
    ///
    /// Verifies that resource and job names are unique, that every get/put
    /// references a declared resource, that every custom resource kind has a
    /// declared resource type, that every `passed` constraint names an
    /// existing job, and that the `passed` dependency graph is acyclic.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant, naming the parts involved.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        let mut resource_names = HashSet::new();
        for resource in &self.resources {
            if !resource_names.insert(resource.name.as_str()) {
                return Err(PipelineValidationError::new(format!(
                    "resource '{}' is declared more than once",
                    resource.name
                ))
                .with_names(vec![resource.name.clone()]));
            }
        }

        let mut job_names = HashSet::new();
        for job in &self.jobs {
            if !job_names.insert(job.name.as_str()) {
                return Err(PipelineValidationError::new(format!(
                    "job '{}' is declared more than once",
                    job.name
                ))
                .with_names(vec![job.name.clone()]));
            }
        }

        let declared_kinds: HashSet<&str> = self
            .resource_types
            .iter()
            .map(|rt| rt.name.as_str())
            .chain(BUILTIN_RESOURCE_KINDS.iter().copied())
            .collect();
        for resource in &self.resources {
            if !declared_kinds.contains(resource.kind.as_str()) {
                return Err(PipelineValidationError::new(format!(
                    "resource '{}' uses undeclared resource type '{}'",
                    resource.name, resource.kind
                ))
                .with_names(vec![resource.name.clone(), resource.kind.clone()]));
            }
        }

        // passed edges: upstream job -> downstream job
        let mut passed_edges: HashMap<String, HashSet<String>> = HashMap::new();
        for job in &self.jobs {
            let mut violation = None;
            for step in &job.plan {
                step.visit(&mut |s| {
                    if violation.is_some() {
                        return;
                    }
                    match s {
                        Step::Get(get) => {
                            if !resource_names.contains(get.get.as_str()) {
                                violation = Some(PipelineValidationError::new(format!(
                                    "job '{}' gets undeclared resource '{}'",
                                    job.name, get.get
                                ))
                                .with_names(vec![job.name.clone(), get.get.clone()]));
                                return;
                            }
                            for upstream in &get.passed {
                                if !job_names.contains(upstream.as_str()) {
                                    violation = Some(PipelineValidationError::new(format!(
                                        "job '{}' is gated on unknown job '{upstream}'",
                                        job.name
                                    ))
                                    .with_names(vec![job.name.clone(), upstream.clone()]));
                                    return;
                                }
                                passed_edges
                                    .entry(upstream.clone())
                                    .or_default()
                                    .insert(job.name.clone());
                            }
                        }
                        Step::Put(put) => {
                            if !resource_names.contains(put.put.as_str()) {
                                violation = Some(PipelineValidationError::new(format!(
                                    "job '{}' puts undeclared resource '{}'",
                                    job.name, put.put
                                ))
                                .with_names(vec![job.name.clone(), put.put.clone()]));
                            }
                        }
                        Step::Task(_) | Step::Do(_) | Step::Try(_) => {}
                    }
                });
            }
            if let Some(err) = violation {
                return Err(err);
            }
        }

        detect_cycles(&passed_edges)
    }
}

/// Detects cycles in the `passed` dependency graph between jobs.
fn detect_cycles(edges: &HashMap<String, HashSet<String>>) -> Result<(), PipelineValidationError> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for node in edges.keys() {
        if !visited.contains(node.as_str()) {
            if let Some(cycle) = dfs_cycle(node, edges, &mut visited, &mut rec_stack, &mut path) {
                return Err(PipelineValidationError::new(format!(
                    "gating cycle between jobs: {}",
                    cycle.join(" -> ")
                ))
                .with_names(cycle));
            }
        }
    }
    Ok(())
}

fn dfs_cycle(
    node: &str,
    edges: &HashMap<String, HashSet<String>>,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<Vec<String>> {
    visited.insert(node.to_string());
    rec_stack.insert(node.to_string());
    path.push(node.to_string());

    if let Some(downstream) = edges.get(node) {
        for next in downstream {
            if !visited.contains(next.as_str()) {
                if let Some(cycle) = dfs_cycle(next, edges, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(next.as_str()) {
                let cycle_start = path.iter().position(|n| n == next)?;
                let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                cycle.push(next.clone());
                return Some(cycle);
            }
        }
    }

    path.pop();
    rec_stack.remove(node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{GetStep, PutStep};

    fn gate_resource(name: &str) -> Resource {
        Resource::new(name, "keyval").check_never()
    }

    fn keyval_type() -> ResourceType {
        ResourceType::registry_image("keyval", "ghcr.io/cludden/concourse-keyval-resource")
    }

    #[test]
    fn test_validate_empty_pipeline() {
        assert!(PipelineDefinition::default().validate().is_ok());
    }

    #[test]
    fn test_validate_dangling_resource() {
        let pipeline = PipelineDefinition {
            jobs: vec![Job::new("build", vec![GetStep::new("missing").into()])],
            ..Default::default()
        };
        let err = pipeline.validate().unwrap_err();
        assert!(err.message.contains("undeclared resource 'missing'"));
        assert_eq!(err.names, vec!["build".to_string(), "missing".to_string()]);
    }

    #[test]
    fn test_validate_undeclared_resource_type() {
        let pipeline = PipelineDefinition {
            resources: vec![gate_resource("gate-1")],
            ..Default::default()
        };
        let err = pipeline.validate().unwrap_err();
        assert!(err.message.contains("undeclared resource type 'keyval'"));
    }

    #[test]
    fn test_validate_unknown_passed_job() {
        let pipeline = PipelineDefinition {
            resource_types: vec![keyval_type()],
            resources: vec![gate_resource("gate-1")],
            jobs: vec![Job::new(
                "downstream",
                vec![GetStep::new("gate-1").with_passed(["upstream"]).into()],
            )],
            ..Default::default()
        };
        let err = pipeline.validate().unwrap_err();
        assert!(err.message.contains("unknown job 'upstream'"));
    }

    #[test]
    fn test_validate_gating_cycle() {
        let pipeline = PipelineDefinition {
            resource_types: vec![keyval_type()],
            resources: vec![gate_resource("gate-a"), gate_resource("gate-b")],
            jobs: vec![
                Job::new(
                    "a",
                    vec![
                        GetStep::new("gate-b").with_passed(["b"]).into(),
                        PutStep::new("gate-a").into(),
                    ],
                ),
                Job::new(
                    "b",
                    vec![
                        GetStep::new("gate-a").with_passed(["a"]).into(),
                        PutStep::new("gate-b").into(),
                    ],
                ),
            ],
            ..Default::default()
        };
        let err = pipeline.validate().unwrap_err();
        assert!(err.message.contains("gating cycle"));
    }

    #[test]
    fn test_validate_duplicate_job_name() {
        let pipeline = PipelineDefinition {
            jobs: vec![Job::new("same", vec![]), Job::new("same", vec![])],
            ..Default::default()
        };
        let err = pipeline.validate().unwrap_err();
        assert!(err.message.contains("declared more than once"));
    }

    #[test]
    fn test_validate_reaches_nested_steps() {
        // A dangling put hidden inside an on_failure hook must still be caught.
        let step: Step = Step::from(GetStep::new("gate-1"))
            .on_failure(PutStep::new("missing-alert").into());
        let pipeline = PipelineDefinition {
            resource_types: vec![keyval_type()],
            resources: vec![gate_resource("gate-1")],
            jobs: vec![Job::new("build", vec![step])],
            ..Default::default()
        };
        let err = pipeline.validate().unwrap_err();
        assert!(err.message.contains("missing-alert"));
    }
}
