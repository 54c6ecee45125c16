//! Step types: get, put, task, do, try, and the across fan-out modifier.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Hooks and limits shared by every step kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepAttrs {
    /// Wall-clock budget, e.g. `"20m"`, interpreted by the execution engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// In-engine retry attempts for the step itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Step executed when this step fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Box<Step>>,
    /// Step executed when this step succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Box<Step>>,
    /// Fan-out parameterization with a concurrency bound.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub across: Vec<AcrossVar>,
}

/// One variable of an across fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcrossVar {
    /// The variable name steps reference as `((.:name.key))`.
    pub var: String,
    /// One value per fan-out instance.
    pub values: Vec<Value>,
    /// Bound on concurrently running instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<u32>,
}

/// Fetches a resource, optionally gated on upstream job success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetStep {
    /// The resource to fetch.
    pub get: String,
    /// Only proceed once these jobs have succeeded for the fetched version.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub passed: Vec<String>,
    /// Whether new versions trigger the containing job.
    #[serde(skip_serializing_if = "is_false", default)]
    pub trigger: bool,
    /// Common step attributes.
    #[serde(flatten)]
    pub attrs: StepAttrs,
}

impl GetStep {
    /// Creates a get step for the named resource.
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            get: resource.into(),
            passed: Vec::new(),
            trigger: false,
            attrs: StepAttrs::default(),
        }
    }

    /// Gates the get on the named upstream jobs.
    #[must_use]
    pub fn with_passed(mut self, jobs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.passed = jobs.into_iter().map(Into::into).collect();
        self
    }

    /// Makes new versions trigger the containing job.
    #[must_use]
    pub const fn triggered(mut self) -> Self {
        self.trigger = true;
        self
    }
}

/// Publishes to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutStep {
    /// The resource to publish to.
    pub put: String,
    /// Put parameters.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub params: BTreeMap<String, Value>,
    /// Artifacts streamed to the put container; `Some(vec![])` streams none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,
    /// Common step attributes.
    #[serde(flatten)]
    pub attrs: StepAttrs,
}

impl PutStep {
    /// Creates a put step for the named resource.
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            put: resource.into(),
            params: BTreeMap::new(),
            inputs: None,
            attrs: StepAttrs::default(),
        }
    }

    /// Adds a put parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Streams no artifacts into the put container.
    #[must_use]
    pub fn without_inputs(mut self) -> Self {
        self.inputs = Some(Vec::new());
        self
    }
}

/// A resource-less execution spec run by a task step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Execution platform, normally `"linux"`.
    pub platform: String,
    /// The container image to run in.
    pub image_resource: ImageResource,
    /// Input artifact names.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub inputs: Vec<TaskInput>,
    /// Output artifact names.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub outputs: Vec<TaskOutput>,
    /// The command to run.
    pub run: Command,
}

/// An anonymous container image reference for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResource {
    /// The image resource kind, normally `registry-image`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Source parameters (repository, tag).
    pub source: BTreeMap<String, Value>,
}

impl ImageResource {
    /// References an image from a registry.
    #[must_use]
    pub fn registry(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        let mut source = BTreeMap::new();
        source.insert("repository".to_string(), Value::String(repository.into()));
        source.insert("tag".to_string(), Value::String(tag.into()));
        Self {
            kind: "registry-image".to_string(),
            source,
        }
    }
}

/// A named task input artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    /// The artifact name.
    pub name: String,
}

/// A named task output artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// The artifact name.
    pub name: String,
}

/// The command a task runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Executable path.
    pub path: String,
    /// Arguments.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub args: Vec<String>,
    /// Working directory relative to the build root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Command {
    /// A `sh -exc <script>` command.
    #[must_use]
    pub fn shell(script: impl Into<String>) -> Self {
        Self {
            path: "sh".to_string(),
            args: vec!["-exc".to_string(), script.into()],
            dir: None,
        }
    }

    /// Sets the working directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}

/// Runs a command in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    /// The task name.
    pub task: String,
    /// The execution spec.
    pub config: TaskConfig,
    /// Environment parameters passed to the command.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub params: BTreeMap<String, String>,
    /// Common step attributes.
    #[serde(flatten)]
    pub attrs: StepAttrs,
}

impl TaskStep {
    /// Creates a task step.
    #[must_use]
    pub fn new(name: impl Into<String>, config: TaskConfig) -> Self {
        Self {
            task: name.into(),
            config,
            params: BTreeMap::new(),
            attrs: StepAttrs::default(),
        }
    }

    /// Adds an environment parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Runs steps in sequence; the across modifier fans the sequence out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoStep {
    /// The steps run in order.
    #[serde(rename = "do")]
    pub steps: Vec<Step>,
    /// Common step attributes.
    #[serde(flatten)]
    pub attrs: StepAttrs,
}

impl DoStep {
    /// Creates a sequence of steps.
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            attrs: StepAttrs::default(),
        }
    }

    /// Fans the sequence out over a variable with a concurrency bound.
    #[must_use]
    pub fn with_across(mut self, var: AcrossVar) -> Self {
        self.attrs.across.push(var);
        self
    }
}

/// Runs a step best-effort; its failure does not fail the containing plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStep {
    /// The wrapped step.
    #[serde(rename = "try")]
    pub step: Box<Step>,
    /// Common step attributes.
    #[serde(flatten)]
    pub attrs: StepAttrs,
}

impl TryStep {
    /// Wraps a step so its failure is swallowed.
    #[must_use]
    pub fn new(step: Step) -> Self {
        Self {
            step: Box::new(step),
            attrs: StepAttrs::default(),
        }
    }
}

/// A step in a job plan.
///
/// Serialized untagged: each kind is distinguished on the wire by its
/// defining key (`get`, `put`, `task`, `do`, `try`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    /// Fetch a resource.
    Get(GetStep),
    /// Publish to a resource.
    Put(PutStep),
    /// Run a command.
    Task(TaskStep),
    /// Run steps in sequence.
    Do(DoStep),
    /// Run a step best-effort.
    Try(TryStep),
}

impl Step {
    /// The step's common attributes.
    #[must_use]
    pub const fn attrs(&self) -> &StepAttrs {
        match self {
            Self::Get(s) => &s.attrs,
            Self::Put(s) => &s.attrs,
            Self::Task(s) => &s.attrs,
            Self::Do(s) => &s.attrs,
            Self::Try(s) => &s.attrs,
        }
    }

    /// Mutable access to the step's common attributes.
    pub fn attrs_mut(&mut self) -> &mut StepAttrs {
        match self {
            Self::Get(s) => &mut s.attrs,
            Self::Put(s) => &mut s.attrs,
            Self::Task(s) => &mut s.attrs,
            Self::Do(s) => &mut s.attrs,
            Self::Try(s) => &mut s.attrs,
        }
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.attrs_mut().timeout = Some(timeout.into());
        self
    }

    /// Sets the in-engine attempt count.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attrs_mut().attempts = Some(attempts);
        self
    }

    /// Sets the failure hook.
    #[must_use]
    pub fn on_failure(mut self, step: Self) -> Self {
        self.attrs_mut().on_failure = Some(Box::new(step));
        self
    }

    /// Sets the success hook.
    #[must_use]
    pub fn on_success(mut self, step: Self) -> Self {
        self.attrs_mut().on_success = Some(Box::new(step));
        self
    }

    /// Visits this step and every nested step (do/try bodies, hooks).
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
        f(self);
        match self {
            Self::Do(s) => {
                for step in &s.steps {
                    step.visit(f);
                }
            }
            Self::Try(s) => s.step.visit(f),
            Self::Get(_) | Self::Put(_) | Self::Task(_) => {}
        }
        let attrs = self.attrs();
        if let Some(step) = &attrs.on_failure {
            step.visit(f);
        }
        if let Some(step) = &attrs.on_success {
            step.visit(f);
        }
    }
}

impl From<GetStep> for Step {
    fn from(step: GetStep) -> Self {
        Self::Get(step)
    }
}

impl From<PutStep> for Step {
    fn from(step: PutStep) -> Self {
        Self::Put(step)
    }
}

impl From<TaskStep> for Step {
    fn from(step: TaskStep) -> Self {
        Self::Task(step)
    }
}

impl From<DoStep> for Step {
    fn from(step: DoStep) -> Self {
        Self::Do(step)
    }
}

impl From<TryStep> for Step {
    fn from(step: TryStep) -> Self {
        Self::Try(step)
    }
}
