//! Tekton resource types
//!
//! The subset of the `tekton.dev/v1beta1` (and wire-compatible `v1`) schema that
//! the compiler understands. Unknown fields are ignored when decoding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kubernetes object metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Prefix used to synthesize a name when `name` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,

    /// Namespace (informational only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// The object name, or an empty string when none has been set.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// A parameter value: a string or an array of strings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ParamValue {
    /// Plain string value
    String(String),
    /// Array value, expanded with `$(params.name[*])`
    Array(Vec<String>),
}

impl ParamValue {
    /// Map every string in the value through `f`.
    pub fn try_map<E>(
        &self,
        mut f: impl FnMut(&str) -> Result<String, E>,
    ) -> Result<Self, E> {
        Ok(match self {
            Self::String(s) => Self::String(f(s)?),
            Self::Array(items) => Self::Array(
                items
                    .iter()
                    .map(|item| f(item))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

/// A named parameter value supplied by a run or pipeline task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Supplied value
    pub value: ParamValue,
}

/// A parameter declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,

    /// Declared type ("string" or "array")
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Value used when the run supplies none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
}

/// Environment variable for a step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    /// Variable name
    pub name: String,

    /// Literal value; `valueFrom` sources are not supported and read as empty
    #[serde(default)]
    pub value: Option<String>,
}

/// One containerized command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Step name, used in display names
    #[serde(default)]
    pub name: String,

    /// Container image reference
    #[serde(default)]
    pub image: String,

    /// Entrypoint override
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    /// Arguments to the entrypoint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Working directory inside the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Inline script body (not supported by the compiler)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// A workspace slot declared by a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDeclaration {
    /// Workspace name
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Overrides the default `/workspace/<name>` mount path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,

    /// Mount the workspace read-only
    #[serde(default)]
    pub read_only: bool,

    /// The run may leave this workspace unbound
    #[serde(default)]
    pub optional: bool,
}

/// A result declared by a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskResult {
    /// Result name, written to `/tekton/results/<name>`
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An ordered list of steps plus declared workspaces, params and results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Steps, run in order
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Workspaces the steps may mount
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<WorkspaceDeclaration>,

    /// Declared parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,

    /// Declared results
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<TaskResult>,
}

/// Reference to a Task by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRef {
    /// Task name
    pub name: String,

    /// Referenced kind; only `Task` is supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Reference to a Pipeline by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineRef {
    /// Pipeline name
    pub name: String,
}

/// Binds a declared workspace to storage for a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceBinding {
    /// Workspace name as declared
    pub name: String,

    /// Subdirectory of the bound storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

/// Specification of a TaskRun
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunSpec {
    /// Embedded task definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_spec: Option<TaskSpec>,

    /// Named task definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<TaskRef>,

    /// Workspace bindings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<WorkspaceBinding>,

    /// Parameter values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,

    /// Service account (informational only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// A request to run one task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TaskRun {
    /// Run metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Run specification
    #[serde(default)]
    pub spec: TaskRunSpec,
}

/// A reusable task definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Task {
    /// Task metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Task definition
    #[serde(default)]
    pub spec: TaskSpec,
}

/// Maps a task workspace onto a pipeline workspace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacePipelineTaskBinding {
    /// Workspace name as declared by the task
    pub name: String,

    /// Pipeline workspace name; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    /// Subdirectory of the pipeline workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

/// A workspace declared by a pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineWorkspaceDeclaration {
    /// Workspace name
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The run may leave this workspace unbound
    #[serde(default)]
    pub optional: bool,
}

/// A task within a pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTask {
    /// Pipeline task name, unique within the pipeline
    pub name: String,

    /// Named task definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<TaskRef>,

    /// Embedded task definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_spec: Option<TaskSpec>,

    /// Names of pipeline tasks that must complete first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_after: Vec<String>,

    /// Workspace bindings onto pipeline workspaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<WorkspacePipelineTaskBinding>,

    /// Parameter values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
}

/// Ordered/dependent set of tasks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Pipeline tasks
    #[serde(default)]
    pub tasks: Vec<PipelineTask>,

    /// Tasks that run after every task in `tasks`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finally: Vec<PipelineTask>,

    /// Declared workspaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<PipelineWorkspaceDeclaration>,

    /// Declared parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
}

/// A reusable pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Pipeline {
    /// Pipeline metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Pipeline definition
    #[serde(default)]
    pub spec: PipelineSpec,
}

/// Specification of a PipelineRun
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    /// Named pipeline definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_ref: Option<PipelineRef>,

    /// Embedded pipeline definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_spec: Option<PipelineSpec>,

    /// Workspace bindings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<WorkspaceBinding>,

    /// Parameter values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
}

/// A request to run a pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PipelineRun {
    /// Run metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Run specification
    #[serde(default)]
    pub spec: PipelineRunSpec,
}
