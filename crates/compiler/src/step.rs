//! Step compilation
//!
//! Turns a [`TaskSpec`]'s steps into [`StepDescriptor`]s: normalized image,
//! substituted arguments and environment, and the list of mounts the graph
//! builder must attach. Descriptors carry no node identities of their own;
//! mounts that refer to other nodes name them by step index or [`NodeId`].

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::substitution::{Substitutions, resolve_params};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tektonic_llb::{CacheSharing, ImageReference, NodeId};
use tektonic_resources::types::{Param, TaskSpec, WorkspaceBinding};

/// Shared results directory visible to every step of a resource
pub const RESULTS_PATH: &str = "/tekton/results";

/// Directory under which step *i* sees step *i-1*'s root filesystem
pub const STEP_OUTPUTS_PATH: &str = "/tekton-results";

/// Default parent directory of workspace mounts
pub const WORKSPACE_ROOT: &str = "/workspace";

/// Directory under which pipeline tasks see upstream task outputs
pub const TASK_OUTPUTS_PATH: &str = "/tekton-tasks";

/// Where a mount's contents come from, before node identities exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOrigin {
    /// Persistent engine-managed cache directory
    Cache {
        /// Cache key
        key: String,
        /// Concurrent access mode
        sharing: CacheSharing,
    },
    /// Root filesystem of the step at `index` within the same build call
    StepOutput {
        /// Position of the earlier step
        index: usize,
    },
    /// Root filesystem of an already-built node
    Node(NodeId),
}

/// A mount to attach to a step's exec node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Absolute mount point
    pub target: String,
    /// Contents of the mount
    pub origin: MountOrigin,
    /// Mounted without write access
    pub readonly: bool,
}

impl MountSpec {
    /// Shared persistent cache mount
    #[must_use]
    pub fn cache(target: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            origin: MountOrigin::Cache {
                key: key.into(),
                sharing: CacheSharing::Shared,
            },
            readonly: false,
        }
    }

    /// Read-only view of an earlier step's output, at `/tekton-results/<index>`
    #[must_use]
    pub fn step_output(index: usize) -> Self {
        Self {
            target: format!("{STEP_OUTPUTS_PATH}/{index}"),
            origin: MountOrigin::StepOutput { index },
            readonly: true,
        }
    }

    /// Read-only view of a built node
    #[must_use]
    pub fn node(target: impl Into<String>, node: NodeId) -> Self {
        Self {
            target: target.into(),
            origin: MountOrigin::Node(node),
            readonly: true,
        }
    }

    /// Set the read-only flag
    #[must_use]
    pub const fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }
}

/// A compiled step, ready for the graph builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    /// Step name, or its index when the step is unnamed
    pub name: String,
    /// `<resourceName>/<name>`
    pub display_name: String,
    /// Normalized step image
    pub image: ImageReference,
    /// `command ++ args` after substitution
    pub args: Vec<String>,
    /// `KEY=value` entries, applied over the image environment
    pub env: Vec<String>,
    /// Overrides the image working directory
    pub working_dir: Option<String>,
    /// Results cache first, then workspaces in declaration order
    pub mounts: Vec<MountSpec>,
}

/// Cache keys backing each task workspace
///
/// Unbound workspaces fall back to `<resourceName>/<workspaceName>`.
#[derive(Debug, Clone)]
pub struct WorkspaceBindings {
    resource: String,
    keys: HashMap<String, String>,
}

impl WorkspaceBindings {
    /// Bindings for `resource` with no explicit keys
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            keys: HashMap::new(),
        }
    }

    /// Bindings from a TaskRun's `workspaces` list
    #[must_use]
    pub fn from_task_run(resource: &str, bindings: &[WorkspaceBinding]) -> Self {
        let mut result = Self::new(resource);
        for binding in bindings {
            let key = scoped_key(resource, &binding.name, binding.sub_path.as_deref());
            result.bind(&binding.name, key);
        }
        result
    }

    /// Back `workspace` with `key`
    pub fn bind(&mut self, workspace: &str, key: impl Into<String>) {
        self.keys.insert(workspace.to_string(), key.into());
    }

    /// Cache key for `workspace`
    #[must_use]
    pub fn key(&self, workspace: &str) -> String {
        self.keys
            .get(workspace)
            .cloned()
            .unwrap_or_else(|| format!("{}/{workspace}", self.resource))
    }
}

/// `<scope>/<name>`, with `/<subPath>` appended when given
pub(crate) fn scoped_key(scope: &str, name: &str, sub_path: Option<&str>) -> String {
    match sub_path.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(sub_path) => format!("{scope}/{name}/{sub_path}"),
        None => format!("{scope}/{name}"),
    }
}

/// Compiles task steps into descriptors
#[derive(Clone)]
pub struct StepCompiler {
    diagnostics: Arc<dyn Diagnostics>,
}

impl StepCompiler {
    /// Create a compiler reporting to `diagnostics`
    #[must_use]
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    /// Compile every step of `spec`, in declaration order.
    ///
    /// A spec with no steps yields no descriptors; the graph builder decides
    /// what that means.
    ///
    /// # Errors
    ///
    /// - unsupported feature for a step with an inline script
    /// - invalid image reference for a malformed image
    /// - validation for bad params or variable references
    ///
    /// Step errors are wrapped with the step's display name.
    pub fn compile(
        &self,
        spec: &TaskSpec,
        resource: &str,
        bindings: &WorkspaceBindings,
        params: &[Param],
    ) -> Result<Vec<StepDescriptor>> {
        let resolved = resolve_params(resource, &spec.params, params, self.diagnostics.as_ref())?;
        let mut substitutions = Substitutions::with_params(resolved);
        substitutions.set_context("taskRun.name", resource);

        let mut shared_mounts = vec![MountSpec::cache(
            RESULTS_PATH,
            format!("{resource}/results"),
        )];
        for result in &spec.results {
            substitutions.set_result_path(&result.name, format!("{RESULTS_PATH}/{}", result.name));
        }
        for workspace in &spec.workspaces {
            let target = workspace
                .mount_path
                .clone()
                .unwrap_or_else(|| format!("{WORKSPACE_ROOT}/{}", workspace.name));
            substitutions.set_workspace_path(&workspace.name, target.clone());
            shared_mounts.push(
                MountSpec::cache(target, bindings.key(&workspace.name))
                    .readonly(workspace.read_only),
            );
        }

        spec.steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let name = if step.name.is_empty() {
                    index.to_string()
                } else {
                    step.name.clone()
                };
                let display_name = format!("{resource}/{name}");

                self.compile_step(step, name, &display_name, &substitutions, &shared_mounts)
                    .map_err(|e| e.in_step(&display_name))
            })
            .collect()
    }

    fn compile_step(
        &self,
        step: &tektonic_resources::types::Step,
        name: String,
        display_name: &str,
        substitutions: &Substitutions,
        mounts: &[MountSpec],
    ) -> Result<StepDescriptor> {
        if step.script.as_deref().is_some_and(|s| !s.trim().is_empty()) {
            return Err(Error::unsupported_feature("inline script"));
        }

        let image = ImageReference::parse_normalized(&substitutions.apply(&step.image)?)?;

        let command: Vec<String> = step.command.iter().chain(&step.args).cloned().collect();
        let args = substitutions.expand_args(&command)?;

        let env = step
            .env
            .iter()
            .map(|var| {
                let value = substitutions.apply(var.value.as_deref().unwrap_or_default())?;
                Ok(format!("{}={value}", var.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let working_dir = step
            .working_dir
            .as_deref()
            .map(|dir| substitutions.apply(dir))
            .transpose()?;

        self.diagnostics.emit(DiagnosticEvent::StepCompiled {
            display_name: display_name.to_string(),
            image: image.to_string(),
        });

        Ok(StepDescriptor {
            name,
            display_name: display_name.to_string(),
            image,
            args,
            env,
            working_dir,
            mounts: mounts.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::diagnostics::RecordingDiagnostics;
    use tektonic_resources::types::{ParamSpec, ParamValue, Step, WorkspaceDeclaration};

    fn step(name: &str, image: &str, command: &[&str]) -> Step {
        Step {
            name: name.to_string(),
            image: image.to_string(),
            command: command.iter().map(|s| (*s).to_string()).collect(),
            ..Step::default()
        }
    }

    fn compiler() -> StepCompiler {
        StepCompiler::new(Arc::new(RecordingDiagnostics::new()))
    }

    #[test]
    fn test_descriptor_fields() {
        let spec = TaskSpec {
            steps: vec![Step {
                args: vec!["$(params.msg)".into()],
                working_dir: Some("$(workspaces.src.path)".into()),
                env: vec![tektonic_resources::types::EnvVar {
                    name: "CI".into(),
                    value: Some("true".into()),
                }],
                ..step("hello", "alpine", &["echo"])
            }],
            workspaces: vec![WorkspaceDeclaration {
                name: "src".into(),
                ..WorkspaceDeclaration::default()
            }],
            params: vec![ParamSpec {
                name: "msg".into(),
                param_type: None,
                description: None,
                default: Some(ParamValue::String("hi".into())),
            }],
            ..TaskSpec::default()
        };

        let descriptors = compiler()
            .compile(&spec, "build-1", &WorkspaceBindings::new("build-1"), &[])
            .unwrap();
        let d = &descriptors[0];
        assert_eq!(d.display_name, "build-1/hello");
        assert_eq!(d.image.to_string(), "docker.io/library/alpine");
        assert_eq!(d.args, vec!["echo", "hi"]);
        assert_eq!(d.env, vec!["CI=true"]);
        assert_eq!(d.working_dir.as_deref(), Some("/workspace/src"));
        assert_eq!(
            d.mounts,
            vec![
                MountSpec::cache("/tekton/results", "build-1/results"),
                MountSpec::cache("/workspace/src", "build-1/src"),
            ]
        );
    }

    #[test]
    fn test_unnamed_steps_use_index() {
        let spec = TaskSpec {
            steps: vec![step("", "alpine", &["true"]), step("", "alpine", &["true"])],
            ..TaskSpec::default()
        };
        let descriptors = compiler()
            .compile(&spec, "run", &WorkspaceBindings::new("run"), &[])
            .unwrap();
        assert_eq!(descriptors[1].display_name, "run/1");
    }

    #[test]
    fn test_mount_path_and_binding_overrides() {
        let spec = TaskSpec {
            steps: vec![step("s", "alpine", &["ls"])],
            workspaces: vec![WorkspaceDeclaration {
                name: "cache".into(),
                mount_path: Some("/root/.cache".into()),
                read_only: true,
                ..WorkspaceDeclaration::default()
            }],
            ..TaskSpec::default()
        };
        let mut bindings = WorkspaceBindings::new("run-build");
        bindings.bind("cache", "run/go-cache");

        let descriptors = compiler().compile(&spec, "run-build", &bindings, &[]).unwrap();
        assert_eq!(
            descriptors[0].mounts[1],
            MountSpec::cache("/root/.cache", "run/go-cache").readonly(true)
        );
    }

    #[test]
    fn test_script_is_rejected_with_step_context() {
        let spec = TaskSpec {
            steps: vec![Step {
                script: Some("#!/bin/sh\necho hi".into()),
                ..step("hello", "alpine", &[])
            }],
            ..TaskSpec::default()
        };
        let err = compiler()
            .compile(&spec, "build-1", &WorkspaceBindings::new("build-1"), &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
        assert!(err.to_string().contains("build-1/hello"));
    }

    #[test]
    fn test_sub_path_is_part_of_key() {
        let bindings = WorkspaceBindings::from_task_run(
            "build-1",
            &[WorkspaceBinding {
                name: "shared".into(),
                sub_path: Some("/go/".into()),
            }],
        );
        assert_eq!(bindings.key("shared"), "build-1/shared/go");
        assert_eq!(bindings.key("other"), "build-1/other");
    }
}
