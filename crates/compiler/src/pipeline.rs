//! PipelineRun compilation
//!
//! Pipeline tasks are ordered by `runAfter` (with `finally` tasks after every
//! regular task), compiled one after another into the same definition, and
//! wired together by mounting each upstream task's final node read-only at
//! `/tekton-tasks/<upstream>` in every step of the dependent task.

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::graph::GraphBuilder;
use crate::step::{MountSpec, StepCompiler, TASK_OUTPUTS_PATH, WorkspaceBindings, scoped_key};
use crate::substitution::{Substitutions, apply_overrides, resolve_params};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use tektonic_llb::NodeId;
use tektonic_resources::types::{Param, PipelineRun, PipelineSpec, PipelineTask, TaskSpec};
use tektonic_resources::validation::{validate_pipeline_spec, validate_task_spec};
use tektonic_resources::{Definitions, ResourceKind};
use tektonic_task_graph::{Error as GraphError, TaskGraph, TaskNodeData};
use tracing::debug;

/// A pipeline task with its task spec resolved
#[derive(Debug, Clone)]
struct PlannedTask {
    task: PipelineTask,
    spec: TaskSpec,
    run_after: Vec<String>,
}

impl TaskNodeData for PlannedTask {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.run_after.iter().map(String::as_str)
    }
}

/// Orders and compiles the tasks of a PipelineRun
pub struct PipelineOrchestrator<'a> {
    definitions: &'a Definitions,
    steps: &'a StepCompiler,
}

impl<'a> PipelineOrchestrator<'a> {
    /// Create an orchestrator resolving references against `definitions`
    #[must_use]
    pub const fn new(definitions: &'a Definitions, steps: &'a StepCompiler) -> Self {
        Self { definitions, steps }
    }

    /// Compile `run` and return the node holding its result.
    ///
    /// # Errors
    ///
    /// Validation errors for unresolved references, dependency cycles and
    /// bad params; step and graph errors wrapped with the pipeline task name.
    pub async fn compile(
        &self,
        run: &PipelineRun,
        builder: &mut GraphBuilder<'_>,
        overrides: &BTreeMap<String, String>,
        diagnostics: &dyn Diagnostics,
    ) -> Result<NodeId> {
        let run_name = run.metadata.name();
        let spec = self.pipeline_spec(run)?;
        if spec.tasks.is_empty() {
            return Err(Error::validation("pipeline has no tasks"));
        }

        let params = apply_overrides(&run.spec.params, overrides);
        let mut substitutions =
            Substitutions::with_params(resolve_params(run_name, &spec.params, &params, diagnostics)?);
        substitutions.set_context("pipelineRun.name", run_name);

        let graph = self.plan(spec)?;
        let order = graph.topological_sort().map_err(graph_error)?;
        diagnostics.emit(DiagnosticEvent::TasksOrdered {
            order: order.iter().map(|n| n.name.clone()).collect(),
        });

        let run_bindings: HashMap<&str, Option<&str>> = run
            .spec
            .workspaces
            .iter()
            .map(|b| (b.name.as_str(), b.sub_path.as_deref()))
            .collect();

        let mut outputs: HashMap<String, NodeId> = HashMap::new();
        for node in &order {
            let planned = &node.task;
            let resource = format!("{run_name}-{}", node.name);

            let output = self
                .compile_task(
                    run_name,
                    &resource,
                    planned,
                    &run_bindings,
                    &substitutions,
                    &outputs,
                    builder,
                )
                .await
                .map_err(|e| e.in_resource(format!("pipeline task '{}'", node.name)))?;
            debug!(task = %node.name, node = %output, "Compiled pipeline task");
            outputs.insert(node.name.clone(), output);
        }

        let sinks: Vec<NodeId> = graph
            .sinks()
            .into_iter()
            .filter_map(|name| outputs.get(name).copied())
            .collect();
        match sinks.as_slice() {
            [single] => Ok(*single),
            _ => builder.merge(sinks, format!("{run_name}/merge")),
        }
    }

    async fn compile_task(
        &self,
        run_name: &str,
        resource: &str,
        planned: &PlannedTask,
        run_bindings: &HashMap<&str, Option<&str>>,
        substitutions: &Substitutions,
        outputs: &HashMap<String, NodeId>,
        builder: &mut GraphBuilder<'_>,
    ) -> Result<NodeId> {
        let mut bindings = WorkspaceBindings::new(resource);
        for binding in &planned.task.workspaces {
            let pipeline_ws = binding.workspace.as_deref().unwrap_or(&binding.name);
            let base = scoped_key(
                run_name,
                pipeline_ws,
                run_bindings.get(pipeline_ws).copied().flatten(),
            );
            let key = match binding.sub_path.as_deref().map(|p| p.trim_matches('/')) {
                Some(sub_path) if !sub_path.is_empty() => format!("{base}/{sub_path}"),
                _ => base,
            };
            bindings.bind(&binding.name, key);
        }

        let params = planned
            .task
            .params
            .iter()
            .map(|param| {
                Ok(Param {
                    name: param.name.clone(),
                    value: param.value.try_map(|v| substitutions.apply(v))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let extra_mounts: Vec<MountSpec> = planned
            .run_after
            .iter()
            .filter_map(|upstream| {
                outputs
                    .get(upstream)
                    .map(|node| MountSpec::node(format!("{TASK_OUTPUTS_PATH}/{upstream}"), *node))
            })
            .collect();

        let descriptors = self.steps.compile(&planned.spec, resource, &bindings, &params)?;
        builder.build(resource, &descriptors, &extra_mounts).await
    }

    fn pipeline_spec<'r>(&'r self, run: &'r PipelineRun) -> Result<&'r PipelineSpec> {
        if let Some(spec) = &run.spec.pipeline_spec {
            return Ok(spec);
        }
        let Some(reference) = &run.spec.pipeline_ref else {
            return Err(Error::validation("pipelineSpec or pipelineRef is required"));
        };
        let pipeline = self
            .definitions
            .pipelines
            .get(&reference.name)
            .ok_or_else(|| {
                Error::validation(format!("Pipeline '{}' was not found", reference.name))
            })?;

        let issues = validate_pipeline_spec(&pipeline.spec);
        if !issues.is_empty() {
            return Err(tektonic_resources::Error::validation(
                format!("{} {}", ResourceKind::Pipeline, reference.name),
                issues,
            )
            .into());
        }
        Ok(&pipeline.spec)
    }

    fn task_spec(&self, task: &PipelineTask) -> Result<TaskSpec> {
        if let Some(spec) = &task.task_spec {
            return Ok(spec.clone());
        }
        let Some(reference) = &task.task_ref else {
            return Err(Error::validation(format!(
                "pipeline task '{}' needs taskSpec or taskRef",
                task.name
            )));
        };
        let definition = self.definitions.tasks.get(&reference.name).ok_or_else(|| {
            Error::validation(format!(
                "Task '{}' referenced by pipeline task '{}' was not found",
                reference.name, task.name
            ))
        })?;

        let issues = validate_task_spec(&definition.spec);
        if !issues.is_empty() {
            return Err(tektonic_resources::Error::validation(
                format!("{} {}", ResourceKind::Task, reference.name),
                issues,
            )
            .into());
        }
        Ok(definition.spec.clone())
    }

    fn plan(&self, spec: &PipelineSpec) -> Result<TaskGraph<PlannedTask>> {
        let regular: Vec<String> = spec.tasks.iter().map(|t| t.name.clone()).collect();

        let mut graph = TaskGraph::new();
        for task in &spec.tasks {
            let planned = PlannedTask {
                spec: self.task_spec(task)?,
                run_after: task.run_after.clone(),
                task: task.clone(),
            };
            graph.add_task(&task.name, planned).map_err(graph_error)?;
        }
        for task in &spec.finally {
            let planned = PlannedTask {
                spec: self.task_spec(task)?,
                run_after: regular.clone(),
                task: task.clone(),
            };
            graph.add_task(&task.name, planned).map_err(graph_error)?;
        }
        graph.add_dependency_edges().map_err(graph_error)?;
        Ok(graph)
    }
}

fn graph_error(err: GraphError) -> Error {
    Error::validation(err.to_string())
}
