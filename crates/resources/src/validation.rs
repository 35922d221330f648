//! Resource validation
//!
//! Structural checks that run before compilation. Each validator collects every
//! issue it finds instead of stopping at the first one.

use crate::types::{PipelineRun, PipelineSpec, PipelineTask, TaskRun, TaskSpec};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex is valid")
});

const DNS_LABEL_MAX: usize = 63;

/// A single validation finding
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationIssue {
    /// The resource has no name
    #[error("metadata.name is required")]
    MissingName,

    /// Neither or both of `taskSpec` and `taskRef` are set
    #[error("expected exactly one of taskSpec or taskRef, got {0}")]
    TaskSource(&'static str),

    /// Neither or both of `pipelineSpec` and `pipelineRef` are set
    #[error("expected exactly one of pipelineSpec or pipelineRef, got {0}")]
    PipelineSource(&'static str),

    /// A step name that is not a DNS-1123 label
    #[error("step name '{0}' must be a DNS-1123 label")]
    InvalidStepName(String),

    /// A step name used twice within a task
    #[error("step name '{0}' is used more than once")]
    DuplicateStep(String),

    /// A workspace declared twice
    #[error("workspace '{0}' is declared more than once")]
    DuplicateWorkspace(String),

    /// A workspace bound twice
    #[error("workspace binding '{0}' is given more than once")]
    DuplicateBinding(String),

    /// A binding for a workspace the task does not declare
    #[error("workspace binding '{0}' does not match a declared workspace")]
    UndeclaredWorkspace(String),

    /// A param declared twice
    #[error("param '{0}' is declared more than once")]
    DuplicateParam(String),

    /// A pipeline task name used twice
    #[error("pipeline task name '{0}' is used more than once")]
    DuplicatePipelineTask(String),

    /// A pipeline task name that is not a DNS-1123 label
    #[error("pipeline task name '{0}' must be a DNS-1123 label")]
    InvalidPipelineTaskName(String),

    /// `runAfter` names a task that is not in the pipeline
    #[error("pipeline task '{task}' runs after unknown task '{after}'")]
    UnknownRunAfter {
        /// Pipeline task with the bad entry
        task: String,
        /// The missing target
        after: String,
    },

    /// A `finally` task with `runAfter`
    #[error("finally task '{0}' cannot use runAfter")]
    FinallyRunAfter(String),

    /// A pipeline task binds a workspace the pipeline does not declare
    #[error("pipeline task '{task}' binds unknown pipeline workspace '{workspace}'")]
    UnknownPipelineWorkspace {
        /// Pipeline task with the bad binding
        task: String,
        /// The undeclared pipeline workspace
        workspace: String,
    },
}

fn is_dns_label(name: &str) -> bool {
    name.len() <= DNS_LABEL_MAX && DNS_LABEL.is_match(name)
}

fn source_count(spec: bool, reference: bool) -> Option<&'static str> {
    match (spec, reference) {
        (true, true) => Some("both"),
        (false, false) => Some("neither"),
        _ => None,
    }
}

/// Validate a task spec.
#[must_use]
pub fn validate_task_spec(spec: &TaskSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let mut step_names = HashSet::new();
    for step in &spec.steps {
        if step.name.is_empty() {
            continue;
        }
        if !is_dns_label(&step.name) {
            issues.push(ValidationIssue::InvalidStepName(step.name.clone()));
        }
        if !step_names.insert(step.name.as_str()) {
            issues.push(ValidationIssue::DuplicateStep(step.name.clone()));
        }
    }

    let mut workspaces = HashSet::new();
    for workspace in &spec.workspaces {
        if !workspaces.insert(workspace.name.as_str()) {
            issues.push(ValidationIssue::DuplicateWorkspace(workspace.name.clone()));
        }
    }

    let mut params = HashSet::new();
    for param in &spec.params {
        if !params.insert(param.name.as_str()) {
            issues.push(ValidationIssue::DuplicateParam(param.name.clone()));
        }
    }

    issues
}

/// Validate a TaskRun, including its embedded spec.
#[must_use]
pub fn validate_task_run(run: &TaskRun) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if run.metadata.name().is_empty() {
        issues.push(ValidationIssue::MissingName);
    }

    if let Some(count) = source_count(run.spec.task_spec.is_some(), run.spec.task_ref.is_some())
    {
        issues.push(ValidationIssue::TaskSource(count));
    }

    let mut bindings = HashSet::new();
    for binding in &run.spec.workspaces {
        if !bindings.insert(binding.name.as_str()) {
            issues.push(ValidationIssue::DuplicateBinding(binding.name.clone()));
        }
    }

    if let Some(spec) = &run.spec.task_spec {
        issues.extend(validate_task_spec(spec));
        for binding in &run.spec.workspaces {
            if !spec.workspaces.iter().any(|w| w.name == binding.name) {
                issues.push(ValidationIssue::UndeclaredWorkspace(binding.name.clone()));
            }
        }
    }

    issues
}

/// Validate a pipeline spec, including any embedded task specs.
#[must_use]
pub fn validate_pipeline_spec(spec: &PipelineSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let all_tasks = || spec.tasks.iter().chain(&spec.finally);

    let mut names = HashSet::new();
    for task in all_tasks() {
        if !is_dns_label(&task.name) {
            issues.push(ValidationIssue::InvalidPipelineTaskName(task.name.clone()));
        }
        if !names.insert(task.name.as_str()) {
            issues.push(ValidationIssue::DuplicatePipelineTask(task.name.clone()));
        }
        if let Some(count) = source_count(task.task_spec.is_some(), task.task_ref.is_some()) {
            issues.push(ValidationIssue::TaskSource(count));
        }
        if let Some(embedded) = &task.task_spec {
            issues.extend(validate_task_spec(embedded));
        }
        issues.extend(workspace_binding_issues(spec, task));
    }

    for task in &spec.tasks {
        for after in &task.run_after {
            if !spec.tasks.iter().any(|t| &t.name == after) {
                issues.push(ValidationIssue::UnknownRunAfter {
                    task: task.name.clone(),
                    after: after.clone(),
                });
            }
        }
    }

    for task in &spec.finally {
        if !task.run_after.is_empty() {
            issues.push(ValidationIssue::FinallyRunAfter(task.name.clone()));
        }
    }

    issues
}

fn workspace_binding_issues(spec: &PipelineSpec, task: &PipelineTask) -> Vec<ValidationIssue> {
    task.workspaces
        .iter()
        .map(|b| b.workspace.as_deref().unwrap_or(&b.name))
        .filter(|ws| !spec.workspaces.iter().any(|d| d.name == *ws))
        .map(|ws| ValidationIssue::UnknownPipelineWorkspace {
            task: task.name.clone(),
            workspace: ws.to_string(),
        })
        .collect()
}

/// Validate a PipelineRun, including its embedded pipeline spec.
#[must_use]
pub fn validate_pipeline_run(run: &PipelineRun) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if run.metadata.name().is_empty() {
        issues.push(ValidationIssue::MissingName);
    }

    if let Some(count) = source_count(
        run.spec.pipeline_spec.is_some(),
        run.spec.pipeline_ref.is_some(),
    ) {
        issues.push(ValidationIssue::PipelineSource(count));
    }

    let mut bindings = HashSet::new();
    for binding in &run.spec.workspaces {
        if !bindings.insert(binding.name.as_str()) {
            issues.push(ValidationIssue::DuplicateBinding(binding.name.clone()));
        }
    }

    if let Some(spec) = &run.spec.pipeline_spec {
        issues.extend(validate_pipeline_spec(spec));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ObjectMeta, Step, TaskRef, TaskRunSpec, WorkspaceBinding, WorkspaceDeclaration,
    };

    fn step(name: &str) -> Step {
        Step {
            name: name.to_string(),
            image: "alpine".to_string(),
            ..Default::default()
        }
    }

    fn named(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_task_run() {
        let run = TaskRun {
            metadata: named("build-1"),
            spec: TaskRunSpec {
                task_spec: Some(TaskSpec {
                    steps: vec![step("a"), step("b")],
                    ..Default::default()
                }),
                ..Default::default()
            },
        };
        assert!(validate_task_run(&run).is_empty());
    }

    #[test]
    fn test_missing_name_and_source() {
        let issues = validate_task_run(&TaskRun::default());
        assert!(issues.contains(&ValidationIssue::MissingName));
        assert!(issues.contains(&ValidationIssue::TaskSource("neither")));
    }

    #[test]
    fn test_both_sources() {
        let run = TaskRun {
            metadata: named("x"),
            spec: TaskRunSpec {
                task_spec: Some(TaskSpec::default()),
                task_ref: Some(TaskRef {
                    name: "t".into(),
                    kind: None,
                }),
                ..Default::default()
            },
        };
        assert_eq!(
            validate_task_run(&run),
            vec![ValidationIssue::TaskSource("both")]
        );
    }

    #[test]
    fn test_duplicate_and_invalid_step_names() {
        let spec = TaskSpec {
            steps: vec![step("a"), step("a"), step("Bad_Name"), step("")],
            ..Default::default()
        };
        let issues = validate_task_spec(&spec);
        assert!(issues.contains(&ValidationIssue::DuplicateStep("a".into())));
        assert!(issues.contains(&ValidationIssue::InvalidStepName("Bad_Name".into())));
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_undeclared_workspace_binding() {
        let run = TaskRun {
            metadata: named("x"),
            spec: TaskRunSpec {
                task_spec: Some(TaskSpec {
                    steps: vec![step("a")],
                    workspaces: vec![WorkspaceDeclaration {
                        name: "shared".into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                workspaces: vec![
                    WorkspaceBinding {
                        name: "shared".into(),
                        sub_path: None,
                    },
                    WorkspaceBinding {
                        name: "other".into(),
                        sub_path: None,
                    },
                ],
                ..Default::default()
            },
        };
        assert_eq!(
            validate_task_run(&run),
            vec![ValidationIssue::UndeclaredWorkspace("other".into())]
        );
    }

    #[test]
    fn test_pipeline_run_after_and_finally() {
        let spec = PipelineSpec {
            tasks: vec![PipelineTask {
                name: "test".into(),
                task_ref: Some(TaskRef {
                    name: "t".into(),
                    kind: None,
                }),
                run_after: vec!["build".into()],
                ..Default::default()
            }],
            finally: vec![PipelineTask {
                name: "cleanup".into(),
                task_ref: Some(TaskRef {
                    name: "t".into(),
                    kind: None,
                }),
                run_after: vec!["test".into()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let issues = validate_pipeline_spec(&spec);
        assert!(issues.contains(&ValidationIssue::UnknownRunAfter {
            task: "test".into(),
            after: "build".into()
        }));
        assert!(issues.contains(&ValidationIssue::FinallyRunAfter("cleanup".into())));
    }
}
