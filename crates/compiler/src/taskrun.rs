//! TaskRun compilation

use crate::graph::GraphBuilder;
use crate::step::{StepCompiler, WorkspaceBindings};
use crate::substitution::apply_overrides;
use crate::{Error, Result};
use std::collections::BTreeMap;
use tektonic_llb::NodeId;
use tektonic_resources::types::TaskRun;

/// Compile a TaskRun's embedded task into a step chain.
///
/// # Errors
///
/// A TaskRun that only names a Task through `taskRef` is an unsupported
/// feature. Step and graph errors are passed through.
pub async fn compile_task_run(
    run: &TaskRun,
    steps: &StepCompiler,
    builder: &mut GraphBuilder<'_>,
    overrides: &BTreeMap<String, String>,
) -> Result<NodeId> {
    let name = run.metadata.name();
    let spec = match (&run.spec.task_spec, &run.spec.task_ref) {
        (Some(spec), _) => spec,
        (None, Some(reference)) => {
            return Err(Error::unsupported_feature(format!(
                "taskRef '{}' without an embedded taskSpec",
                reference.name
            )));
        }
        (None, None) => return Err(Error::validation("taskSpec is required")),
    };

    let bindings = WorkspaceBindings::from_task_run(name, &run.spec.workspaces);
    let params = apply_overrides(&run.spec.params, overrides);
    let descriptors = steps.compile(spec, name, &bindings, &params)?;
    builder.build(name, &descriptors, &[]).await
}
