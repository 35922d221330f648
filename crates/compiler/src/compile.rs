//! Run compilation entry point

use crate::config::BuildOptions;
use crate::context::BuildContext;
use crate::diagnostics::DiagnosticEvent;
use crate::graph::GraphBuilder;
use crate::pipeline::PipelineOrchestrator;
use crate::resolver::ImageMetadataResolver;
use crate::step::StepCompiler;
use crate::taskrun::compile_task_run;
use crate::Result;
use std::sync::Arc;
use tektonic_llb::{Definition, MarshalledDefinition, NodeId};
use tektonic_resources::{LoadedRun, Run};
use tracing::info;

/// A built definition and the node holding its result
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    /// Every node added while compiling
    pub definition: Definition,
    /// Node whose filesystem is the build result
    pub output: NodeId,
}

impl CompiledGraph {
    /// Serialize the part of the definition that produces the output
    ///
    /// # Errors
    ///
    /// Only fails if the output node is missing, which indicates a bug.
    pub fn marshal(&self) -> Result<MarshalledDefinition> {
        Ok(self.definition.marshal(self.output)?)
    }
}

/// Compile a loaded run into an execution graph.
///
/// Loader notes are forwarded to the context's diagnostics first. On any
/// error, including cancellation, no graph is returned.
///
/// # Errors
///
/// Any compilation error, wrapped with the run's kind and name.
pub async fn compile(
    loaded: &LoadedRun,
    options: &BuildOptions,
    ctx: &BuildContext,
    resolver: &dyn ImageMetadataResolver,
) -> Result<CompiledGraph> {
    for note in &loaded.notes {
        ctx.diagnostics.emit(DiagnosticEvent::Load(note.clone()));
    }

    let steps = StepCompiler::new(Arc::clone(&ctx.diagnostics));
    let mut definition = Definition::new();
    let mut builder = GraphBuilder::new(&mut definition, resolver, Arc::clone(&ctx.diagnostics))
        .with_cancellation(ctx.cancel.clone())
        .with_ignore_cache(options.no_cache);

    let output = match &loaded.run {
        Run::TaskRun(run) => compile_task_run(run, &steps, &mut builder, &options.params).await,
        Run::PipelineRun(run) => {
            PipelineOrchestrator::new(&loaded.definitions, &steps)
                .compile(run, &mut builder, &options.params, ctx.diagnostics.as_ref())
                .await
        }
    }
    .map_err(|e| e.in_resource(format!("{} {}", loaded.run.kind(), loaded.run.name())))?;

    info!(
        run = %loaded.run.name(),
        nodes = definition.len(),
        output = %output,
        "Compiled execution graph"
    );
    Ok(CompiledGraph { definition, output })
}
