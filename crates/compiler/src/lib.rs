//! Compiles Tekton runs into cacheable execution graphs.
//!
//! The pipeline from text to graph:
//!
//! 1. [`tektonic_resources::ResourceLoader`] classifies the main run and
//!    collects Task and Pipeline definitions
//! 2. [`StepCompiler`] turns a task's steps into [`StepDescriptor`]s
//! 3. [`GraphBuilder`] chains descriptors into exec nodes, each step mounting
//!    the previous step's root read-only
//! 4. [`PipelineOrchestrator`] orders pipeline tasks and wires their outputs
//!    together
//!
//! [`frontend::build`] drives the whole flow against caller-supplied
//! collaborators: a [`SourceFetcher`], an [`ImageMetadataResolver`] and a
//! [`Solver`].

mod compile;
mod config;
mod context;
mod diagnostics;
mod error;
pub mod frontend;
mod graph;
mod pipeline;
mod resolver;
mod step;
mod substitution;
mod taskrun;

pub use compile::{CompiledGraph, compile};
pub use config::{BuildOptions, DEFAULT_CONTEXT_PATTERNS, DEFAULT_FILENAME, PARAM_PREFIX};
pub use context::{BuildContext, cancellable};
pub use diagnostics::{DiagnosticEvent, Diagnostics, RecordingDiagnostics, TracingDiagnostics};
pub use error::{Error, ErrorKind, Result};
pub use frontend::{SolveResult, Solver, SourceFetcher, build};
pub use graph::GraphBuilder;
pub use pipeline::PipelineOrchestrator;
pub use resolver::{ImageMetadataResolver, StaticImageResolver};
pub use step::{
    MountOrigin, MountSpec, RESULTS_PATH, STEP_OUTPUTS_PATH, StepCompiler, StepDescriptor,
    TASK_OUTPUTS_PATH, WORKSPACE_ROOT, WorkspaceBindings,
};
pub use substitution::{Substitutions, apply_overrides, resolve_params};
pub use taskrun::compile_task_run;
