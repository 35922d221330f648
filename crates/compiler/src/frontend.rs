//! Frontend build flow
//!
//! Options → main file → context files → load → compile → solve. Every
//! collaborator call races the context's cancellation token.

use crate::compile::compile;
use crate::config::BuildOptions;
use crate::context::{BuildContext, cancellable};
use crate::resolver::ImageMetadataResolver;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tektonic_llb::MarshalledDefinition;
use tektonic_resources::ResourceLoader;
use tracing::{debug, info};

/// Read access to the build's source files
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Raw bytes of the file `name`, relative to the build context
    async fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    /// Names of context entries matching any of `patterns`, sorted and unique
    async fn list(&self, patterns: &[String]) -> Result<Vec<String>>;
}

/// Hands a marshalled definition to the build engine
#[async_trait]
pub trait Solver: Send + Sync {
    /// Solve `definition` and report where the result went
    async fn solve(&self, definition: &MarshalledDefinition) -> Result<SolveResult>;
}

/// What the solver produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResult {
    /// Digest of the output node
    pub output_digest: String,
    /// Solver-specific result reference, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Run one build end to end.
///
/// # Errors
///
/// Collaborator failures, loader and compiler errors, and
/// [`Error::Cancelled`]. Errors tied to a file are wrapped with its name.
pub async fn build(
    ctx: &BuildContext,
    fetcher: &dyn SourceFetcher,
    resolver: &dyn ImageMetadataResolver,
    solver: &dyn Solver,
) -> Result<SolveResult> {
    let options = BuildOptions::from_raw(&ctx.options, ctx.diagnostics.as_ref())?;
    debug!(?options, "Parsed build options");

    let main = fetch_text(ctx, fetcher, &options.filename).await?;
    let mut loaded = ResourceLoader::new()
        .load_main(&main)
        .map_err(|e| Error::from(e).in_file(&options.filename))?;

    let names = cancellable(&ctx.cancel, fetcher.list(&options.context_patterns)).await?;
    for name in names.iter().filter(|n| **n != options.filename) {
        debug!(file = %name, "Reading auxiliary definitions");
        let text = fetch_text(ctx, fetcher, name).await?;
        loaded
            .add_auxiliary(name, &text)
            .map_err(|e| Error::from(e).in_file(name))?;
    }

    let compiled = compile(&loaded, &options, ctx, resolver).await?;
    let definition = compiled.marshal()?;

    let result = cancellable(&ctx.cancel, solver.solve(&definition)).await?;
    info!(output = %result.output_digest, "Build solved");
    Ok(result)
}

async fn fetch_text(ctx: &BuildContext, fetcher: &dyn SourceFetcher, name: &str) -> Result<String> {
    let bytes = cancellable(&ctx.cancel, fetcher.read_file(name))
        .await
        .map_err(|e| e.in_file(name))?;
    String::from_utf8(bytes).map_err(|e| {
        Error::from(tektonic_resources::Error::parse(name, format!("not valid UTF-8: {e}")))
            .in_file(name)
    })
}
