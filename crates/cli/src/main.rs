//! tektonic: compile Tekton runs into cacheable execution graphs

mod cli;
mod fetch;
mod images;
mod shutdown;
mod solve;
mod tracing;

use crate::cli::{BuildArgs, Commands};
use crate::fetch::LocalSource;
use crate::solve::JsonSolver;
use crate::tracing::{TracingConfig, init_tracing};
use tektonic_compiler::{BuildContext, SolveResult, StaticImageResolver};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = cli::parse();

    init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        filter: cli.log_filter,
    })?;

    match cli.command {
        Commands::Build(args) => run_build(args).await,
    }
}

async fn run_build(args: BuildArgs) -> miette::Result<()> {
    let ctx = BuildContext::new(args.options()).with_cancellation(shutdown::cancel_on_signal());
    let source = LocalSource::new(&args.context);
    let resolver = match &args.images {
        Some(path) => images::load_images(path).await?,
        None => StaticImageResolver::new(),
    };
    let solver = JsonSolver::new(args.output.clone());

    ::tracing::info!(
        context = %args.context.display(),
        correlation_id = %crate::tracing::correlation_id(),
        "Starting build"
    );
    let result = tektonic_compiler::build(&ctx, &source, &resolver, &solver).await?;

    report(&result);
    Ok(())
}

/// Stdout carries the definition unless it went to a file
#[allow(clippy::print_stdout, clippy::print_stderr)]
fn report(result: &SolveResult) {
    if let Some(reference) = &result.reference {
        println!("{} {reference}", result.output_digest);
    } else {
        eprintln!("{}", result.output_digest);
    }
}
