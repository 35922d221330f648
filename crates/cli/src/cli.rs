//! Command line definition

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tektonic")]
#[command(about = "Compile Tekton TaskRuns and PipelineRuns into cacheable execution graphs")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-format",
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(
        long = "log-filter",
        global = true,
        value_name = "DIRECTIVES",
        help = "Tracing filter directives, overriding RUST_LOG and --log-level"
    )]
    pub log_filter: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Compile a run and hand the definition to the solver")]
    Build(BuildArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[arg(
        short = 'f',
        long,
        help = "Main resource file, relative to the context (default task.yaml)"
    )]
    pub file: Option<String>,

    #[arg(
        short = 'C',
        long,
        help = "Build context directory",
        default_value = "."
    )]
    pub context: PathBuf,

    #[arg(
        long = "opt",
        value_name = "KEY=VALUE",
        help = "Build option, e.g. no-cache=true or param:version=1.2",
        value_parser = parse_key_value
    )]
    pub opts: Vec<(String, String)>,

    #[arg(long, help = "JSON file mapping image references to image configs")]
    pub images: Option<PathBuf>,

    #[arg(
        short = 'o',
        long,
        help = "Write the definition here instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

impl BuildArgs {
    /// Raw build options, with `--file` taking precedence over `--opt filename=`
    pub fn options(&self) -> HashMap<String, String> {
        let mut options: HashMap<String, String> = self.opts.iter().cloned().collect();
        if let Some(file) = &self.file {
            options.insert("filename".to_string(), file.clone());
        }
        options
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, _)) if key.trim().is_empty() => Err(format!("missing key in '{raw}'")),
        Some((key, value)) => Ok((key.trim().to_string(), value.to_string())),
        None => Ok((raw.trim().to_string(), String::new())),
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["tektonic", "build"]).unwrap();

        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert_eq!(cli.log_filter, None);
        let Commands::Build(args) = cli.command;
        assert_eq!(args.context, PathBuf::from("."));
        assert!(args.options().is_empty());
    }

    #[test]
    fn test_cli_log_level_parsing() {
        let cli = Cli::try_parse_from(["tektonic", "--log-level", "debug", "build"]).unwrap();
        assert_eq!(cli.level, LogLevel::Debug);

        let cli = Cli::try_parse_from(["tektonic", "build", "-l", "error"]).unwrap();
        assert_eq!(cli.level, LogLevel::Error);

        assert!(Cli::try_parse_from(["tektonic", "--log-level", "loud", "build"]).is_err());
    }

    #[test]
    fn test_cli_log_filter_parsing() {
        let cli = Cli::try_parse_from([
            "tektonic",
            "build",
            "--log-filter",
            "tektonic_compiler=trace,warn",
        ])
        .unwrap();
        assert_eq!(
            cli.log_filter.as_deref(),
            Some("tektonic_compiler=trace,warn")
        );
    }

    #[test]
    fn test_build_options() {
        let cli = Cli::try_parse_from([
            "tektonic",
            "build",
            "--opt",
            "filename=ignored.yaml",
            "--opt",
            "param:version=1.2=rc",
            "--opt",
            "no-cache",
            "-f",
            "run.yaml",
        ])
        .unwrap();
        let Commands::Build(args) = cli.command;
        let options = args.options();
        assert_eq!(options["filename"], "run.yaml");
        assert_eq!(options["param:version"], "1.2=rc");
        assert_eq!(options["no-cache"], "");
    }

    #[test]
    fn test_option_needs_key() {
        assert!(Cli::try_parse_from(["tektonic", "build", "--opt", "=x"]).is_err());
    }
}
