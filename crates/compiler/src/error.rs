//! Error types for compilation and the build flow

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

/// Error category, stable across context wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or ambiguous document structure
    Parse,
    /// The main document is not a TaskRun or PipelineRun
    UnsupportedResourceKind,
    /// A recognized construct that is not implemented
    UnsupportedFeature,
    /// A step image that is not a valid reference
    InvalidImageReference,
    /// Semantic validation failure before or during compilation
    Validation,
    /// Fetching text, listing the context, resolving metadata or solving failed
    ExternalIo,
    /// A task with no steps has no result node
    EmptyTaskSpec,
    /// The caller cancelled the build
    Cancelled,
    /// Graph bookkeeping failed; indicates a bug rather than bad input
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parse => "parse",
            Self::UnsupportedResourceKind => "unsupported resource kind",
            Self::UnsupportedFeature => "unsupported feature",
            Self::InvalidImageReference => "invalid image reference",
            Self::Validation => "validation",
            Self::ExternalIo => "external I/O",
            Self::EmptyTaskSpec => "empty task spec",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Error type for compiler operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Loading or validating resources failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resources(#[from] tektonic_resources::Error),

    /// Building the execution graph failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] tektonic_llb::Error),

    /// A recognized construct that is not implemented
    #[error("{feature} is not supported")]
    #[diagnostic(
        code(tektonic::compiler::unsupported_feature),
        help("Embed the definition directly or remove the unsupported field")
    )]
    UnsupportedFeature {
        /// Feature description
        feature: String,
    },

    /// Semantic validation failed
    #[error("Validation failed: {message}")]
    #[diagnostic(code(tektonic::compiler::validation))]
    Validation {
        /// What is wrong
        message: String,
    },

    /// A collaborator call failed
    #[error("{operation} failed: {message}")]
    #[diagnostic(code(tektonic::compiler::external_io))]
    ExternalIo {
        /// What was being attempted
        operation: String,
        /// Underlying failure
        message: String,
    },

    /// A task declared no steps
    #[error("Task '{resource}' has no steps")]
    #[diagnostic(
        code(tektonic::compiler::empty_task_spec),
        help("A task needs at least one step to produce a result")
    )]
    EmptyTaskSpec {
        /// Resource whose task is empty
        resource: String,
    },

    /// The cancellation token fired
    #[error("Build cancelled")]
    #[diagnostic(code(tektonic::compiler::cancelled))]
    Cancelled,

    /// Failure inside a step
    #[error("in step '{step}': {source}")]
    #[diagnostic(code(tektonic::compiler::step))]
    InStep {
        /// Step display name
        step: String,
        /// Wrapped error
        #[source]
        source: Box<Self>,
    },

    /// Failure inside a resource
    #[error("in {resource}: {source}")]
    #[diagnostic(code(tektonic::compiler::resource))]
    InResource {
        /// Resource name, prefixed by kind
        resource: String,
        /// Wrapped error
        #[source]
        source: Box<Self>,
    },

    /// Failure reading or handling a named source file
    #[error("in file '{file}': {source}")]
    #[diagnostic(code(tektonic::compiler::file))]
    InFile {
        /// Source filename
        file: String,
        /// Wrapped error
        #[source]
        source: Box<Self>,
    },
}

impl Error {
    /// Create an unsupported feature error
    #[must_use]
    pub fn unsupported_feature(feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an external I/O error
    #[must_use]
    pub fn external_io(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ExternalIo {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create an empty task spec error
    #[must_use]
    pub fn empty_task_spec(resource: impl Into<String>) -> Self {
        Self::EmptyTaskSpec {
            resource: resource.into(),
        }
    }

    /// Wrap with the step that produced the error
    #[must_use]
    pub fn in_step(self, step: impl Into<String>) -> Self {
        Self::InStep {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Wrap with the resource that produced the error
    #[must_use]
    pub fn in_resource(self, resource: impl Into<String>) -> Self {
        Self::InResource {
            resource: resource.into(),
            source: Box::new(self),
        }
    }

    /// Wrap with the file that produced the error
    #[must_use]
    pub fn in_file(self, file: impl Into<String>) -> Self {
        Self::InFile {
            file: file.into(),
            source: Box::new(self),
        }
    }

    /// The category of the innermost error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resources(err) => match err {
                tektonic_resources::Error::Parse { .. } => ErrorKind::Parse,
                tektonic_resources::Error::UnsupportedResourceKind { .. } => {
                    ErrorKind::UnsupportedResourceKind
                }
                tektonic_resources::Error::Validation { .. } => ErrorKind::Validation,
            },
            Self::Graph(err) => match err {
                tektonic_llb::Error::InvalidReference { .. } => ErrorKind::InvalidImageReference,
                tektonic_llb::Error::UnknownNode { .. } | tektonic_llb::Error::Serialization { .. } => {
                    ErrorKind::Internal
                }
            },
            Self::UnsupportedFeature { .. } => ErrorKind::UnsupportedFeature,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ExternalIo { .. } => ErrorKind::ExternalIo,
            Self::EmptyTaskSpec { .. } => ErrorKind::EmptyTaskSpec,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InStep { source, .. }
            | Self::InResource { source, .. }
            | Self::InFile { source, .. } => source.kind(),
        }
    }
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_looks_through_context() {
        let err = Error::unsupported_feature("inline script")
            .in_step("build-1/hello")
            .in_resource("TaskRun build-1")
            .in_file("task.yaml");
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
        assert_eq!(
            err.to_string(),
            "in file 'task.yaml': in TaskRun build-1: in step 'build-1/hello': inline script is not supported"
        );
    }

    #[test]
    fn test_kind_of_wrapped_crate_errors() {
        let parse: Error = tektonic_resources::Error::parse("main resource", "bad").into();
        assert_eq!(parse.kind(), ErrorKind::Parse);

        let image: Error = tektonic_llb::Error::invalid_reference("Bad", "uppercase").into();
        assert_eq!(image.kind(), ErrorKind::InvalidImageReference);
    }
}
