//! Error types for resource loading and validation

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use crate::validation::ValidationIssue;
use miette::Diagnostic;
use thiserror::Error;

/// Error type for resource operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A document could not be parsed or decoded
    #[error("Failed to parse {origin}: {message}")]
    #[diagnostic(
        code(tektonic::resources::parse),
        help("Each document must be a YAML mapping with apiVersion and kind")
    )]
    Parse {
        /// Where the document came from (e.g. "main resource", "auxiliary 2, document 1")
        origin: String,
        /// Parser message
        message: String,
    },

    /// The main document is not a run we can compile
    #[error("Unsupported resource kind '{kind}' ({api_version})")]
    #[diagnostic(
        code(tektonic::resources::unsupported_kind),
        help("The main resource must be a tekton.dev TaskRun or PipelineRun")
    )]
    UnsupportedResourceKind {
        /// apiVersion of the document
        api_version: String,
        /// kind of the document
        kind: String,
    },

    /// Semantic validation failed
    #[error("Validation failed for '{resource}': {}", join_issues(issues))]
    #[diagnostic(code(tektonic::resources::validation))]
    Validation {
        /// Resource that failed validation
        resource: String,
        /// All issues found
        issues: Vec<ValidationIssue>,
    },
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a parse error
    #[must_use]
    pub fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported kind error
    #[must_use]
    pub fn unsupported_kind(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnsupportedResourceKind {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(resource: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self::Validation {
            resource: resource.into(),
            issues,
        }
    }
}

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, Error>;
