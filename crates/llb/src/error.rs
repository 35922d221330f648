//! Error types for the execution graph model

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Error type for graph and reference operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// An image reference that does not follow the distribution grammar
    #[error("Invalid image reference '{reference}': {reason}")]
    #[diagnostic(
        code(tektonic::llb::invalid_reference),
        help("Use [registry/]repository[:tag][@sha256:digest] with a lowercase repository")
    )]
    InvalidReference {
        /// The reference as written
        reference: String,
        /// Why it was rejected
        reason: String,
    },

    /// An operation refers to a node that is not in the definition
    #[error("Node {node} is not part of this definition")]
    #[diagnostic(code(tektonic::llb::unknown_node))]
    UnknownNode {
        /// Arena index of the missing node
        node: usize,
    },

    /// The definition could not be marshalled
    #[error("Serialization error: {message}")]
    #[diagnostic(code(tektonic::llb::serialization))]
    Serialization {
        /// Error message from the serializer
        message: String,
    },
}

impl Error {
    /// Create an invalid reference error
    #[must_use]
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, Error>;
