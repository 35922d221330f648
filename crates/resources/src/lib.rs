//! Typed Tekton resources for tektonic.
//!
//! This crate turns raw YAML text into classified, validated resources:
//!
//! - [`split_documents`] splits multi-document text on `---` lines
//! - [`parse_document`] decodes one document into a [`ParsedDocument`]
//! - [`ResourceLoader`] loads the main run plus auxiliary Task and Pipeline
//!   definitions into a [`LoadedRun`]
//!
//! # Example
//!
//! ```ignore
//! use tektonic_resources::{ResourceLoader, Run};
//!
//! let loaded = ResourceLoader::new().load(&main_text, &context_texts)?;
//! match loaded.run {
//!     Run::TaskRun(run) => { /* compile one task */ }
//!     Run::PipelineRun(run) => { /* order and compile pipeline tasks */ }
//! }
//! ```

mod document;
mod error;
mod loader;
mod resource;
pub mod types;
pub mod validation;

pub use document::{count_documents, split_documents};
pub use error::{Error, Result};
pub use loader::{Definitions, DocumentOrigin, LoadNote, LoadedRun, ResourceLoader, Run};
pub use resource::{ParsedDocument, Resource, ResourceKind, parse_document};
pub use validation::ValidationIssue;
