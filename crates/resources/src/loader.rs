//! Resource loading
//!
//! Turns the main resource text plus any auxiliary texts into a [`LoadedRun`]:
//! the classified main run and name-indexed maps of Task and Pipeline
//! definitions.

use crate::document::split_documents;
use crate::resource::{ParsedDocument, Resource, ResourceKind, parse_document};
use crate::types::{Pipeline, PipelineRun, Task, TaskRun};
use crate::validation::{validate_pipeline_run, validate_task_run};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// The main run of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    /// A single task run
    TaskRun(TaskRun),
    /// A pipeline run
    PipelineRun(PipelineRun),
}

impl Run {
    /// Run name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::TaskRun(r) => r.metadata.name(),
            Self::PipelineRun(r) => r.metadata.name(),
        }
    }

    /// Run kind
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::TaskRun(_) => ResourceKind::TaskRun,
            Self::PipelineRun(_) => ResourceKind::PipelineRun,
        }
    }
}

/// Position of a document within a named auxiliary source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOrigin {
    /// File name of the auxiliary text, or `auxiliary <index>` when unnamed
    pub source: String,
    /// Zero-based document index within the source
    pub document: usize,
}

impl fmt::Display for DocumentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, document {}", self.source, self.document)
    }
}

/// Something the loader tolerated rather than failing on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadNote {
    /// A well-formed document that is not a Task or Pipeline
    Skipped {
        /// Where the document was found
        origin: DocumentOrigin,
        /// Declared apiVersion
        api_version: String,
        /// Declared kind
        kind: String,
    },
    /// A definition replaced an earlier one with the same name
    Replaced {
        /// Where the replacing definition was found
        origin: DocumentOrigin,
        /// Task or Pipeline
        kind: ResourceKind,
        /// Shared definition name
        name: String,
    },
}

impl fmt::Display for LoadNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped {
                origin,
                api_version,
                kind,
            } => write!(
                f,
                "skipping {kind} ({api_version}) at {origin}: not a Task or Pipeline"
            ),
            Self::Replaced { origin, kind, name } => {
                write!(f, "{kind} '{name}' at {origin} replaces an earlier definition")
            }
        }
    }
}

/// Task and Pipeline definitions keyed by name
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    /// Tasks by `metadata.name`
    pub tasks: HashMap<String, Task>,
    /// Pipelines by `metadata.name`
    pub pipelines: HashMap<String, Pipeline>,
}

/// Output of [`ResourceLoader::load`]
#[derive(Debug, Clone)]
pub struct LoadedRun {
    /// The main run
    pub run: Run,
    /// Task and Pipeline definitions from auxiliary texts
    pub definitions: Definitions,
    /// Tolerated oddities, in encounter order
    pub notes: Vec<LoadNote>,
}

/// A parsed auxiliary document, before it is registered
enum Entry {
    Definition(Resource, DocumentOrigin),
    Note(LoadNote),
}

impl LoadedRun {
    /// Register the Task and Pipeline definitions found in `text`.
    ///
    /// Every document is parsed before anything is registered, so a failure
    /// leaves the definitions untouched. `source` names the text in origins
    /// and errors.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] when a document fails to parse, or when a Task or
    /// Pipeline has neither `metadata.name` nor `metadata.generateName`.
    pub fn add_auxiliary(&mut self, source: &str, text: &str) -> Result<()> {
        let mut entries = Vec::new();
        for (document, doc_text) in split_documents(text).iter().enumerate() {
            let origin = DocumentOrigin {
                source: source.to_string(),
                document,
            };

            let mut resource = match parse_document(&origin.to_string(), doc_text)? {
                ParsedDocument::Resource(resource) => resource,
                ParsedDocument::Other { api_version, kind } => {
                    entries.push(Entry::Note(LoadNote::Skipped {
                        origin,
                        api_version,
                        kind,
                    }));
                    continue;
                }
            };
            resource.ensure_name();

            match resource.kind() {
                ResourceKind::TaskRun | ResourceKind::PipelineRun => {
                    entries.push(Entry::Note(LoadNote::Skipped {
                        origin,
                        api_version: "tekton.dev".to_string(),
                        kind: resource.kind().as_str().to_string(),
                    }));
                }
                ResourceKind::Task | ResourceKind::Pipeline if resource.name().is_empty() => {
                    return Err(Error::parse(
                        origin.to_string(),
                        format!(
                            "{} has neither metadata.name nor metadata.generateName",
                            resource.kind()
                        ),
                    ));
                }
                ResourceKind::Task | ResourceKind::Pipeline => {
                    entries.push(Entry::Definition(resource, origin));
                }
            }
        }

        for entry in entries {
            match entry {
                Entry::Note(note) => self.notes.push(note),
                Entry::Definition(resource, origin) => self.register(resource, origin),
            }
        }
        debug!(source, "Loaded auxiliary source");
        Ok(())
    }

    fn register(&mut self, resource: Resource, origin: DocumentOrigin) {
        let kind = resource.kind();
        let name = resource.name().to_string();
        let replaced = match resource {
            Resource::Task(task) => self.definitions.tasks.insert(name.clone(), task).is_some(),
            Resource::Pipeline(pipeline) => self
                .definitions
                .pipelines
                .insert(name.clone(), pipeline)
                .is_some(),
            Resource::TaskRun(_) | Resource::PipelineRun(_) => false,
        };
        if replaced {
            self.notes.push(LoadNote::Replaced { origin, kind, name });
        }
    }
}

/// Loads and classifies resources from raw text
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLoader;

impl ResourceLoader {
    /// Create a loader
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Load the main resource and its auxiliary definitions.
    ///
    /// Auxiliary texts are named `auxiliary <index>` in origins and errors.
    /// Use [`ResourceLoader::load_main`] and [`LoadedRun::add_auxiliary`] to
    /// name them after their files instead.
    ///
    /// # Errors
    ///
    /// - [`Error::Parse`] when the main text is not exactly one document, or
    ///   any document anywhere fails to parse. Nothing is returned in that case.
    /// - [`Error::UnsupportedResourceKind`] when the main document is not a
    ///   TaskRun or PipelineRun.
    /// - [`Error::Validation`] when the main run is structurally invalid.
    pub fn load<S: AsRef<str>>(&self, main: &str, auxiliaries: &[S]) -> Result<LoadedRun> {
        let mut loaded = self.load_main(main)?;
        for (index, text) in auxiliaries.iter().enumerate() {
            loaded.add_auxiliary(&format!("auxiliary {index}"), text.as_ref())?;
        }

        debug!(
            tasks = loaded.definitions.tasks.len(),
            pipelines = loaded.definitions.pipelines.len(),
            notes = loaded.notes.len(),
            "Loaded auxiliary definitions"
        );
        Ok(loaded)
    }

    /// Load and validate the main run, with no definitions yet.
    ///
    /// # Errors
    ///
    /// The main-document errors listed on [`ResourceLoader::load`].
    pub fn load_main(&self, main: &str) -> Result<LoadedRun> {
        let run = Self::parse_main(main)?;
        debug!(kind = %run.kind(), name = run.name(), "Loaded main resource");
        Ok(LoadedRun {
            run,
            definitions: Definitions::default(),
            notes: Vec::new(),
        })
    }

    fn parse_main(text: &str) -> Result<Run> {
        const ORIGIN: &str = "main resource";

        let documents = split_documents(text);
        let document = match documents.as_slice() {
            [single] => single,
            [] => return Err(Error::parse(ORIGIN, "no document found")),
            many => {
                return Err(Error::parse(
                    ORIGIN,
                    format!(
                        "found {} documents; multiple resources in the main resource are not supported",
                        many.len()
                    ),
                ));
            }
        };

        let mut resource = match parse_document(ORIGIN, document)? {
            ParsedDocument::Resource(resource) => resource,
            ParsedDocument::Other { api_version, kind } => {
                return Err(Error::unsupported_kind(api_version, kind));
            }
        };
        resource.ensure_name();
        let kind = resource.kind();

        match resource {
            Resource::TaskRun(run) => {
                let issues = validate_task_run(&run);
                if !issues.is_empty() {
                    return Err(Error::validation(run.metadata.name(), issues));
                }
                Ok(Run::TaskRun(run))
            }
            Resource::PipelineRun(run) => {
                let issues = validate_pipeline_run(&run);
                if !issues.is_empty() {
                    return Err(Error::validation(run.metadata.name(), issues));
                }
                Ok(Run::PipelineRun(run))
            }
            Resource::Task(_) | Resource::Pipeline(_) => {
                Err(Error::unsupported_kind("tekton.dev", kind.as_str()))
            }
        }
    }
}
