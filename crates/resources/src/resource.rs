//! Resource classification
//!
//! Every document is decoded into a [`ParsedDocument`]: either one of the four
//! Tekton kinds the compiler understands, or a well-formed object of some other
//! kind that callers may choose to skip.

use crate::types::{ObjectMeta, Pipeline, PipelineRun, Task, TaskRun};
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// API group of the resources this crate decodes
pub const TEKTON_GROUP: &str = "tekton.dev";

/// API versions whose schema matches [`crate::types`]
pub const SUPPORTED_VERSIONS: &[&str] = &["v1beta1", "v1"];

/// Length of the suffix appended to `generateName`
const GENERATED_SUFFIX_LEN: usize = 5;

/// The four resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `TaskRun`
    TaskRun,
    /// `PipelineRun`
    PipelineRun,
    /// `Task`
    Task,
    /// `Pipeline`
    Pipeline,
}

impl ResourceKind {
    fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "TaskRun" => Some(Self::TaskRun),
            "PipelineRun" => Some(Self::PipelineRun),
            "Task" => Some(Self::Task),
            "Pipeline" => Some(Self::Pipeline),
            _ => None,
        }
    }

    /// The `kind` string as written in YAML
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskRun => "TaskRun",
            Self::PipelineRun => "PipelineRun",
            Self::Task => "Task",
            Self::Pipeline => "Pipeline",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded Tekton resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A run of one task
    TaskRun(TaskRun),
    /// A run of a pipeline
    PipelineRun(PipelineRun),
    /// A reusable task definition
    Task(Task),
    /// A reusable pipeline definition
    Pipeline(Pipeline),
}

impl Resource {
    /// The resource kind
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::TaskRun(_) => ResourceKind::TaskRun,
            Self::PipelineRun(_) => ResourceKind::PipelineRun,
            Self::Task(_) => ResourceKind::Task,
            Self::Pipeline(_) => ResourceKind::Pipeline,
        }
    }

    /// Object metadata
    #[must_use]
    pub const fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::TaskRun(r) => &r.metadata,
            Self::PipelineRun(r) => &r.metadata,
            Self::Task(r) => &r.metadata,
            Self::Pipeline(r) => &r.metadata,
        }
    }

    /// The resource name (empty until one is set or synthesized)
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata().name()
    }

    /// Synthesize `metadata.name` from `metadata.generateName` when absent.
    ///
    /// The suffix is derived from the resource spec, so the same text always
    /// yields the same name and downstream cache keys stay stable.
    pub fn ensure_name(&mut self) {
        match self {
            Self::TaskRun(r) => synthesize_name(&mut r.metadata, &r.spec),
            Self::PipelineRun(r) => synthesize_name(&mut r.metadata, &r.spec),
            Self::Task(r) => synthesize_name(&mut r.metadata, &r.spec),
            Self::Pipeline(r) => synthesize_name(&mut r.metadata, &r.spec),
        }
    }
}

fn synthesize_name<S: Serialize>(metadata: &mut ObjectMeta, spec: &S) {
    if metadata.name.as_deref().is_some_and(|n| !n.is_empty()) {
        return;
    }
    let Some(prefix) = metadata.generate_name.as_deref().filter(|p| !p.is_empty()) else {
        return;
    };

    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update([0u8]);
    // Serializing plain data structs to JSON cannot fail.
    hasher.update(serde_json::to_vec(spec).unwrap_or_default());
    let digest = hex::encode(hasher.finalize());

    let name = format!("{prefix}{}", &digest[..GENERATED_SUFFIX_LEN]);
    tracing::debug!(%prefix, %name, "Synthesized resource name");
    metadata.name = Some(name);
}

/// Result of decoding one document
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedDocument {
    /// A Tekton resource the compiler understands
    Resource(Resource),
    /// A well-formed object of another kind
    Other {
        /// apiVersion of the object
        api_version: String,
        /// kind of the object
        kind: String,
    },
}

/// Decode a single YAML document.
///
/// `origin` is used in error messages. Fails with [`Error::Parse`] when the
/// document is not valid YAML, is not a mapping, lacks `apiVersion`/`kind`, or
/// is a recognized kind whose body does not match the schema.
pub fn parse_document(origin: &str, text: &str) -> Result<ParsedDocument> {
    let value: Value =
        serde_yaml::from_str(text).map_err(|e| Error::parse(origin, e.to_string()))?;

    let Value::Mapping(mapping) = &value else {
        return Err(Error::parse(origin, "document is not a mapping"));
    };

    let api_version = string_field(mapping, "apiVersion")
        .ok_or_else(|| Error::parse(origin, "object 'apiVersion' is missing"))?;
    let kind = string_field(mapping, "kind")
        .ok_or_else(|| Error::parse(origin, "object 'kind' is missing"))?;

    let resource_kind = is_supported_api_version(&api_version)
        .then(|| ResourceKind::from_kind(&kind))
        .flatten();

    let Some(resource_kind) = resource_kind else {
        return Ok(ParsedDocument::Other { api_version, kind });
    };

    let resource = match resource_kind {
        ResourceKind::TaskRun => Resource::TaskRun(decode(origin, value)?),
        ResourceKind::PipelineRun => Resource::PipelineRun(decode(origin, value)?),
        ResourceKind::Task => Resource::Task(decode(origin, value)?),
        ResourceKind::Pipeline => Resource::Pipeline(decode(origin, value)?),
    };
    Ok(ParsedDocument::Resource(resource))
}

fn decode<T: DeserializeOwned>(origin: &str, value: Value) -> Result<T> {
    serde_yaml::from_value(value).map_err(|e| Error::parse(origin, e.to_string()))
}

fn string_field(mapping: &serde_yaml::Mapping, key: &str) -> Option<String> {
    mapping
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn is_supported_api_version(api_version: &str) -> bool {
    api_version
        .split_once('/')
        .is_some_and(|(group, version)| {
            group == TEKTON_GROUP && SUPPORTED_VERSIONS.contains(&version)
        })
}
