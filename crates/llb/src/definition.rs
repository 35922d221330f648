//! Execution graph definition
//!
//! A [`Definition`] is an append-only arena of [`Node`]s. Nodes reference
//! earlier nodes by [`NodeId`], so the arena order is always a valid
//! topological order and the graph is acyclic by construction.

use crate::digest::DigestBuilder;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::trace;

/// Version tag written into marshalled definitions
pub const DEFINITION_VERSION: &str = "tektonic.llb/v1";

/// Index of a node within a [`Definition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Concurrent access mode for a cache mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheSharing {
    /// Concurrent writers share one directory
    #[default]
    Shared,
    /// Each concurrent writer gets its own copy
    Private,
    /// Writers are serialized
    Locked,
}

impl CacheSharing {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Private => "private",
            Self::Locked => "locked",
        }
    }
}

/// Image configuration used to seed a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    /// Content digest pinning the image, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// `KEY=value` environment entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    /// Default working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Default user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Where a mount's contents come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MountSource {
    /// A directory of another node's output filesystem
    Node {
        /// Node whose output is mounted
        node: NodeId,
        /// Path within the node's filesystem
        selector: String,
    },
    /// A persistent cache directory owned by the engine
    Cache {
        /// Cache key
        id: String,
        /// Concurrent access mode
        sharing: CacheSharing,
    },
}

/// A filesystem mount for an exec operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    /// Absolute mount point
    pub target: String,
    /// Contents of the mount
    pub source: MountSource,
    /// Mounted without write access
    #[serde(default)]
    pub readonly: bool,
}

impl Mount {
    /// Mount `node`'s filesystem at `target`
    #[must_use]
    pub fn node(target: impl Into<String>, node: NodeId, readonly: bool) -> Self {
        Self {
            target: target.into(),
            source: MountSource::Node {
                node,
                selector: "/".to_string(),
            },
            readonly,
        }
    }

    /// Mount a persistent cache directory at `target`
    #[must_use]
    pub fn cache(target: impl Into<String>, id: impl Into<String>, sharing: CacheSharing) -> Self {
        Self {
            target: target.into(),
            source: MountSource::Cache {
                id: id.into(),
                sharing,
            },
            readonly: false,
        }
    }
}

/// Base filesystem from a container image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOp {
    /// Normalized image reference
    pub reference: String,
    /// Resolved image configuration
    pub config: ImageConfig,
    /// Label shown in progress output
    pub display_name: String,
}

/// A command run against a root filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOp {
    /// Command line; the first entry is the executable
    pub args: Vec<String>,
    /// `KEY=value` environment entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Working directory
    pub cwd: String,
    /// User to run as, defaulting to the image's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Label shown in progress output
    pub display_name: String,
    /// Never reuse a cached result for this operation
    #[serde(default)]
    pub ignore_cache: bool,
    /// Mounts in order; the `/` mount is the root filesystem and the output
    pub mounts: Vec<Mount>,
}

impl ExecOp {
    /// The root (`/`) mount, if any
    #[must_use]
    pub fn root(&self) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.target == "/")
    }
}

/// Layered union of several filesystems
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOp {
    /// Layers, lowest first
    pub inputs: Vec<NodeId>,
    /// Label shown in progress output
    pub display_name: String,
}

/// A graph operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum Op {
    /// Image base filesystem
    Image(ImageOp),
    /// Command execution
    Exec(ExecOp),
    /// Filesystem union
    Merge(MergeOp),
}

impl Op {
    /// Nodes this operation reads from, in mount order
    #[must_use]
    pub fn inputs(&self) -> Vec<NodeId> {
        match self {
            Self::Image(_) => Vec::new(),
            Self::Exec(exec) => exec
                .mounts
                .iter()
                .filter_map(|m| match &m.source {
                    MountSource::Node { node, .. } => Some(*node),
                    MountSource::Cache { .. } => None,
                })
                .collect(),
            Self::Merge(merge) => merge.inputs.clone(),
        }
    }

    /// Human readable name for progress output
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Image(op) => &op.display_name,
            Self::Exec(op) => &op.display_name,
            Self::Merge(op) => &op.display_name,
        }
    }
}

/// One entry in the arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Position in the arena
    pub id: NodeId,
    /// Content digest over the operation and its inputs' digests
    pub digest: String,
    /// The operation
    #[serde(flatten)]
    pub op: Op,
}

/// Append-only arena of graph nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definition {
    nodes: Vec<Node>,
}

impl Definition {
    /// Create an empty definition
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation and return its id.
    ///
    /// Fails with [`Error::UnknownNode`] when the operation references a node
    /// that has not been added yet.
    pub fn push(&mut self, op: Op) -> Result<NodeId> {
        let digest = self.digest_op(&op)?;
        let id = NodeId(self.nodes.len());
        trace!(%id, %digest, name = op.display_name(), "Added graph node");
        self.nodes.push(Node { id, digest, op });
        Ok(id)
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or(Error::UnknownNode { node: id.0 })
    }

    /// All nodes in arena order
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of every node `output` transitively depends on, plus `output`
    pub fn reachable_from(&self, output: NodeId) -> Result<BTreeSet<NodeId>> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![output];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            stack.extend(self.node(id)?.op.inputs());
        }
        Ok(seen)
    }

    /// Serialize the subgraph that produces `output`.
    ///
    /// Nodes that do not contribute to `output` are left out.
    pub fn marshal(&self, output: NodeId) -> Result<MarshalledDefinition> {
        let reachable = self.reachable_from(output)?;
        let nodes = self
            .nodes
            .iter()
            .filter(|n| reachable.contains(&n.id))
            .cloned()
            .collect();
        Ok(MarshalledDefinition {
            version: DEFINITION_VERSION.to_string(),
            output,
            output_digest: self.node(output)?.digest.clone(),
            nodes,
        })
    }

    fn digest_op(&self, op: &Op) -> Result<String> {
        let input_digest = |id: NodeId| self.node(id).map(|n| n.digest.as_str());

        let digest = match op {
            Op::Image(image) => {
                let mut b = DigestBuilder::new("image");
                b.add_str(&image.reference)
                    .add_opt(image.config.digest.as_deref())
                    .add_list(&image.config.env)
                    .add_opt(image.config.working_dir.as_deref())
                    .add_opt(image.config.user.as_deref());
                b.finalize()
            }
            Op::Exec(exec) => {
                let mut b = DigestBuilder::new("exec");
                b.add_list(&exec.args)
                    .add_list(&exec.env)
                    .add_str(&exec.cwd)
                    .add_opt(exec.user.as_deref())
                    .add_bool(exec.ignore_cache);
                for mount in &exec.mounts {
                    b.add_str(&mount.target).add_bool(mount.readonly);
                    match &mount.source {
                        MountSource::Node { node, selector } => {
                            b.add_str("node").add_str(input_digest(*node)?).add_str(selector);
                        }
                        MountSource::Cache { id, sharing } => {
                            b.add_str("cache").add_str(id).add_str(sharing.as_str());
                        }
                    }
                }
                b.finalize()
            }
            Op::Merge(merge) => {
                let mut b = DigestBuilder::new("merge");
                for input in &merge.inputs {
                    b.add_str(input_digest(*input)?);
                }
                b.finalize()
            }
        };
        Ok(digest)
    }
}

/// Serializable form of a definition handed to the solver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarshalledDefinition {
    /// Format version
    pub version: String,
    /// Node whose filesystem is the build result
    pub output: NodeId,
    /// Digest of the output node
    pub output_digest: String,
    /// Contributing nodes in dependency order
    pub nodes: Vec<Node>,
}

impl MarshalledDefinition {
    /// Pretty JSON rendering
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::serialization(e.to_string()))
    }
}
