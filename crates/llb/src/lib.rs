//! Execution graph model for tektonic.
//!
//! The compiler lowers Tekton steps into a [`Definition`]: an append-only arena
//! of image, exec and merge operations wired together with mounts. Each node
//! carries a content digest so the external engine can cache by identity.
//!
//! # Key Types
//!
//! - [`ImageReference`]: normalized container image reference
//! - [`Definition`]: the node arena, built bottom-up
//! - [`Op`]: image, exec or merge operation
//! - [`MarshalledDefinition`]: the serializable subgraph producing one output

mod definition;
mod digest;
mod error;
mod reference;

pub use definition::{
    CacheSharing, DEFINITION_VERSION, Definition, ExecOp, ImageConfig, ImageOp,
    MarshalledDefinition, MergeOp, Mount, MountSource, Node, NodeId, Op,
};
pub use digest::DigestBuilder;
pub use error::{Error, Result};
pub use reference::{DEFAULT_DOMAIN, ImageReference};
