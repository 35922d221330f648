//! Traversal types for task graphs.

use crate::GraphNode;

/// A topologically sorted sequence of task nodes.
///
/// This type represents tasks in an order where all dependencies
/// come before the tasks that depend on them. Among tasks with no ordering
/// constraint between them, the one added to the graph first comes first.
pub type TopologicalOrder<T> = Vec<GraphNode<T>>;
