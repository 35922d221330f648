//! Task graph DAG ordering for tektonic pipelines.
//!
//! This crate provides a directed acyclic graph (DAG) of named tasks built on
//! petgraph, with a topological order that is stable with respect to the order
//! tasks were added.
//!
//! # Key Types
//!
//! - [`TaskGraph`]: The main graph structure for building and querying task dependencies
//! - [`TaskNodeData`]: Trait that task types must implement to be stored in the graph
//! - [`GraphNode`]: A node in the graph containing the task name and data
//!
//! # Example
//!
//! ```ignore
//! use tektonic_task_graph::{TaskGraph, TaskNodeData};
//!
//! struct PipelineTask {
//!     run_after: Vec<String>,
//! }
//!
//! impl TaskNodeData for PipelineTask {
//!     fn dependency_names(&self) -> impl Iterator<Item = &str> {
//!         self.run_after.iter().map(String::as_str)
//!     }
//! }
//!
//! let mut graph = TaskGraph::new();
//! graph.add_task("fetch", PipelineTask { run_after: vec![] })?;
//! graph.add_task("build", PipelineTask { run_after: vec!["fetch".to_string()] })?;
//! graph.add_dependency_edges()?;
//!
//! let sorted = graph.topological_sort()?;
//! ```

mod error;
mod graph;
mod traversal;

pub use error::{Error, Result};
pub use graph::{GraphNode, TaskGraph};
pub use traversal::TopologicalOrder;

/// Trait for task data that can be stored in the task graph.
///
/// Implement this trait for your task type to enable it to be stored
/// in a [`TaskGraph`] and participate in dependency resolution.
pub trait TaskNodeData: Clone {
    /// Returns the names of tasks this task must run after.
    fn dependency_names(&self) -> impl Iterator<Item = &str>;
}
