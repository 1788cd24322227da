//! Fleet node inventory and selection
//!
//! Nodes are resolved once at startup from a [`NodeInventory`] into a
//! read-only [`NodeRegistry`] snapshot that the rest of the pipeline borrows

pub mod registry;
pub mod types;

pub use registry::{NodeInventory, NodeRegistry};
pub use types::{Node, Selection};
