//! Node registry snapshot built from an external inventory

use std::collections::HashMap;

use async_trait::async_trait;

use super::types::{Node, Selection};
use crate::Result;

/// External source of managed nodes
#[async_trait]
pub trait NodeInventory: Send + Sync {
    /// Ids of every node currently reachable by the job provider
    async fn list_managed_node_ids(&self) -> Result<Vec<String>>;

    /// Resolve ids to labelled nodes; nodes without a display label are dropped
    async fn describe_nodes(&self, ids: &[String]) -> Result<Vec<Node>>;
}

/// Read-only snapshot of the fleet, sorted by name
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
    by_id: HashMap<String, usize>,
}

impl NodeRegistry {
    /// Build a registry from already-resolved nodes
    #[must_use]
    pub fn from_nodes(mut nodes: Vec<Node>) -> Self {
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        let by_id = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Self { nodes, by_id }
    }

    /// Query the inventory once and snapshot the result
    ///
    /// # Errors
    ///
    /// Returns error if either inventory call fails
    pub async fn discover(inventory: &dyn NodeInventory) -> Result<Self> {
        let ids = inventory.list_managed_node_ids().await?;
        tracing::debug!(count = ids.len(), "managed node ids listed");

        if ids.is_empty() {
            return Ok(Self::default());
        }

        let nodes = inventory.describe_nodes(&ids).await?;
        tracing::info!(count = nodes.len(), "fleet nodes resolved");
        Ok(Self::from_nodes(nodes))
    }

    /// Get a node by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    /// All nodes, sorted by name
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Select nodes whose name appears in `names`, in registry order
    ///
    /// Names that match nothing are logged and skipped
    #[must_use]
    pub fn select_by_names(&self, names: &[String]) -> Selection {
        for name in names {
            if !self.nodes.iter().any(|n| &n.name == name) {
                tracing::warn!(name = %name, "no node with this name");
            }
        }

        Selection::new(
            self.nodes
                .iter()
                .filter(|n| names.contains(&n.name))
                .map(|n| n.id.clone()),
        )
    }

    /// Number of known nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeRegistry {
        NodeRegistry::from_nodes(vec![
            Node::new("web-2", "i-2"),
            Node::new("api", "i-3"),
            Node::new("web-1", "i-1"),
        ])
    }

    #[test]
    fn sorted_by_name() {
        let reg = sample();
        let names: Vec<_> = reg.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["api", "web-1", "web-2"]);
    }

    #[test]
    fn get_by_id() {
        let reg = sample();
        assert_eq!(reg.get("i-2").map(|n| n.name.as_str()), Some("web-2"));
        assert!(reg.get("i-9").is_none());
    }

    #[test]
    fn select_by_names_skips_unknown() {
        let reg = sample();
        let sel = reg.select_by_names(&["web-2".into(), "nope".into(), "api".into()]);
        assert_eq!(sel.ids(), ["i-3", "i-2"]);
    }

    struct FixedInventory;

    #[async_trait]
    impl NodeInventory for FixedInventory {
        async fn list_managed_node_ids(&self) -> Result<Vec<String>> {
            Ok(vec!["i-1".into(), "i-2".into()])
        }

        async fn describe_nodes(&self, ids: &[String]) -> Result<Vec<Node>> {
            // i-2 has no label and is dropped
            Ok(ids
                .iter()
                .filter(|id| *id == "i-1")
                .map(|id| Node::new("only", id.clone()))
                .collect())
        }
    }

    #[test]
    fn discover_snapshots_inventory() {
        let reg = tokio_test::assert_ok!(tokio_test::block_on(NodeRegistry::discover(
            &FixedInventory
        )));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("i-1").unwrap().name, "only");
    }
}
