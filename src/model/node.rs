use super::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The kind of business or infrastructure entity a node represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Product,
    Platform,
    Shared,
    Resource,
    Infrastructure,
}

impl NodeType {
    /// Node types that the Graph Builder classifies as infrastructure regardless of the
    /// `platform_flag` override (§4.B).
    pub fn is_infrastructure_by_type(self) -> bool {
        matches!(
            self,
            NodeType::Platform | NodeType::Shared | NodeType::Resource | NodeType::Infrastructure
        )
    }
}

/// A node in the dependency graph: a product, a platform/shared service, or a leaf
/// infrastructure resource.
///
/// Archived nodes (`archived_at.is_some()`) are ignored by the Graph Builder and the read
/// model — see the invariant in spec §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub platform_flag: bool,
    pub cost_labels: IndexMap<String, String>,
    pub metadata: serde_json::Value,
    pub archived_at: Option<OffsetDateTime>,
}

impl Node {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Whether the Graph Builder classifies this node as infrastructure (§4.B): its type is
    /// one of the inherently-infrastructure kinds, or the `platform_flag` override is set.
    pub fn is_infrastructure(&self) -> bool {
        self.node_type.is_infrastructure_by_type() || self.platform_flag
    }

    pub fn is_product(&self) -> bool {
        self.node_type == NodeType::Product
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(node_type: NodeType, platform_flag: bool) -> Node {
        Node {
            id: NodeId::from("n"),
            name: "n".to_owned(),
            node_type,
            platform_flag,
            cost_labels: IndexMap::new(),
            metadata: serde_json::Value::Null,
            archived_at: None,
        }
    }

    #[test]
    fn platform_flag_promotes_a_product_to_infrastructure() {
        let n = node(NodeType::Product, true);
        assert!(n.is_infrastructure());
    }

    #[test]
    fn plain_product_is_not_infrastructure() {
        let n = node(NodeType::Product, false);
        assert!(!n.is_infrastructure());
        assert!(n.is_product());
    }

    #[test]
    fn resource_is_always_infrastructure() {
        let n = node(NodeType::Resource, false);
        assert!(n.is_infrastructure());
        assert!(!n.is_product());
    }
}
