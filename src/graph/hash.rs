//! Graph fingerprinting (spec §4.B): a stable hash over the sorted node and edge facts so
//! that two graphs built from the same logical data always compare equal, independent of
//! fetch order.

use crate::model::{DependencyEdge, EdgeStrategy, GraphHash, Node, StrategyParameters};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub fn compute_graph_hash(
    nodes: &[Node],
    edges: &[DependencyEdge],
    edge_strategies: &[EdgeStrategy],
) -> GraphHash {
    let mut hasher = DefaultHasher::new();

    let mut node_facts: Vec<(String, String, bool)> = nodes
        .iter()
        .map(|n| (n.id.as_str().to_owned(), n.node_type.to_string(), n.platform_flag))
        .collect();
    node_facts.sort();
    node_facts.hash(&mut hasher);

    let mut strategies_by_edge: std::collections::HashMap<String, Vec<(String, Vec<(String, String)>)>> =
        std::collections::HashMap::new();
    for s in edge_strategies {
        strategies_by_edge
            .entry(s.edge_id.as_str().to_owned())
            .or_default()
            .push((s.dimension.as_str().to_owned(), s.strategy.sorted_parameters()));
    }
    for per_edge in strategies_by_edge.values_mut() {
        per_edge.sort();
    }

    let mut edge_facts: Vec<(
        String,
        String,
        String,
        Option<String>,
        String,
        Vec<(String, String)>,
        Vec<(String, Vec<(String, String)>)>,
    )> = edges
        .iter()
        .map(|e| {
            let overrides = strategies_by_edge
                .get(e.id.as_str())
                .cloned()
                .unwrap_or_default();
            (
                e.parent.as_str().to_owned(),
                e.child.as_str().to_owned(),
                e.active_from.to_string(),
                e.active_to.map(|d| d.to_string()),
                e.default_strategy.kind().to_string(),
                e.default_strategy.sorted_parameters(),
                overrides,
            )
        })
        .collect();
    edge_facts.sort();
    edge_facts.hash(&mut hasher);

    GraphHash(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AllocationStrategy, EdgeId, EqualStrategy, NodeId, NodeType};
    use indexmap::IndexMap;
    use time::macros::date;

    fn node(id: &str) -> Node {
        Node {
            id: NodeId::from(id),
            name: id.to_owned(),
            node_type: NodeType::Product,
            platform_flag: false,
            cost_labels: IndexMap::new(),
            metadata: serde_json::Value::Null,
            archived_at: None,
        }
    }

    fn edge(id: &str, parent: &str, child: &str) -> DependencyEdge {
        DependencyEdge {
            id: EdgeId::from(id),
            parent: NodeId::from(parent),
            child: NodeId::from(child),
            default_strategy: AllocationStrategy::Equal(EqualStrategy),
            active_from: date!(2024 - 01 - 01),
            active_to: None,
        }
    }

    #[test]
    fn hash_is_independent_of_input_order() {
        let nodes_a = vec![node("a"), node("b")];
        let nodes_b = vec![node("b"), node("a")];
        let edges = vec![edge("e1", "a", "b")];
        let h1 = compute_graph_hash(&nodes_a, &edges, &[]);
        let h2 = compute_graph_hash(&nodes_b, &edges, &[]);
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_changes_when_an_edge_window_changes() {
        let nodes = vec![node("a"), node("b")];
        let edges_a = vec![edge("e1", "a", "b")];
        let mut edges_b = edges_a.clone();
        edges_b[0].active_to = Some(date!(2024 - 06 - 01));
        let h1 = compute_graph_hash(&nodes, &edges_a, &[]);
        let h2 = compute_graph_hash(&nodes, &edges_b, &[]);
        assert_ne!(h1, h2);
    }
}
