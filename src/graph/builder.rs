//! Materialises the DAG active on a reference date (spec §4.B).

use super::hash::compute_graph_hash;
use super::snapshot::{EdgeView, GraphSnapshot, NodeView};
use crate::error::{EngineError, EngineErrorKind};
use crate::model::{DependencyEdge, EdgeStrategy, Node, NodeId};
use indexmap::{IndexMap, IndexSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::BinaryHeap;
use time::Date;

/// Stateless: builds one [`GraphSnapshot`] per call from nodes/edges/strategies already
/// fetched for a reference date by the persistence port.
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the snapshot active on `date` from the given nodes, edges and per-dimension
    /// strategy overrides. `nodes` and `edges` need not be pre-filtered by `date` or archive
    /// status — the builder applies both filters itself.
    pub fn build(
        &self,
        date: Date,
        nodes: &[Node],
        edges: &[DependencyEdge],
        edge_strategies: &[EdgeStrategy],
    ) -> Result<GraphSnapshot, EngineError> {
        let active_nodes: Vec<&Node> = nodes.iter().filter(|n| !n.is_archived()).collect();
        let active_edges: Vec<&DependencyEdge> =
            edges.iter().filter(|e| e.is_active_on(date)).collect();

        let graph_hash = compute_graph_hash(
            &active_nodes.iter().map(|&n| n.clone()).collect::<Vec<_>>(),
            &active_edges.iter().map(|&e| e.clone()).collect::<Vec<_>>(),
            edge_strategies,
        );

        let mut sorted_nodes = active_nodes;
        sorted_nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut graph: DiGraph<NodeView, EdgeView> = DiGraph::new();
        let mut index_of: IndexMap<NodeId, NodeIndex> = IndexMap::new();
        let mut infrastructure_nodes: IndexSet<NodeId> = IndexSet::new();
        let mut product_nodes: IndexSet<NodeId> = IndexSet::new();

        for node in &sorted_nodes {
            let idx = graph.add_node(NodeView { node: (*node).clone() });
            index_of.insert(node.id.clone(), idx);
            if node.is_infrastructure() {
                infrastructure_nodes.insert(node.id.clone());
            }
            if node.is_product() {
                product_nodes.insert(node.id.clone());
            }
        }

        let mut per_dimension_by_edge: IndexMap<&str, IndexMap<crate::model::Dimension, crate::model::AllocationStrategy>> =
            IndexMap::new();
        for s in edge_strategies {
            per_dimension_by_edge
                .entry(s.edge_id.as_str())
                .or_default()
                .insert(s.dimension.clone(), s.strategy.clone());
        }

        for edge in &active_edges {
            let (Some(&child_idx), Some(&parent_idx)) =
                (index_of.get(&edge.child), index_of.get(&edge.parent))
            else {
                // Edge touches an archived or unknown node; it contributes no flow.
                continue;
            };
            let per_dimension = per_dimension_by_edge
                .get(edge.id.as_str())
                .cloned()
                .unwrap_or_default();
            graph.add_edge(
                child_idx,
                parent_idx,
                EdgeView {
                    edge: (*edge).clone(),
                    per_dimension,
                },
            );
        }

        let topo_order = kahn_topological_order(&graph)?;

        let mut final_cost_centres: IndexSet<NodeId> = IndexSet::new();
        for id in &product_nodes {
            let idx = index_of[id];
            let rolls_into_another_product = graph
                .neighbors_directed(idx, petgraph::Direction::Outgoing)
                .any(|parent_idx| product_nodes.contains(&graph[parent_idx].node.id));
            if !rolls_into_another_product {
                final_cost_centres.insert(id.clone());
            }
        }

        Ok(GraphSnapshot {
            graph,
            index_of,
            topo_order,
            infrastructure_nodes,
            product_nodes,
            final_cost_centres,
            graph_hash,
        })
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Kahn's algorithm over the child→parent direction, breaking ties by ascending node id
/// (spec §4.B). Returns `GraphCycle` naming every node left with unresolved in-degree.
fn kahn_topological_order(
    graph: &DiGraph<NodeView, EdgeView>,
) -> Result<Vec<NodeIndex>, EngineError> {
    use std::cmp::Reverse;

    let mut in_degree: IndexMap<NodeIndex, usize> = IndexMap::new();
    for idx in graph.node_indices() {
        in_degree.insert(idx, graph.edges_directed(idx, petgraph::Direction::Incoming).count());
    }

    let mut ready: BinaryHeap<Reverse<(NodeId, NodeIndex)>> = BinaryHeap::new();
    for (&idx, &degree) in in_degree.iter() {
        if degree == 0 {
            ready.push(Reverse((graph[idx].node.id.clone(), idx)));
        }
    }

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((_, idx))) = ready.pop() {
        order.push(idx);
        for edge_ref in graph.edges_directed(idx, petgraph::Direction::Outgoing) {
            let parent = edge_ref.target();
            let degree = in_degree.get_mut(&parent).expect("node present");
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse((graph[parent].node.id.clone(), parent)));
            }
        }
    }

    if order.len() != graph.node_count() {
        let remaining: Vec<NodeId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree > 0)
            .map(|(&idx, _)| graph[idx].node.id.clone())
            .collect();
        return Err(EngineErrorKind::GraphCycle(remaining).into());
    }

    Ok(order)
}
