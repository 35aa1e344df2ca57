//! The in-memory graph snapshot the allocation engine walks: a `petgraph::DiGraph` whose
//! edges point child→parent (the cost-flow direction, spec §9), with nodes owned for the
//! snapshot's lifetime and read only by workers (the "arena-style ownership" of spec §9).

use crate::model::{AllocationStrategy, DependencyEdge, Dimension, GraphHash, Node, NodeId};
use indexmap::{IndexMap, IndexSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

#[derive(Debug, Clone)]
pub(crate) struct NodeView {
    pub node: Node,
}

#[derive(Debug, Clone)]
pub(crate) struct EdgeView {
    pub edge: DependencyEdge,
    pub per_dimension: IndexMap<Dimension, AllocationStrategy>,
}

impl EdgeView {
    /// Resolves the strategy for `dimension` on this edge: the per-dimension override if one
    /// exists, else the edge's default (spec §4.C).
    pub fn strategy_for(&self, dimension: &Dimension) -> &AllocationStrategy {
        crate::strategy::resolve(&self.edge, &self.per_dimension, dimension)
    }
}

/// The DAG active on a reference date, with cached classifications and a deterministic
/// topological order (spec §4.B).
pub struct GraphSnapshot {
    pub(crate) graph: DiGraph<NodeView, EdgeView>,
    pub(crate) index_of: IndexMap<NodeId, NodeIndex>,
    /// Child-before-parent order over the cost-flow direction; ties broken by ascending
    /// node id.
    pub(crate) topo_order: Vec<NodeIndex>,
    pub(crate) infrastructure_nodes: IndexSet<NodeId>,
    pub(crate) product_nodes: IndexSet<NodeId>,
    pub(crate) final_cost_centres: IndexSet<NodeId>,
    pub graph_hash: GraphHash,
}

impl GraphSnapshot {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.index_of.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index_of
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
            .map(|view| &view.node)
    }

    /// Node ids in child-before-parent topological order.
    pub fn topological_order(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.topo_order.iter().map(move |&idx| &self.graph[idx].node.id)
    }

    /// The parents a given child contributes to (spec §4.B forward-adjacency).
    pub(crate) fn parents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &EdgeView)> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge_ref| (edge_ref.target(), edge_ref.weight()))
            .collect()
    }

    /// The children contributing into a given parent (spec §4.B reverse-adjacency).
    pub(crate) fn children_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect()
    }

    pub(crate) fn index(&self, id: &NodeId) -> Option<NodeIndex> {
        self.index_of.get(id).copied()
    }

    pub fn is_infrastructure(&self, id: &NodeId) -> bool {
        self.infrastructure_nodes.contains(id)
    }

    pub fn is_product(&self, id: &NodeId) -> bool {
        self.product_nodes.contains(id)
    }

    pub fn is_final_cost_centre(&self, id: &NodeId) -> bool {
        self.final_cost_centres.contains(id)
    }

    pub fn infrastructure_node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.infrastructure_nodes.iter()
    }

    pub fn final_cost_centre_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.final_cost_centres.iter()
    }

    /// Longest child→parent chain length in the snapshot, used for the read model's graph
    /// statistics (spec §4.G).
    pub fn max_depth(&self) -> usize {
        let mut depth: IndexMap<NodeIndex, usize> = IndexMap::new();
        for &idx in &self.topo_order {
            let children_depth = self
                .children_of(idx)
                .into_iter()
                .map(|c| depth.get(&c).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            depth.insert(idx, children_depth + 1);
        }
        depth.values().copied().max().unwrap_or(0)
    }
}
