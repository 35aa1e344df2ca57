//! Read Model (spec §4.G): derives the product hierarchy, infrastructure hierarchy and
//! reconciliation report from a completed run's allocation/contribution rows. Every
//! computation here is a pure fold over already-queried rows — no storage access of its own.

use crate::config::EngineConfig;
use crate::graph::GraphSnapshot;
use crate::model::{AllocationResult, ContributionResult, InvariantViolation, NodeId};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;

/// One child's contribution into a product or infrastructure node, for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChildContribution {
    pub child: NodeId,
    pub amount: Decimal,
}

/// A product node's cost breakdown (spec §4.G).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductHierarchyEntry {
    pub node: NodeId,
    pub direct_cost: Decimal,
    pub holistic_cost: Decimal,
    /// The subset of `holistic_cost - direct_cost` contributed by shared/platform children.
    pub shared_service_cost: Decimal,
    pub children: Vec<ChildContribution>,
}

/// An infrastructure node's cost breakdown, symmetric to [`ProductHierarchyEntry`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InfrastructureHierarchyEntry {
    pub node: NodeId,
    pub direct_cost: Decimal,
    pub allocated_out: Decimal,
    pub unallocated: Decimal,
}

/// The reconciliation report served by `reconciliation(window)` (spec §4.G, §6).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub raw_infrastructure_cost: Decimal,
    pub allocated_product_cost: Decimal,
    pub unallocated: Decimal,
    pub coverage_percent: Decimal,
    pub conservation_delta: Decimal,
    pub conservation_valid: bool,
    pub final_cost_centres: Vec<(NodeId, Decimal)>,
    pub infrastructure_nodes: Vec<(NodeId, Decimal)>,
    pub violations: Vec<InvariantViolation>,
    pub node_count: usize,
    pub edge_count: usize,
    pub max_depth: usize,
}

/// Builds the product hierarchy view: for every product node with at least one allocation
/// row, its direct/holistic/shared-service costs and the children that contributed to it.
///
/// "Shared service cost" is computed by re-walking `contributions` and tagging each row by
/// whether its immediate child is a shared/platform node, rather than trusting a
/// denormalised per-row tag — see `DESIGN.md`.
pub fn product_hierarchy(
    snapshot: &GraphSnapshot,
    allocations: &[AllocationResult],
    contributions: &[ContributionResult],
) -> Vec<ProductHierarchyEntry> {
    let mut direct: IndexMap<NodeId, Decimal> = IndexMap::new();
    let mut holistic: IndexMap<NodeId, Decimal> = IndexMap::new();
    for row in allocations {
        if !snapshot.is_product(&row.node) {
            continue;
        }
        *direct.entry(row.node.clone()).or_insert(Decimal::ZERO) += row.direct_amount;
        *holistic.entry(row.node.clone()).or_insert(Decimal::ZERO) += row.total_amount();
    }

    let mut children: IndexMap<NodeId, Vec<ChildContribution>> = IndexMap::new();
    let mut shared_service: IndexMap<NodeId, Decimal> = IndexMap::new();
    for row in contributions {
        if !snapshot.is_product(&row.parent) {
            continue;
        }
        let entry = children.entry(row.parent.clone()).or_default();
        if let Some(existing) = entry.iter_mut().find(|c| c.child == row.child) {
            existing.amount += row.amount;
        } else {
            entry.push(ChildContribution {
                child: row.child.clone(),
                amount: row.amount,
            });
        }
        if is_shared_or_platform(snapshot, &row.child) {
            *shared_service.entry(row.parent.clone()).or_insert(Decimal::ZERO) += row.amount;
        }
    }

    direct
        .keys()
        .cloned()
        .collect::<indexmap::IndexSet<_>>()
        .into_iter()
        .map(|node| ProductHierarchyEntry {
            direct_cost: direct.get(&node).copied().unwrap_or(Decimal::ZERO),
            holistic_cost: holistic.get(&node).copied().unwrap_or(Decimal::ZERO),
            shared_service_cost: shared_service.get(&node).copied().unwrap_or(Decimal::ZERO),
            children: children.get(&node).cloned().unwrap_or_default(),
            node,
        })
        .collect()
}

fn is_shared_or_platform(snapshot: &GraphSnapshot, node: &NodeId) -> bool {
    snapshot
        .node(node)
        .is_some_and(|n| matches!(n.node_type, crate::model::NodeType::Shared | crate::model::NodeType::Platform) || n.platform_flag)
}

/// Builds the infrastructure hierarchy view, symmetric to [`product_hierarchy`].
pub fn infrastructure_hierarchy(
    snapshot: &GraphSnapshot,
    allocations: &[AllocationResult],
    contributions: &[ContributionResult],
) -> Vec<InfrastructureHierarchyEntry> {
    let mut direct: IndexMap<NodeId, Decimal> = IndexMap::new();
    for row in allocations {
        if !snapshot.is_infrastructure(&row.node) {
            continue;
        }
        *direct.entry(row.node.clone()).or_insert(Decimal::ZERO) += row.direct_amount;
    }

    let mut allocated_out: IndexMap<NodeId, Decimal> = IndexMap::new();
    for row in contributions {
        if !snapshot.is_infrastructure(&row.child) {
            continue;
        }
        *allocated_out.entry(row.child.clone()).or_insert(Decimal::ZERO) += row.amount;
    }

    direct
        .into_iter()
        .map(|(node, direct_cost)| {
            let out = allocated_out.get(&node).copied().unwrap_or(Decimal::ZERO);
            InfrastructureHierarchyEntry {
                node,
                direct_cost,
                allocated_out: out,
                unallocated: direct_cost - out,
            }
        })
        .collect()
}

/// Builds the reconciliation report (spec §4.G). `violations` is the set already recorded by
/// the Conservation Checker for the queried run.
pub fn reconciliation_report(
    snapshot: &GraphSnapshot,
    allocations: &[AllocationResult],
    violations: Vec<InvariantViolation>,
    config: &EngineConfig,
) -> ReconciliationReport {
    let raw_infrastructure_cost: Decimal = allocations
        .iter()
        .filter(|a| snapshot.is_infrastructure(&a.node))
        .map(|a| a.direct_amount)
        .sum();
    let allocated_product_cost: Decimal = allocations
        .iter()
        .filter(|a| snapshot.is_final_cost_centre(&a.node))
        .map(|a| a.total_amount())
        .sum();
    let raw_total: Decimal = allocations.iter().map(|a| a.direct_amount).sum();
    let terminal_total: Decimal = allocations
        .iter()
        .filter(|a| {
            snapshot
                .index(&a.node)
                .is_some_and(|idx| snapshot.parents_of(idx).is_empty())
        })
        .map(|a| a.total_amount())
        .sum();

    let conservation_delta = raw_total - terminal_total;
    let conservation_valid = conservation_delta.abs() <= config.tolerance_for(raw_total);

    let coverage_percent = if raw_infrastructure_cost.is_zero() {
        Decimal::ZERO
    } else {
        (allocated_product_cost / raw_infrastructure_cost * Decimal::from(100))
            .clamp(Decimal::ZERO, Decimal::from(100))
    };

    let final_cost_centres = allocations
        .iter()
        .filter(|a| snapshot.is_final_cost_centre(&a.node))
        .map(|a| (a.node.clone(), a.total_amount()))
        .collect();
    let infrastructure_nodes = allocations
        .iter()
        .filter(|a| snapshot.is_infrastructure(&a.node))
        .map(|a| (a.node.clone(), a.direct_amount))
        .collect();

    ReconciliationReport {
        raw_infrastructure_cost,
        allocated_product_cost,
        unallocated: terminal_total - allocated_product_cost,
        coverage_percent,
        conservation_delta,
        conservation_valid,
        final_cost_centres,
        infrastructure_nodes,
        violations,
        node_count: snapshot.node_count(),
        edge_count: snapshot.edge_count(),
        max_depth: snapshot.max_depth(),
    }
}
