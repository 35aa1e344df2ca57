//! Per-edge weight resolution (spec §4.D strategy weight table).

use crate::model::{AllocationStrategy, NodeId};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// The weight an edge contributes toward its parent's share, plus the metric name if a
/// `proportional_on` lookup missed (used to attribute a later fallback warning to a metric).
pub(super) struct EdgeWeight {
    pub amount: Decimal,
    pub missing_metric: Option<String>,
}

/// Usage observations for one date, indexed by `(node, metric)`.
pub(super) type UsageIndex = HashMap<(NodeId, String), Decimal>;

pub(super) fn build_usage_index(usage: &[crate::model::UsageMetric]) -> UsageIndex {
    usage
        .iter()
        .map(|u| ((u.node.clone(), u.metric.clone()), u.value))
        .collect()
}

/// Resolves the weight a single edge contributes for `parent`, given the strategy in effect
/// on that edge for the dimension being allocated.
pub(super) fn edge_weight(
    strategy: &AllocationStrategy,
    parent: &NodeId,
    usage_index: &UsageIndex,
) -> EdgeWeight {
    match strategy {
        AllocationStrategy::Equal(_) => EdgeWeight {
            amount: Decimal::ONE,
            missing_metric: None,
        },
        AllocationStrategy::ProportionalOn(p) => {
            match usage_index.get(&(parent.clone(), p.metric.clone())) {
                Some(&value) => EdgeWeight {
                    amount: value,
                    missing_metric: None,
                },
                None => EdgeWeight {
                    amount: Decimal::ZERO,
                    missing_metric: Some(p.metric.clone()),
                },
            }
        }
        AllocationStrategy::Weighted(w) => EdgeWeight {
            amount: w.weight,
            missing_metric: None,
        },
    }
}
