//! Allocation Engine (spec §4.D): the core per-`(date, dimension)` propagation algorithm.
//!
//! `allocate_unit` is pure and does no I/O — the Run Coordinator is the only thing that knows
//! about threads or storage. This separation mirrors the teacher's split between pure graph
//! algorithms and the orchestration layer that calls them.

use super::weights::{build_usage_index, edge_weight};
use crate::config::{EngineConfig, MissingUsagePolicy};
use crate::decimal::{checked_add, largest_remainder_split};
use crate::error::{EngineErrorKind, EngineResult};
use crate::graph::GraphSnapshot;
use crate::model::{
    AllocationResult, ContributionResult, Dimension, Money, NodeId, RawCost, RunId, RunWarning,
    UsageMetric,
};
use rust_decimal::Decimal;
use time::Date;
use tracing::instrument;

/// The result of allocating one `(date, dimension)` unit of work.
#[derive(Debug, Default)]
pub struct UnitResult {
    pub allocations: Vec<AllocationResult>,
    pub contributions: Vec<ContributionResult>,
    pub warnings: Vec<RunWarning>,
}

/// Propagates `raw_costs` (already filtered to `date`/`dimension`) up through `snapshot` in
/// topological order, producing one [`AllocationResult`] per node with nonzero total and one
/// [`ContributionResult`] per edge traversed (spec §4.D).
#[instrument(skip(snapshot, raw_costs, usage_metrics, config), fields(%run_id, %date, %dimension, node_count = snapshot.node_count()))]
pub fn allocate_unit(
    snapshot: &GraphSnapshot,
    run_id: &RunId,
    date: Date,
    dimension: &Dimension,
    raw_costs: &[RawCost],
    usage_metrics: &[UsageMetric],
    config: &EngineConfig,
) -> EngineResult<UnitResult> {
    let n = snapshot.graph.node_count();
    let mut direct = vec![Decimal::ZERO; n];
    let mut indirect = vec![Decimal::ZERO; n];
    let mut working = vec![Decimal::ZERO; n];
    let mut paths: Vec<Option<Vec<NodeId>>> = vec![None; n];

    // Every raw cost feeding this unit must agree on currency; a silent cross-currency sum
    // is rejected as `MixedCurrency` instead.
    let mut currency_total: Option<Money> = None;
    for cost in raw_costs {
        if cost.amount.is_sign_negative() && !cost.amount.is_zero() {
            return Err(EngineErrorKind::NegativeInput {
                node: cost.node.clone(),
                dimension: dimension.clone(),
            }
            .into());
        }
        currency_total = Some(match currency_total {
            None => cost.money(),
            Some(running) => running.checked_add(&cost.money())?,
        });

        let Some(idx) = snapshot.index(&cost.node) else {
            continue;
        };
        let i = idx.index();
        direct[i] = checked_add(direct[i], cost.amount)?;
        working[i] = checked_add(working[i], cost.amount)?;
    }

    let usage_index = build_usage_index(usage_metrics);
    let mut warnings = Vec::new();
    let mut contributions = Vec::new();

    let topo_order = snapshot.topo_order.clone();
    for idx in topo_order {
        let i = idx.index();
        if working[i].is_zero() {
            continue;
        }

        let mut parents = snapshot.parents_of(idx);
        parents.sort_by(|(_, a), (_, b)| a.edge.parent.cmp(&b.edge.parent));
        if parents.is_empty() {
            continue;
        }

        let mut raw_weights = Vec::with_capacity(parents.len());
        let mut missing_metric: Option<String> = None;
        for (parent_idx, edge_view) in &parents {
            let strategy = edge_view.strategy_for(dimension);
            let parent_id = &snapshot.graph[*parent_idx].node.id;
            let resolved = edge_weight(strategy, parent_id, &usage_index);
            if resolved.missing_metric.is_some() {
                missing_metric = resolved.missing_metric;
            }
            raw_weights.push(resolved.amount);
        }

        let weight_sum: Decimal = raw_weights.iter().sum();
        let (weights, fell_back) = if weight_sum.is_zero() {
            (vec![Decimal::ONE; parents.len()], true)
        } else {
            (raw_weights, false)
        };

        if fell_back {
            if let Some(metric) = &missing_metric {
                match config.missing_usage_policy {
                    MissingUsagePolicy::Error => {
                        return Err(EngineErrorKind::MissingUsage {
                            metric: metric.clone(),
                        }
                        .into())
                    }
                    MissingUsagePolicy::FallbackEqual => {
                        warnings.push(RunWarning {
                            date,
                            dimension: dimension.clone(),
                            message: format!(
                                "no usage observed for metric {metric:?}; fell back to equal split"
                            ),
                        });
                    }
                }
            }
        }

        let shares =
            largest_remainder_split(working[i], &weights, config.decimal_scale, config.rounding_mode);

        let node_id = snapshot.graph[idx].node.id.clone();
        let path_into_node = paths[i].clone().unwrap_or_else(|| vec![node_id.clone()]);

        for ((parent_idx, _edge_view), share) in parents.into_iter().zip(shares.into_iter()) {
            let j = parent_idx.index();
            indirect[j] = checked_add(indirect[j], share)?;
            working[j] = checked_add(working[j], share)?;

            let parent_id = snapshot.graph[parent_idx].node.id.clone();
            let mut path = path_into_node.clone();
            path.push(parent_id.clone());
            if paths[j].is_none() {
                paths[j] = Some(path.clone());
            }

            contributions.push(ContributionResult {
                run_id: run_id.clone(),
                parent: parent_id,
                child: node_id.clone(),
                date,
                dimension: dimension.clone(),
                amount: share,
                path,
            });
        }

        working[i] = Decimal::ZERO;
    }

    let mut allocations = Vec::new();
    for idx in snapshot.graph.node_indices() {
        let i = idx.index();
        let total = direct[i] + indirect[i];
        if total.is_zero() {
            continue;
        }
        allocations.push(AllocationResult {
            run_id: run_id.clone(),
            node: snapshot.graph[idx].node.id.clone(),
            date,
            dimension: dimension.clone(),
            direct_amount: direct[i],
            indirect_amount: indirect[i],
        });
    }

    Ok(UnitResult {
        allocations,
        contributions,
        warnings,
    })
}
