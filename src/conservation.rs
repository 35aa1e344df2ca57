//! Conservation Checker (spec §4.E): verifies the invariants a completed unit of work must
//! hold and turns any breach into a recorded [`InvariantViolation`] rather than a failure —
//! except amplification, which demotes the run to `completed_with_warnings`.

use crate::config::EngineConfig;
use crate::graph::GraphSnapshot;
use crate::model::{AllocationResult, Dimension, InvariantViolation, RawCost, ViolationKind};
use rust_decimal::Decimal;
use time::Date;

/// The outcome of checking one `(date, dimension)` unit's results against its inputs.
pub struct ConservationOutcome {
    pub violations: Vec<InvariantViolation>,
    /// `(allocated product cost / raw infrastructure cost) * 100`, clamped to `[0, 100]`.
    pub coverage_percent: Decimal,
}

/// Checks conservation, non-amplification, non-negativity and coverage for one unit of work
/// (spec §4.E / §8 properties P1-P3, P7).
pub fn check(
    snapshot: &GraphSnapshot,
    date: Date,
    dimension: &Dimension,
    raw_costs: &[RawCost],
    allocations: &[AllocationResult],
    config: &EngineConfig,
) -> ConservationOutcome {
    let raw_total: Decimal = raw_costs.iter().map(|c| c.amount).sum();
    let raw_infrastructure_total: Decimal = raw_costs
        .iter()
        .filter(|c| snapshot.is_infrastructure(&c.node))
        .map(|c| c.amount)
        .sum();

    let terminal_total: Decimal = allocations
        .iter()
        .filter(|a| {
            snapshot
                .index(&a.node)
                .is_some_and(|idx| snapshot.parents_of(idx).is_empty())
        })
        .map(|a| a.total_amount())
        .sum();

    let allocated_product_total: Decimal = allocations
        .iter()
        .filter(|a| snapshot.is_final_cost_centre(&a.node))
        .map(|a| a.total_amount())
        .sum();

    let mut violations = Vec::new();

    let conservation_tolerance = config.tolerance_for(raw_total);
    let conservation_delta = raw_total - terminal_total;
    if conservation_delta.abs() > conservation_tolerance {
        violations.push(InvariantViolation {
            kind: ViolationKind::Conservation,
            date,
            dimension: dimension.clone(),
            description: format!(
                "raw input {raw_total} does not reconcile with terminal node totals {terminal_total}"
            ),
            expected: raw_total,
            actual: terminal_total,
        });
    }

    let amplification_tolerance = config.tolerance_for(raw_infrastructure_total);
    if allocated_product_total > raw_infrastructure_total + amplification_tolerance {
        violations.push(InvariantViolation {
            kind: ViolationKind::Amplification,
            date,
            dimension: dimension.clone(),
            description: format!(
                "allocated product cost {allocated_product_total} exceeds raw infrastructure cost {raw_infrastructure_total}"
            ),
            expected: raw_infrastructure_total,
            actual: allocated_product_total,
        });
    }

    for allocation in allocations {
        if allocation.direct_amount.is_sign_negative()
            || allocation.indirect_amount.is_sign_negative()
            || allocation.total_amount().is_sign_negative()
        {
            violations.push(InvariantViolation {
                kind: ViolationKind::NonNegativity,
                date,
                dimension: dimension.clone(),
                description: format!("node {} produced a negative amount", allocation.node),
                expected: Decimal::ZERO,
                actual: allocation.total_amount(),
            });
        }
    }

    let coverage_percent = if raw_infrastructure_total.is_zero() {
        Decimal::ZERO
    } else {
        let raw_percent = allocated_product_total / raw_infrastructure_total * Decimal::from(100);
        raw_percent.clamp(Decimal::ZERO, Decimal::from(100))
    };

    ConservationOutcome {
        violations,
        coverage_percent,
    }
}

/// Whether any violation in `violations` demotes a run to `completed_with_warnings`
/// (spec §4.E: "an amplification violation marks the run completed_with_warnings").
pub fn has_amplification(violations: &[InvariantViolation]) -> bool {
    violations.iter().any(|v| v.kind == ViolationKind::Amplification)
}
