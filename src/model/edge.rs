use super::{Dimension, EdgeId, NodeId};
use enum_dispatch::enum_dispatch;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

/// The strategy-kind string as persisted on an edge or a per-dimension override. Parsed with
/// `strum` so an unrecognised value surfaces as `UnknownStrategy` at the parse boundary
/// rather than deep inside the allocation loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StrategyKind {
    Equal,
    ProportionalOn,
    Weighted,
}

/// Behaviour shared by every allocation strategy: rendering its kind and parameters for the
/// graph hash (spec §4.B: "sorted default_parameters").
#[enum_dispatch]
pub trait StrategyParameters {
    fn kind(&self) -> StrategyKind;

    /// Parameters as sorted `(key, value)` pairs, used when folding the strategy into the
    /// graph hash so that parameter order never affects the fingerprint.
    fn sorted_parameters(&self) -> Vec<(String, String)>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualStrategy;

impl StrategyParameters for EqualStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Equal
    }

    fn sorted_parameters(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProportionalOnStrategy {
    pub metric: String,
}

impl StrategyParameters for ProportionalOnStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ProportionalOn
    }

    fn sorted_parameters(&self) -> Vec<(String, String)> {
        vec![("metric".to_owned(), self.metric.clone())]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedStrategy {
    pub weight: Decimal,
}

impl StrategyParameters for WeightedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Weighted
    }

    fn sorted_parameters(&self) -> Vec<(String, String)> {
        vec![("weight".to_owned(), self.weight.to_string())]
    }
}

/// How a parent's cost is split among its children (really: how much of a child's cost flows
/// into a given parent — see spec §9 on edge direction).
#[enum_dispatch(StrategyParameters)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AllocationStrategy {
    Equal(EqualStrategy),
    ProportionalOn(ProportionalOnStrategy),
    Weighted(WeightedStrategy),
}

impl Default for AllocationStrategy {
    fn default() -> Self {
        AllocationStrategy::Equal(EqualStrategy)
    }
}

/// An edge declaring that `child` is a cost source for `parent`: during allocation, cost
/// flows from `child` to `parent`.
///
/// Validity is a half-open interval `[active_from, active_to)`; `active_to == None` means
/// open-ended. No two edges with the same `(parent, child)` pair may overlap in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub id: EdgeId,
    pub parent: NodeId,
    pub child: NodeId,
    pub default_strategy: AllocationStrategy,
    pub active_from: Date,
    pub active_to: Option<Date>,
}

impl DependencyEdge {
    pub fn is_active_on(&self, date: Date) -> bool {
        self.active_from <= date && self.active_to.map_or(true, |end| date < end)
    }
}

/// A per-dimension override of an edge's default strategy. Takes precedence over
/// `DependencyEdge::default_strategy` for that `(edge, dimension)` pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeStrategy {
    pub edge_id: EdgeId,
    pub dimension: Dimension,
    pub strategy: AllocationStrategy,
}
