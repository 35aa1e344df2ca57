//! Strategy Resolver (spec §4.C): picks the allocation strategy that applies to a given
//! edge and dimension, and parses the raw `(kind, parameters)` pairs a persistence adapter
//! reads off its `edges`/`edge_strategies` tables.

use crate::error::{EngineError, EngineErrorKind};
use crate::model::{
    AllocationStrategy, DependencyEdge, Dimension, EqualStrategy, ProportionalOnStrategy,
    StrategyKind, WeightedStrategy,
};
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// Returns the per-dimension override for `dimension` if one exists among `overrides`, else
/// the edge's default strategy.
pub fn resolve<'a>(
    edge: &'a DependencyEdge,
    overrides: &'a IndexMap<Dimension, AllocationStrategy>,
    dimension: &Dimension,
) -> &'a AllocationStrategy {
    overrides.get(dimension).unwrap_or(&edge.default_strategy)
}

/// Parses a persisted `(kind, parameters)` pair into an [`AllocationStrategy`]. An
/// unrecognised `kind` string surfaces as `UnknownStrategy` at this boundary, before it ever
/// reaches the allocation loop.
pub fn parse_strategy(kind: &str, parameters: &serde_json::Value) -> Result<AllocationStrategy, EngineError> {
    let parsed: StrategyKind = kind
        .parse()
        .map_err(|_| EngineErrorKind::UnknownStrategy(kind.to_owned()))?;
    match parsed {
        StrategyKind::Equal => Ok(AllocationStrategy::Equal(EqualStrategy)),
        StrategyKind::ProportionalOn => {
            let metric = parameters
                .get("metric")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    EngineErrorKind::Internal(
                        "proportional_on strategy requires a \"metric\" parameter".to_owned(),
                    )
                })?;
            Ok(AllocationStrategy::ProportionalOn(ProportionalOnStrategy {
                metric: metric.to_owned(),
            }))
        }
        StrategyKind::Weighted => {
            let weight = parameters
                .get("weight")
                .and_then(parse_decimal_value)
                .unwrap_or(Decimal::ONE);
            Ok(AllocationStrategy::Weighted(WeightedStrategy { weight }))
        }
    }
}

fn parse_decimal_value(value: &serde_json::Value) -> Option<Decimal> {
    if let Some(s) = value.as_str() {
        s.parse().ok()
    } else {
        value.as_f64().and_then(|f| Decimal::try_from(f).ok())
    }
}
