use super::{Dimension, Money, NodeId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

/// A raw cost observation attached to a leaf infrastructure (or, exceptionally, product)
/// node. Keyed by `(node, date, dimension)`; upserts replace the amount — see spec §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawCost {
    pub node: NodeId,
    pub date: Date,
    pub dimension: Dimension,
    pub amount: Decimal,
    pub currency: super::Currency,
    pub metadata: serde_json::Value,
}

impl RawCost {
    pub fn money(&self) -> Money {
        Money::new(self.amount, self.currency)
    }
}

/// A usage observation feeding `proportional_on` strategies. Keyed by `(node, date, metric)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageMetric {
    pub node: NodeId,
    pub date: Date,
    pub metric: String,
    pub value: Decimal,
    pub unit: String,
}
