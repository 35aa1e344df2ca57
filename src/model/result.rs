use super::{Dimension, NodeId, RunId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

/// One row of the allocation result table: for a `(run, node, date, dimension)`, the node's
/// own observed cost (`direct_amount`), the cost it received from descendants
/// (`indirect_amount`), and their sum (`total_amount`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub run_id: RunId,
    pub node: NodeId,
    pub date: Date,
    pub dimension: Dimension,
    pub direct_amount: Decimal,
    pub indirect_amount: Decimal,
}

impl AllocationResult {
    pub fn total_amount(&self) -> Decimal {
        self.direct_amount + self.indirect_amount
    }
}

/// One row of the contribution result table: the portion of `child`'s total that was passed
/// up to `parent` for a `(run, date, dimension)`, plus the full multi-hop path if any.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributionResult {
    pub run_id: RunId,
    pub parent: NodeId,
    pub child: NodeId,
    pub date: Date,
    pub dimension: Dimension,
    pub amount: Decimal,
    /// Ordered node ids from the original cost source through to `parent`, inclusive of
    /// both ends. Two entries (`[child, parent]`) for a direct hop.
    pub path: Vec<NodeId>,
}
