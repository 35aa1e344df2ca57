//! The persisted data model (spec §3): nodes, edges, strategies, raw observations, runs and
//! their results. Every type here is plain data — behaviour that needs the graph or storage
//! lives in `graph`, `allocation`, `persistence`.

mod cost;
mod edge;
mod ids;
mod money;
mod node;
mod result;
mod run;

pub use cost::{RawCost, UsageMetric};
pub use edge::{
    AllocationStrategy, DependencyEdge, EdgeStrategy, EqualStrategy, ProportionalOnStrategy,
    StrategyKind, StrategyParameters, WeightedStrategy,
};
pub use ids::{Dimension, EdgeId, GraphHash, NodeId, RunId};
pub use money::{Currency, Money};
pub use node::{Node, NodeType};
pub use result::{AllocationResult, ContributionResult};
pub use run::{ComputationRun, InvariantViolation, RunStatus, RunWarning, ViolationKind};
