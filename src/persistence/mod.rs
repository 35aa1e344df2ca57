//! Persistence Port (spec §4.A, §6): the abstract capability set the engine consumes. A real
//! adapter backs this with a relational store; this crate ships only [`InMemoryStore`], the
//! reference implementation used by its own test suite.

mod memory;

pub use memory::InMemoryStore;

use crate::cancellation::CancellationToken;
use crate::error::EngineResult;
use crate::model::{
    AllocationResult, ComputationRun, ContributionResult, DependencyEdge, Dimension, EdgeStrategy,
    GraphHash, InvariantViolation, Node, NodeId, RawCost, RunId, RunStatus, RunWarning, UsageMetric,
};
use time::Date;

/// An inclusive `[start, end]` date window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Window {
    pub start: Date,
    pub end: Date,
}

impl Window {
    pub fn new(start: Date, end: Date) -> Self {
        Self { start, end }
    }

    pub fn dates(&self) -> impl Iterator<Item = Date> + '_ {
        let mut current = self.start;
        std::iter::from_fn(move || {
            if current > self.end {
                None
            } else {
                let d = current;
                current = current.saturating_add(time::Duration::days(1));
                Some(d)
            }
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct RawCostFilter {
    pub node: Option<NodeId>,
    pub dimension: Option<Dimension>,
}

#[derive(Clone, Debug, Default)]
pub struct UsageFilter {
    pub node: Option<NodeId>,
    pub metric: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct AllocationFilter {
    pub node: Option<NodeId>,
    pub dimension: Option<Dimension>,
    pub date_range: Option<Window>,
}

#[derive(Clone, Debug, Default)]
pub struct ContributionFilter {
    pub parent: Option<NodeId>,
    pub child: Option<NodeId>,
    pub dimension: Option<Dimension>,
    pub date_range: Option<Window>,
}

/// An exclusive hold on `(graph_hash, window)` acquired by `try_acquire_run_lock` (spec §5).
/// The Run Coordinator releases it via `release_run_lock` on every exit path — success,
/// failure, or cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RunLockKey {
    pub graph_hash: GraphHash,
    pub window: Window,
}

/// Capabilities the engine consumes from storage. Every method is blocking from the
/// engine's perspective and takes a [`CancellationToken`] as its last argument (spec §5);
/// bulk writes are idempotent under `(run_id, natural key)`.
pub trait PersistencePort: Send + Sync {
    fn get_active_graph(
        &self,
        date: Date,
        token: &CancellationToken,
    ) -> EngineResult<(Vec<Node>, Vec<DependencyEdge>, Vec<EdgeStrategy>)>;

    fn get_raw_costs(
        &self,
        window: Window,
        filter: &RawCostFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<RawCost>>;

    fn get_usage(
        &self,
        window: Window,
        filter: &UsageFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<UsageMetric>>;

    fn try_acquire_run_lock(&self, key: &RunLockKey, token: &CancellationToken) -> EngineResult<()>;

    fn release_run_lock(&self, key: &RunLockKey);

    fn create_run(
        &self,
        window: Window,
        graph_hash: GraphHash,
        token: &CancellationToken,
    ) -> EngineResult<ComputationRun>;

    fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        token: &CancellationToken,
    ) -> EngineResult<()>;

    fn append_run_warning(
        &self,
        run_id: &RunId,
        warning: RunWarning,
        token: &CancellationToken,
    ) -> EngineResult<()>;

    fn record_invariant_violations(
        &self,
        run_id: &RunId,
        violations: &[InvariantViolation],
        token: &CancellationToken,
    ) -> EngineResult<()>;

    fn bulk_write_allocations(
        &self,
        rows: &[AllocationResult],
        token: &CancellationToken,
    ) -> EngineResult<()>;

    fn bulk_write_contributions(
        &self,
        rows: &[ContributionResult],
        token: &CancellationToken,
    ) -> EngineResult<()>;

    /// Discards every row persisted for `run_id` (spec §3: "deleting a run cascades its
    /// results"; spec §5: cleanup after cancellation or failure).
    fn delete_run(&self, run_id: &RunId, token: &CancellationToken) -> EngineResult<()>;

    fn get_run(&self, run_id: &RunId, token: &CancellationToken) -> EngineResult<Option<ComputationRun>>;

    fn latest_completed_run(
        &self,
        window: Window,
        token: &CancellationToken,
    ) -> EngineResult<Option<ComputationRun>>;

    fn query_allocations(
        &self,
        run_id: &RunId,
        filter: &AllocationFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<AllocationResult>>;

    fn query_contributions(
        &self,
        run_id: &RunId,
        filter: &ContributionFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<ContributionResult>>;
}
