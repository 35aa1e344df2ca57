//! An in-memory [`PersistencePort`] used by this crate's own test suite. Demonstrates the
//! idempotency contract bulk writes must honour: re-inserting an identical row is a no-op,
//! keyed by each table's natural key.

use super::{
    AllocationFilter, ContributionFilter, PersistencePort, RawCostFilter, RunLockKey, UsageFilter,
    Window,
};
use crate::cancellation::CancellationToken;
use crate::error::{EngineError, EngineErrorKind, EngineResult};
use crate::model::{
    AllocationResult, ComputationRun, ContributionResult, DependencyEdge, Dimension, EdgeStrategy,
    GraphHash, InvariantViolation, Node, NodeId, RawCost, RunId, RunStatus, RunWarning, UsageMetric,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use time::{Date, OffsetDateTime};

type AllocationKey = (RunId, NodeId, Date, Dimension);
type ContributionKey = (RunId, NodeId, NodeId, Date, Dimension);

#[derive(Default)]
struct Inner {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<crate::model::EdgeId, DependencyEdge>,
    edge_strategies: Vec<EdgeStrategy>,
    raw_costs: HashMap<(NodeId, Date, Dimension), RawCost>,
    usage: HashMap<(NodeId, Date, String), UsageMetric>,
    runs: HashMap<RunId, ComputationRun>,
    allocations: HashMap<AllocationKey, AllocationResult>,
    contributions: HashMap<ContributionKey, ContributionResult>,
    locks: HashSet<RunLockKey>,
}

pub struct InMemoryStore {
    inner: Mutex<Inner>,
    next_run_id: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_run_id: AtomicU64::new(1),
        }
    }

    pub fn insert_node(&self, node: Node) {
        self.inner.lock().unwrap().nodes.insert(node.id.clone(), node);
    }

    pub fn insert_edge(&self, edge: DependencyEdge) {
        self.inner.lock().unwrap().edges.insert(edge.id.clone(), edge);
    }

    pub fn insert_edge_strategy(&self, strategy: EdgeStrategy) {
        self.inner.lock().unwrap().edge_strategies.push(strategy);
    }

    /// Upserts a raw cost row, replacing the amount for `(node, date, dimension)` as spec §3
    /// requires.
    pub fn insert_raw_cost(&self, cost: RawCost) {
        self.inner
            .lock()
            .unwrap()
            .raw_costs
            .insert((cost.node.clone(), cost.date, cost.dimension.clone()), cost);
    }

    pub fn insert_usage(&self, usage: UsageMetric) {
        self.inner.lock().unwrap().usage.insert(
            (usage.node.clone(), usage.date, usage.metric.clone()),
            usage,
        );
    }
}

fn check(token: &CancellationToken) -> EngineResult<()> {
    token.check().map_err(EngineError::from)
}

impl PersistencePort for InMemoryStore {
    fn get_active_graph(
        &self,
        date: Date,
        token: &CancellationToken,
    ) -> EngineResult<(Vec<Node>, Vec<DependencyEdge>, Vec<EdgeStrategy>)> {
        check(token)?;
        let inner = self.inner.lock().unwrap();
        let nodes = inner.nodes.values().filter(|n| !n.is_archived()).cloned().collect();
        let edges = inner
            .edges
            .values()
            .filter(|e| e.is_active_on(date))
            .cloned()
            .collect();
        let strategies = inner.edge_strategies.clone();
        Ok((nodes, edges, strategies))
    }

    fn get_raw_costs(
        &self,
        window: Window,
        filter: &RawCostFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<RawCost>> {
        check(token)?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .raw_costs
            .values()
            .filter(|c| c.date >= window.start && c.date <= window.end)
            .filter(|c| filter.node.as_ref().is_none_or_eq(&c.node))
            .filter(|c| filter.dimension.as_ref().is_none_or_eq(&c.dimension))
            .cloned()
            .collect())
    }

    fn get_usage(
        &self,
        window: Window,
        filter: &UsageFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<UsageMetric>> {
        check(token)?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .usage
            .values()
            .filter(|u| u.date >= window.start && u.date <= window.end)
            .filter(|u| filter.node.as_ref().is_none_or_eq(&u.node))
            .filter(|u| filter.metric.as_ref().is_none_or_eq(&u.metric))
            .cloned()
            .collect())
    }

    fn try_acquire_run_lock(&self, key: &RunLockKey, token: &CancellationToken) -> EngineResult<()> {
        check(token)?;
        let mut inner = self.inner.lock().unwrap();
        if inner.locks.contains(key) {
            return Err(EngineErrorKind::RunAlreadyInProgress {
                graph_hash: key.graph_hash,
                start: key.window.start,
                end: key.window.end,
            }
            .into());
        }
        inner.locks.insert(key.clone());
        Ok(())
    }

    fn release_run_lock(&self, key: &RunLockKey) {
        self.inner.lock().unwrap().locks.remove(key);
    }

    fn create_run(
        &self,
        window: Window,
        graph_hash: GraphHash,
        token: &CancellationToken,
    ) -> EngineResult<ComputationRun> {
        check(token)?;
        let id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let now = OffsetDateTime::now_utc();
        let run = ComputationRun {
            id: RunId::new(format!("run-{id}")),
            window_start: window.start,
            window_end: window.end,
            graph_hash,
            status: RunStatus::Pending,
            notes: Vec::new(),
            warnings: Vec::new(),
            violations: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().runs.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        token: &CancellationToken,
    ) -> EngineResult<()> {
        check(token)?;
        let mut inner = self.inner.lock().unwrap();
        let run = inner.runs.get_mut(run_id).ok_or_else(|| {
            EngineErrorKind::Internal(format!("run {run_id} not found"))
        })?;
        run.status = status;
        run.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    fn append_run_warning(
        &self,
        run_id: &RunId,
        warning: RunWarning,
        token: &CancellationToken,
    ) -> EngineResult<()> {
        check(token)?;
        let mut inner = self.inner.lock().unwrap();
        let run = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| EngineErrorKind::Internal(format!("run {run_id} not found")))?;
        run.warnings.push(warning);
        Ok(())
    }

    fn record_invariant_violations(
        &self,
        run_id: &RunId,
        violations: &[InvariantViolation],
        token: &CancellationToken,
    ) -> EngineResult<()> {
        check(token)?;
        let mut inner = self.inner.lock().unwrap();
        let run = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| EngineErrorKind::Internal(format!("run {run_id} not found")))?;
        run.violations.extend_from_slice(violations);
        Ok(())
    }

    fn bulk_write_allocations(
        &self,
        rows: &[AllocationResult],
        token: &CancellationToken,
    ) -> EngineResult<()> {
        check(token)?;
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            let key = (row.run_id.clone(), row.node.clone(), row.date, row.dimension.clone());
            inner.allocations.insert(key, row.clone());
        }
        Ok(())
    }

    fn bulk_write_contributions(
        &self,
        rows: &[ContributionResult],
        token: &CancellationToken,
    ) -> EngineResult<()> {
        check(token)?;
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            let key = (
                row.run_id.clone(),
                row.parent.clone(),
                row.child.clone(),
                row.date,
                row.dimension.clone(),
            );
            inner.contributions.insert(key, row.clone());
        }
        Ok(())
    }

    fn delete_run(&self, run_id: &RunId, token: &CancellationToken) -> EngineResult<()> {
        check(token)?;
        let mut inner = self.inner.lock().unwrap();
        inner.runs.remove(run_id);
        inner.allocations.retain(|k, _| &k.0 != run_id);
        inner.contributions.retain(|k, _| &k.0 != run_id);
        Ok(())
    }

    fn get_run(&self, run_id: &RunId, token: &CancellationToken) -> EngineResult<Option<ComputationRun>> {
        check(token)?;
        Ok(self.inner.lock().unwrap().runs.get(run_id).cloned())
    }

    fn latest_completed_run(
        &self,
        window: Window,
        token: &CancellationToken,
    ) -> EngineResult<Option<ComputationRun>> {
        check(token)?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .runs
            .values()
            .filter(|r| r.status.is_successful())
            .filter(|r| r.window_intersects(window.start, window.end))
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    fn query_allocations(
        &self,
        run_id: &RunId,
        filter: &AllocationFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<AllocationResult>> {
        check(token)?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .allocations
            .values()
            .filter(|a| &a.run_id == run_id)
            .filter(|a| filter.node.as_ref().is_none_or_eq(&a.node))
            .filter(|a| filter.dimension.as_ref().is_none_or_eq(&a.dimension))
            .filter(|a| {
                filter
                    .date_range
                    .as_ref()
                    .is_none_or(|w| a.date >= w.start && a.date <= w.end)
            })
            .cloned()
            .collect())
    }

    fn query_contributions(
        &self,
        run_id: &RunId,
        filter: &ContributionFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<ContributionResult>> {
        check(token)?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .contributions
            .values()
            .filter(|c| &c.run_id == run_id)
            .filter(|c| filter.parent.as_ref().is_none_or_eq(&c.parent))
            .filter(|c| filter.child.as_ref().is_none_or_eq(&c.child))
            .filter(|c| filter.dimension.as_ref().is_none_or_eq(&c.dimension))
            .filter(|c| {
                filter
                    .date_range
                    .as_ref()
                    .is_none_or(|w| c.date >= w.start && c.date <= w.end)
            })
            .cloned()
            .collect())
    }
}

trait OptionFilterExt<T: PartialEq> {
    fn is_none_or_eq(&self, value: &T) -> bool;
}

impl<T: PartialEq> OptionFilterExt<T> for Option<&T> {
    fn is_none_or_eq(&self, value: &T) -> bool {
        self.map_or(true, |expected| expected == value)
    }
}

trait OptionExt<T> {
    fn is_none_or(&self, f: impl FnOnce(&T) -> bool) -> bool;
}

impl<T> OptionExt<T> for Option<T> {
    fn is_none_or(&self, f: impl FnOnce(&T) -> bool) -> bool {
        match self {
            Some(v) => f(v),
            None => true,
        }
    }
}
