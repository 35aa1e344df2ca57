//! Run Coordinator (spec §4.F, §5): owns a run's lifecycle, builds one graph snapshot per
//! distinct date in the window, and fans the `(date, dimension)` units out over a `rayon`
//! worker pool sized from [`EngineConfig::worker_pool_size`].

use crate::allocation::{allocate_unit, UnitResult};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::conservation::{self, ConservationOutcome};
use crate::error::{EngineError, EngineErrorKind, EngineResult};
use crate::graph::GraphBuilder;
use crate::model::{
    AllocationResult, ContributionResult, Dimension, RunId, RunStatus, RunWarning,
};
use crate::persistence::{PersistencePort, RawCostFilter, RunLockKey, UsageFilter, Window};
use indexmap::IndexSet;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct RunCoordinator {
    store: Arc<dyn PersistencePort>,
    config: EngineConfig,
}

impl RunCoordinator {
    pub fn new(store: Arc<dyn PersistencePort>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Runs the engine for `window`, returning the new run's id (spec §4.F).
    #[instrument(skip(self, token), fields(start = %window.start, end = %window.end))]
    pub fn trigger_run(&self, window: Window, token: &CancellationToken) -> EngineResult<RunId> {
        token.check().map_err(EngineError::from)?;

        let (nodes, edges, strategies) = self.store.get_active_graph(window.start, token)?;
        let reference_snapshot = GraphBuilder::new().build(window.start, &nodes, &edges, &strategies)?;
        let graph_hash = reference_snapshot.graph_hash;
        let lock_key = RunLockKey { graph_hash, window };

        self.store.try_acquire_run_lock(&lock_key, token).inspect_err(|_| {
            warn!(%graph_hash, "run already in progress for this graph hash and window");
        })?;
        let outcome = self.run_locked(window, graph_hash, token);
        self.store.release_run_lock(&lock_key);
        outcome
    }

    #[instrument(skip(self, token), fields(%graph_hash))]
    fn run_locked(&self, window: Window, graph_hash: crate::model::GraphHash, token: &CancellationToken) -> EngineResult<RunId> {
        let run = self.retry(token, || self.store.create_run(window, graph_hash, token))?;
        info!(run_id = %run.id, "run created");
        self.retry(token, || {
            self.store.update_run_status(&run.id, RunStatus::Running, token)
        })?;

        match self.execute(&run.id, window, token) {
            Ok(()) => {
                let status = self.final_status(&run.id, token);
                self.retry(token, || {
                    self.store.update_run_status(&run.id, status, token)
                })?;
                info!(run_id = %run.id, ?status, "run finished");
                Ok(run.id.clone())
            }
            Err(err) => {
                warn!(run_id = %run.id, error = %err, "run failed, purging partial results");
                let _ = self.store.delete_run(&run.id, token);
                let _ = self.retry(token, || {
                    self.store.update_run_status(&run.id, RunStatus::Failed, token)
                });
                Err(err.with_run(run.id))
            }
        }
    }

    /// Only an amplification violation demotes a run to `completed_with_warnings` (spec
    /// §4.E/§7); a `MissingUsage` fallback is recorded as a warning but leaves the run
    /// `Completed`.
    fn final_status(&self, run_id: &RunId, token: &CancellationToken) -> RunStatus {
        match self.store.get_run(run_id, token) {
            Ok(Some(run)) if conservation::has_amplification(&run.violations) => {
                RunStatus::CompletedWithWarnings
            }
            _ => RunStatus::Completed,
        }
    }

    #[instrument(skip(self, token), fields(run_id = %run_id))]
    fn execute(&self, run_id: &RunId, window: Window, token: &CancellationToken) -> EngineResult<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_pool_size)
            .build()
            .map_err(|e| EngineErrorKind::Internal(e.to_string()))?;

        for date in window.dates() {
            token.check().map_err(EngineError::from)?;

            let (nodes, edges, strategies) = self.retry(token, || self.store.get_active_graph(date, token))?;
            let snapshot = GraphBuilder::new().build(date, &nodes, &edges, &strategies)?;
            debug!(%date, node_count = snapshot.node_count(), edge_count = snapshot.edge_count(), "graph snapshot built");

            let raw_costs = self.retry(token, || {
                self.store
                    .get_raw_costs(Window::new(date, date), &RawCostFilter::default(), token)
            })?;
            let usage = self.retry(token, || {
                self.store
                    .get_usage(Window::new(date, date), &UsageFilter::default(), token)
            })?;

            let dimensions: IndexSet<Dimension> = raw_costs.iter().map(|c| c.dimension.clone()).collect();
            let units: Vec<Dimension> = dimensions.into_iter().collect();

            let results: Vec<EngineResult<UnitResult>> = pool.install(|| {
                units
                    .par_iter()
                    .map(|dimension| {
                        let dim_raw: Vec<_> = raw_costs
                            .iter()
                            .filter(|c| &c.dimension == dimension)
                            .cloned()
                            .collect();
                        allocate_unit(&snapshot, run_id, date, dimension, &dim_raw, &usage, &self.config)
                    })
                    .collect()
            });

            let mut allocations: Vec<AllocationResult> = Vec::new();
            let mut contributions: Vec<ContributionResult> = Vec::new();
            let mut warnings: Vec<RunWarning> = Vec::new();
            for result in results {
                let unit = result?;
                allocations.extend(unit.allocations);
                contributions.extend(unit.contributions);
                warnings.extend(unit.warnings);
            }

            for dimension in dimensions_in(&allocations) {
                let dim_raw: Vec<_> = raw_costs.iter().filter(|c| c.dimension == dimension).cloned().collect();
                let dim_allocations: Vec<_> = allocations
                    .iter()
                    .filter(|a| a.dimension == dimension)
                    .cloned()
                    .collect();
                let ConservationOutcome { violations, .. } =
                    conservation::check(&snapshot, date, &dimension, &dim_raw, &dim_allocations, &self.config);
                if !violations.is_empty() {
                    warn!(%date, %dimension, count = violations.len(), "invariant violations recorded");
                    self.retry(token, || {
                        self.store.record_invariant_violations(run_id, &violations, token)
                    })?;
                }
            }

            for warning in warnings {
                debug!(%date, dimension = %warning.dimension, message = %warning.message, "run warning recorded");
                self.retry(token, || self.store.append_run_warning(run_id, warning.clone(), token))?;
            }

            self.retry(token, || self.store.bulk_write_allocations(&allocations, token))?;
            self.retry(token, || self.store.bulk_write_contributions(&contributions, token))?;
        }

        Ok(())
    }

    fn retry<T>(&self, token: &CancellationToken, mut f: impl FnMut() -> EngineResult<T>) -> EngineResult<T> {
        let mut attempts = 0;
        loop {
            match f() {
                Ok(v) => return Ok(v),
                Err(err) if err.is_retriable() && attempts < self.config.storage_retry_attempts => {
                    attempts += 1;
                    warn!(attempt = attempts, error = %err, "storage unavailable, retrying with backoff");
                    std::thread::sleep(self.config.storage_retry_backoff);
                    token.check().map_err(EngineError::from)?;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn dimensions_in(allocations: &[AllocationResult]) -> IndexSet<Dimension> {
    allocations.iter().map(|a| a.dimension.clone()).collect()
}

/// Accessor used by the crate's public API to fetch a run's current lifecycle state
/// (spec §6: `run_status(run_id) -> {status, warnings, violations}`).
pub fn run_status(
    store: &dyn PersistencePort,
    run_id: &RunId,
    token: &CancellationToken,
) -> EngineResult<Option<crate::model::ComputationRun>> {
    store.get_run(run_id, token)
}

/// Finds the latest completed run intersecting `window` (spec §6: `latest_run_for`).
pub fn latest_run_for(
    store: &dyn PersistencePort,
    window: Window,
    token: &CancellationToken,
) -> EngineResult<Option<RunId>> {
    Ok(store.latest_completed_run(window, token)?.map(|r| r.id))
}
