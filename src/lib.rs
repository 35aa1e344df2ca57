//! Allocates infrastructure spend to the products and platforms that consume it, by walking a
//! time-versioned dependency graph from leaf infrastructure nodes up to the business products
//! at the top (spec §1-§2).
//!
//! The crate is organised the way the allocation pipeline itself flows: [`model`] is the
//! persisted data shape, [`persistence`] is the storage boundary, [`graph`] turns stored rows
//! into a walkable snapshot, [`allocation`] propagates costs through it, [`conservation`]
//! checks the result, [`run_coordinator`] owns the run lifecycle, and [`read_model`] serves
//! query-side views over a completed run. [`Engine`] wires all of it into the public surface
//! described in spec §6.

pub mod allocation;
pub mod cancellation;
pub mod config;
pub mod conservation;
pub mod decimal;
pub mod error;
pub mod graph;
pub mod model;
pub mod persistence;
pub mod read_model;
pub mod run_coordinator;
pub mod strategy;

use cancellation::CancellationToken;
use config::EngineConfig;
use error::EngineResult;
use graph::GraphBuilder;
use model::{AllocationResult, ComputationRun, ContributionResult, RunId};
use persistence::{AllocationFilter, ContributionFilter, PersistencePort, Window};
use read_model::{InfrastructureHierarchyEntry, ProductHierarchyEntry, ReconciliationReport};
use run_coordinator::RunCoordinator;
use std::sync::Arc;

/// The crate's single public entry point: a persistence adapter plus a configuration,
/// exposing the operations of spec §6.
pub struct Engine {
    store: Arc<dyn PersistencePort>,
    config: EngineConfig,
    coordinator: RunCoordinator,
}

impl Engine {
    pub fn new(store: Arc<dyn PersistencePort>, config: EngineConfig) -> Self {
        let coordinator = RunCoordinator::new(store.clone(), config.clone());
        Self {
            store,
            config,
            coordinator,
        }
    }

    /// Computes allocations for every date in `window`, returning the new run's id.
    pub fn trigger_run(&self, window: Window, token: &CancellationToken) -> EngineResult<RunId> {
        self.coordinator.trigger_run(window, token)
    }

    pub fn run_status(
        &self,
        run_id: &RunId,
        token: &CancellationToken,
    ) -> EngineResult<Option<ComputationRun>> {
        self.store.get_run(run_id, token)
    }

    /// The most recent completed run intersecting `window`, if any (spec §6).
    pub fn latest_run_for(&self, window: Window, token: &CancellationToken) -> EngineResult<Option<RunId>> {
        run_coordinator::latest_run_for(self.store.as_ref(), window, token)
    }

    pub fn query_allocations(
        &self,
        run_id: &RunId,
        filter: &AllocationFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<AllocationResult>> {
        self.store.query_allocations(run_id, filter, token)
    }

    pub fn query_contributions(
        &self,
        run_id: &RunId,
        filter: &ContributionFilter,
        token: &CancellationToken,
    ) -> EngineResult<Vec<ContributionResult>> {
        self.store.query_contributions(run_id, filter, token)
    }

    /// The product hierarchy view over the latest completed run intersecting `window`
    /// (spec §4.G). Returns an empty vector if no run has completed for that window.
    pub fn product_hierarchy(
        &self,
        window: Window,
        token: &CancellationToken,
    ) -> EngineResult<Vec<ProductHierarchyEntry>> {
        let Some(run) = self.store.latest_completed_run(window, token)? else {
            return Ok(Vec::new());
        };
        let snapshot = self.reference_snapshot(window, token)?;
        let allocations = self.store.query_allocations(&run.id, &AllocationFilter::default(), token)?;
        let contributions =
            self.store.query_contributions(&run.id, &ContributionFilter::default(), token)?;
        Ok(read_model::product_hierarchy(&snapshot, &allocations, &contributions))
    }

    /// The infrastructure hierarchy view, symmetric to [`Self::product_hierarchy`].
    pub fn infrastructure_hierarchy(
        &self,
        window: Window,
        token: &CancellationToken,
    ) -> EngineResult<Vec<InfrastructureHierarchyEntry>> {
        let Some(run) = self.store.latest_completed_run(window, token)? else {
            return Ok(Vec::new());
        };
        let snapshot = self.reference_snapshot(window, token)?;
        let allocations = self.store.query_allocations(&run.id, &AllocationFilter::default(), token)?;
        let contributions =
            self.store.query_contributions(&run.id, &ContributionFilter::default(), token)?;
        Ok(read_model::infrastructure_hierarchy(&snapshot, &allocations, &contributions))
    }

    /// The reconciliation report for the latest completed run intersecting `window`
    /// (spec §4.G, §6). Returns `None` if no run has completed for that window.
    pub fn reconciliation(
        &self,
        window: Window,
        token: &CancellationToken,
    ) -> EngineResult<Option<ReconciliationReport>> {
        let Some(run) = self.store.latest_completed_run(window, token)? else {
            return Ok(None);
        };
        let snapshot = self.reference_snapshot(window, token)?;
        let allocations = self.store.query_allocations(&run.id, &AllocationFilter::default(), token)?;
        Ok(Some(read_model::reconciliation_report(
            &snapshot,
            &allocations,
            run.violations,
            &self.config,
        )))
    }

    fn reference_snapshot(
        &self,
        window: Window,
        token: &CancellationToken,
    ) -> EngineResult<graph::GraphSnapshot> {
        let (nodes, edges, strategies) = self.store.get_active_graph(window.start, token)?;
        Ok(GraphBuilder::new().build(window.start, &nodes, &edges, &strategies)?)
    }
}
