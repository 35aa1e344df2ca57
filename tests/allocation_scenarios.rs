//! End-to-end scenarios run through the public [`Engine`] surface against an
//! [`InMemoryStore`], mirroring the concrete walkthroughs enumerated for this system.

use cost_attribution_engine::cancellation::CancellationToken;
use cost_attribution_engine::config::EngineConfig;
use cost_attribution_engine::model::{
    AllocationStrategy, Currency, DependencyEdge, EdgeId, EqualStrategy, Node, NodeId, NodeType,
    ProportionalOnStrategy, RawCost, RunStatus, UsageMetric,
};
use cost_attribution_engine::persistence::{InMemoryStore, Window};
use cost_attribution_engine::Engine;
use indexmap::IndexMap;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::Arc;
use time::macros::date;

/// Installs a `tracing` subscriber once per test binary so the Run Coordinator's spans and
/// events surface on `cargo test -- --nocapture` instead of going nowhere.
fn init_logs() {
    static INIT: AtomicBool = AtomicBool::new(false);
    if INIT.compare_exchange(false, true, SeqCst, SeqCst).is_ok() {
        tracing_subscriber::fmt::init();
    }
}

fn node(id: &str, node_type: NodeType) -> Node {
    Node {
        id: NodeId::from(id),
        name: id.to_owned(),
        node_type,
        platform_flag: false,
        cost_labels: IndexMap::new(),
        metadata: serde_json::Value::Null,
        archived_at: None,
    }
}

fn edge(id: &str, parent: &str, child: &str, strategy: AllocationStrategy) -> DependencyEdge {
    DependencyEdge {
        id: EdgeId::from(id),
        parent: NodeId::from(parent),
        child: NodeId::from(child),
        default_strategy: strategy,
        active_from: date!(2024 - 01 - 01),
        active_to: None,
    }
}

fn engine(config: EngineConfig) -> (Engine, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let engine = Engine::new(store.clone(), config);
    (engine, store)
}

#[test]
fn equal_split_single_hop() {
    init_logs();
    let store = Arc::new(InMemoryStore::new());
    store.insert_node(node("R", NodeType::Resource));
    store.insert_node(node("P", NodeType::Product));
    store.insert_edge(edge("e1", "P", "R", AllocationStrategy::Equal(EqualStrategy)));
    store.insert_raw_cost(RawCost {
        node: NodeId::from("R"),
        date: date!(2024 - 01 - 01),
        dimension: "instance_hours".into(),
        amount: dec!(100.00),
        currency: Currency::default(),
        metadata: serde_json::Value::Null,
    });

    let engine = Engine::new(store, EngineConfig::default().with_decimal_scale(2));
    let token = CancellationToken::new();
    let window = Window::new(date!(2024 - 01 - 01), date!(2024 - 01 - 01));

    let run_id = engine.trigger_run(window, &token).unwrap();
    let run = engine.run_status(&run_id, &token).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let allocations = engine
        .query_allocations(&run_id, &Default::default(), &token)
        .unwrap();
    let r = allocations.iter().find(|a| a.node.as_str() == "R").unwrap();
    assert_eq!(r.direct_amount, dec!(100.00));
    let p = allocations.iter().find(|a| a.node.as_str() == "P").unwrap();
    assert_eq!(p.total_amount(), dec!(100.00));

    let report = engine.reconciliation(window, &token).unwrap().unwrap();
    assert_eq!(report.coverage_percent, dec!(100));
    assert!(report.conservation_valid);
}

#[test]
fn proportional_split_falls_back_to_equal_and_records_a_warning() {
    init_logs();
    let (engine, store) = engine(EngineConfig::default().with_decimal_scale(2));
    store.insert_node(node("S", NodeType::Shared));
    store.insert_node(node("P1", NodeType::Product));
    store.insert_node(node("P2", NodeType::Product));
    let strategy = AllocationStrategy::ProportionalOn(ProportionalOnStrategy {
        metric: "requests".to_owned(),
    });
    store.insert_edge(edge("e1", "P1", "S", strategy.clone()));
    store.insert_edge(edge("e2", "P2", "S", strategy));
    store.insert_raw_cost(RawCost {
        node: NodeId::from("S"),
        date: date!(2024 - 01 - 01),
        dimension: "egress_gb".into(),
        amount: dec!(30.00),
        currency: Currency::default(),
        metadata: serde_json::Value::Null,
    });

    let token = CancellationToken::new();
    let window = Window::new(date!(2024 - 01 - 01), date!(2024 - 01 - 01));
    let run_id = engine.trigger_run(window, &token).unwrap();
    let run = engine.run_status(&run_id, &token).unwrap().unwrap();
    // A missing-usage fallback is recorded as a warning but is not itself an amplification
    // violation, so the run stays `Completed` (spec §4.E/§7).
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.warnings.len(), 1);

    let allocations = engine
        .query_allocations(&run_id, &Default::default(), &token)
        .unwrap();
    let p1 = allocations.iter().find(|a| a.node.as_str() == "P1").unwrap();
    let p2 = allocations.iter().find(|a| a.node.as_str() == "P2").unwrap();
    assert_eq!(p1.indirect_amount, dec!(15.00));
    assert_eq!(p2.indirect_amount, dec!(15.00));
}

#[test]
fn proportional_split_with_usage_sums_exactly() {
    init_logs();
    let (engine, store) = engine(EngineConfig::default().with_decimal_scale(2));
    store.insert_node(node("S", NodeType::Shared));
    store.insert_node(node("P1", NodeType::Product));
    store.insert_node(node("P2", NodeType::Product));
    let strategy = AllocationStrategy::ProportionalOn(ProportionalOnStrategy {
        metric: "requests".to_owned(),
    });
    store.insert_edge(edge("e1", "P1", "S", strategy.clone()));
    store.insert_edge(edge("e2", "P2", "S", strategy));
    store.insert_raw_cost(RawCost {
        node: NodeId::from("S"),
        date: date!(2024 - 01 - 01),
        dimension: "egress_gb".into(),
        amount: dec!(30.00),
        currency: Currency::default(),
        metadata: serde_json::Value::Null,
    });
    store.insert_usage(UsageMetric {
        node: NodeId::from("P1"),
        date: date!(2024 - 01 - 01),
        metric: "requests".to_owned(),
        value: dec!(1),
        unit: "count".to_owned(),
    });
    store.insert_usage(UsageMetric {
        node: NodeId::from("P2"),
        date: date!(2024 - 01 - 01),
        metric: "requests".to_owned(),
        value: dec!(3),
        unit: "count".to_owned(),
    });

    let token = CancellationToken::new();
    let window = Window::new(date!(2024 - 01 - 01), date!(2024 - 01 - 01));
    let run_id = engine.trigger_run(window, &token).unwrap();
    let run = engine.run_status(&run_id, &token).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let allocations = engine
        .query_allocations(&run_id, &Default::default(), &token)
        .unwrap();
    let p1 = allocations.iter().find(|a| a.node.as_str() == "P1").unwrap();
    let p2 = allocations.iter().find(|a| a.node.as_str() == "P2").unwrap();
    assert_eq!(p1.indirect_amount, dec!(7.50));
    assert_eq!(p2.indirect_amount, dec!(22.50));
}

#[test]
fn multi_hop_carries_the_full_path() {
    init_logs();
    let (engine, store) = engine(EngineConfig::default().with_decimal_scale(2));
    store.insert_node(node("R", NodeType::Resource));
    store.insert_node(node("S", NodeType::Shared));
    store.insert_node(node("P", NodeType::Product));
    store.insert_edge(edge("e1", "S", "R", AllocationStrategy::Equal(EqualStrategy)));
    store.insert_edge(edge("e2", "P", "S", AllocationStrategy::Equal(EqualStrategy)));
    store.insert_raw_cost(RawCost {
        node: NodeId::from("R"),
        date: date!(2024 - 01 - 01),
        dimension: "dim".into(),
        amount: dec!(10.00),
        currency: Currency::default(),
        metadata: serde_json::Value::Null,
    });

    let token = CancellationToken::new();
    let window = Window::new(date!(2024 - 01 - 01), date!(2024 - 01 - 01));
    let run_id = engine.trigger_run(window, &token).unwrap();

    let contributions = engine
        .query_contributions(&run_id, &Default::default(), &token)
        .unwrap();
    assert_eq!(contributions.len(), 2);
    let s_to_p = contributions
        .iter()
        .find(|c| c.parent.as_str() == "P" && c.child.as_str() == "S")
        .unwrap();
    let path: Vec<&str> = s_to_p.path.iter().map(|id| id.as_str()).collect();
    assert_eq!(path, vec!["R", "S", "P"]);
}

#[test]
fn cycle_fails_the_run_and_persists_nothing() {
    init_logs();
    let (engine, store) = engine(EngineConfig::default());
    store.insert_node(node("A", NodeType::Product));
    store.insert_node(node("B", NodeType::Product));
    store.insert_edge(edge("e1", "A", "B", AllocationStrategy::Equal(EqualStrategy)));
    store.insert_edge(edge("e2", "B", "A", AllocationStrategy::Equal(EqualStrategy)));

    let token = CancellationToken::new();
    let window = Window::new(date!(2024 - 01 - 01), date!(2024 - 01 - 01));
    let err = engine.trigger_run(window, &token).unwrap_err();
    assert!(matches!(
        err.kind,
        cost_attribution_engine::error::EngineErrorKind::GraphCycle(_)
    ));
}

#[test]
fn rerunning_the_same_window_produces_a_new_run_id_with_identical_results() {
    init_logs();
    let (engine, store) = engine(EngineConfig::default().with_decimal_scale(2));
    store.insert_node(node("R", NodeType::Resource));
    store.insert_node(node("P", NodeType::Product));
    store.insert_edge(edge("e1", "P", "R", AllocationStrategy::Equal(EqualStrategy)));
    store.insert_raw_cost(RawCost {
        node: NodeId::from("R"),
        date: date!(2024 - 01 - 01),
        dimension: "dim".into(),
        amount: dec!(40.00),
        currency: Currency::default(),
        metadata: serde_json::Value::Null,
    });

    let token = CancellationToken::new();
    let window = Window::new(date!(2024 - 01 - 01), date!(2024 - 01 - 01));
    let first = engine.trigger_run(window, &token).unwrap();
    let second = engine.trigger_run(window, &token).unwrap();
    assert_ne!(first, second);

    let first_allocations = engine.query_allocations(&first, &Default::default(), &token).unwrap();
    let second_allocations = engine.query_allocations(&second, &Default::default(), &token).unwrap();
    assert_eq!(first_allocations.len(), second_allocations.len());
    for a in &first_allocations {
        let counterpart = second_allocations
            .iter()
            .find(|b| b.node == a.node && b.dimension == a.dimension)
            .unwrap();
        assert_eq!(a.total_amount(), counterpart.total_amount());
    }

    let latest = engine.latest_run_for(window, &token).unwrap().unwrap();
    assert_eq!(latest, second);
}
